//! Per-document orchestrator.
//!
//! Drives one source document through load → extract → parse → normalize →
//! resolve → evaluate → persist. Extraction is exposed as a separate step so
//! an operator can re-run it (`reprocess`) without re-loading the document;
//! every attempt gets its own document id and artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::config::{PipelineSettings, APP_VERSION};
use crate::models::{DocumentResult, DocumentResultBuilder, ExtractionResponse, LlmProvider, RawDocument};
use crate::pipeline::compliance::{
    resolve_and_evaluate, LimitLookup, LimitTable, ReferenceDataError, SharedLimits,
};
use crate::pipeline::extraction::{DocumentLoader, UnreadableDocumentError};
use crate::pipeline::normalize::{CanonicalLookup, Normalizer, ValueParser, Vocabulary};
use crate::pipeline::storage::{PersistenceError, ResultWriter};
use crate::pipeline::structuring::{
    parse_extraction_response, CancellationFlag, ExtractionAgent, ExtractionServiceError,
    LlmClient, OllamaClient, OpenAiClient, ResponseParseError,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Reasons a document's run aborted before a result was written.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Unreadable document: {0}")]
    Unreadable(#[from] UnreadableDocumentError),

    #[error("Extraction service failed: {0}")]
    ExtractionService(#[from] ExtractionServiceError),

    #[error("Extraction response unusable: {0}")]
    ResponseParse(#[from] ResponseParseError),

    #[error("Failed to persist result: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Reference data error: {0}")]
    ReferenceData(#[from] ReferenceDataError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProcessingError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ProcessingError::ExtractionService(ExtractionServiceError::Cancelled)
        )
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A completed run: the persisted artifact and the record it contains.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub artifact_path: PathBuf,
    pub result: DocumentResult,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct ResiduePipeline {
    loader: DocumentLoader,
    agent: ExtractionAgent,
    vocabulary: Box<dyn CanonicalLookup + Send + Sync>,
    limits: Arc<dyn LimitLookup + Send + Sync>,
    values: ValueParser,
    writer: ResultWriter,
}

impl ResiduePipeline {
    pub fn new(
        loader: DocumentLoader,
        agent: ExtractionAgent,
        vocabulary: Box<dyn CanonicalLookup + Send + Sync>,
        limits: Arc<dyn LimitLookup + Send + Sync>,
        values: ValueParser,
        writer: ResultWriter,
    ) -> Self {
        Self {
            loader,
            agent,
            vocabulary,
            limits,
            values,
            writer,
        }
    }

    /// Full run for one file: load, then [`ResiduePipeline::reprocess`].
    pub fn process_file(
        &self,
        path: &Path,
        commodity_hint: Option<&str>,
        cancel: &CancellationFlag,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let document = self.load(path)?;
        self.reprocess(&document, commodity_hint, cancel)
    }

    pub fn load(&self, path: &Path) -> Result<RawDocument, ProcessingError> {
        Ok(self.loader.load(path)?)
    }

    /// One extraction attempt on an already loaded document, through to a
    /// persisted artifact under a fresh document id.
    pub fn reprocess(
        &self,
        document: &RawDocument,
        commodity_hint: Option<&str>,
        cancel: &CancellationFlag,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let document_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "document",
            doc_id = %document_id,
            path = %document.path().display()
        );
        let _guard = span.enter();

        let response = self.extract(&document_id, document, commodity_hint, cancel)?;
        self.finish(document_id, document, response, commodity_hint, cancel)
    }

    /// The single service call. Failures are returned, never retried here.
    pub fn extract(
        &self,
        document_id: &Uuid,
        document: &RawDocument,
        commodity_hint: Option<&str>,
        cancel: &CancellationFlag,
    ) -> Result<ExtractionResponse, ProcessingError> {
        Ok(self
            .agent
            .extract(document_id, document, commodity_hint, cancel)?)
    }

    /// Everything after the service call, ending with the artifact on disk.
    ///
    /// A cancellation raised before the write discards the result.
    pub fn finish(
        &self,
        document_id: Uuid,
        document: &RawDocument,
        response: ExtractionResponse,
        commodity_hint: Option<&str>,
        cancel: &CancellationFlag,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let result = self.evaluate(document_id, document, response, commodity_hint)?;

        if cancel.is_cancelled() {
            tracing::info!(doc_id = %document_id, "Run cancelled before persisting; result discarded");
            return Err(ExtractionServiceError::Cancelled.into());
        }

        let artifact_path = self.writer.write(&result)?;
        Ok(ProcessingOutcome {
            artifact_path,
            result,
        })
    }

    /// Parse, normalize, resolve and evaluate a response into a frozen result.
    /// Writes nothing.
    pub fn evaluate(
        &self,
        document_id: Uuid,
        document: &RawDocument,
        response: ExtractionResponse,
        commodity_hint: Option<&str>,
    ) -> Result<DocumentResult, ResponseParseError> {
        let parsed = parse_extraction_response(&response.text, commodity_hint)?;
        let segments = parsed.segment_count();

        let normalizer = Normalizer::new(self.vocabulary.as_ref(), &self.values);
        let mut builder = DocumentResultBuilder::new(
            document_id,
            document.source_info(),
            commodity_hint.map(str::to_string),
            response,
        );

        for anomaly in parsed.anomalies {
            tracing::debug!(
                doc_id = %document_id,
                segment = anomaly.segment_index,
                reason = %anomaly.reason,
                "Unparseable response segment"
            );
            builder.push_parse_anomaly(anomaly);
        }

        for candidate in parsed.candidates {
            let index = builder.candidate_count();
            match normalizer.normalize(index, &candidate) {
                Ok(measurement) => {
                    builder.push_verdict(resolve_and_evaluate(self.limits.as_ref(), &measurement));
                }
                Err(anomaly) => {
                    tracing::debug!(
                        doc_id = %document_id,
                        candidate = index,
                        issues = anomaly.issues.len(),
                        "Candidate failed normalization"
                    );
                    builder.push_normalization_anomaly(anomaly);
                }
            }
            builder.push_candidate(candidate);
        }

        let result = builder.finish(APP_VERSION);
        tracing::info!(
            doc_id = %document_id,
            segments,
            candidates = result.candidates.len(),
            verdicts = result.verdicts.len(),
            anomalies = result.anomalies.len(),
            overall = result.summary.overall.as_str(),
            "Document evaluated"
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build the language-model client for the configured provider.
pub fn build_llm_client(
    settings: &PipelineSettings,
) -> Result<Box<dyn LlmClient + Send + Sync>, ProcessingError> {
    let llm = &settings.llm;
    match llm.provider {
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::new(&llm.base_url, llm.timeout_secs)?)),
        LlmProvider::OpenAi => {
            let key = llm.api_key.clone().ok_or_else(|| {
                ProcessingError::Config("an API key is required for the openai provider".into())
            })?;
            Ok(Box::new(OpenAiClient::new(&llm.base_url, key, llm.timeout_secs)?))
        }
    }
}

/// Assemble a pipeline from resolved settings.
///
/// The limit table is taken from `shared`, loading it on first use; the
/// vocabulary is every name in the table plus the optional alias file.
pub fn build_pipeline(
    settings: &PipelineSettings,
    shared: &SharedLimits,
    llm: Box<dyn LlmClient + Send + Sync>,
) -> Result<ResiduePipeline, ProcessingError> {
    let table = shared.get_or_load(|| {
        LimitTable::load(&settings.limits_path, settings.delimiter).map(|(table, _)| table)
    })?;

    let mut vocabulary = Vocabulary::from_limits(&table);
    if let Some(aliases) = &settings.aliases_path {
        vocabulary.load_aliases(aliases, settings.delimiter)?;
    }

    tracing::info!(
        provider = settings.llm.provider.as_str(),
        model = %settings.llm.model,
        limits = table.len(),
        analytes = vocabulary.analyte_count(),
        commodities = vocabulary.commodity_count(),
        "Pipeline ready"
    );

    Ok(ResiduePipeline::new(
        DocumentLoader::default(),
        ExtractionAgent::new(llm, settings.llm.provider, &settings.llm.model),
        Box::new(vocabulary),
        table,
        ValueParser::new(settings.value_policy.clone()),
        ResultWriter::new(&settings.output_dir),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
