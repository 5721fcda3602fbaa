use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::anomaly::{Anomaly, NormalizationAnomaly, ParseAnomaly};
use super::document::{ExtractionResponse, SourceInfo};
use super::limit::LimitRecord;
use super::measurement::{CandidateMeasurement, NormalizedMeasurement};
use super::verdict::{ComplianceSummary, VerdictRecord};

/// Everything one pipeline run produced for one source document.
///
/// This is the unit persisted for audit. Candidates keep the order the
/// response listed them in; every candidate appears here whether or not it
/// normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document_id: Uuid,
    pub source: SourceInfo,
    pub commodity_hint: Option<String>,
    pub extraction: ExtractionResponse,
    pub candidates: Vec<CandidateMeasurement>,
    pub normalized: Vec<NormalizedMeasurement>,
    pub limits: Vec<LimitRecord>,
    pub verdicts: Vec<VerdictRecord>,
    pub anomalies: Vec<Anomaly>,
    pub summary: ComplianceSummary,
    pub processed_at: DateTime<Utc>,
    pub tool_version: String,
}

impl DocumentResult {
    pub fn parse_anomalies(&self) -> impl Iterator<Item = &ParseAnomaly> {
        self.anomalies.iter().filter_map(|a| match a {
            Anomaly::Parse(p) => Some(p),
            Anomaly::Normalization(_) => None,
        })
    }

    pub fn normalization_anomalies(&self) -> impl Iterator<Item = &NormalizationAnomaly> {
        self.anomalies.iter().filter_map(|a| match a {
            Anomaly::Normalization(n) => Some(n),
            Anomaly::Parse(_) => None,
        })
    }
}

/// Append-only accumulator for a `DocumentResult` under construction.
///
/// There is no way to remove or edit an entry; `finish` freezes the record.
pub struct DocumentResultBuilder {
    document_id: Uuid,
    source: SourceInfo,
    commodity_hint: Option<String>,
    extraction: ExtractionResponse,
    candidates: Vec<CandidateMeasurement>,
    normalized: Vec<NormalizedMeasurement>,
    limits: Vec<LimitRecord>,
    verdicts: Vec<VerdictRecord>,
    anomalies: Vec<Anomaly>,
}

impl DocumentResultBuilder {
    pub fn new(
        document_id: Uuid,
        source: SourceInfo,
        commodity_hint: Option<String>,
        extraction: ExtractionResponse,
    ) -> Self {
        Self {
            document_id,
            source,
            commodity_hint,
            extraction,
            candidates: Vec::new(),
            normalized: Vec::new(),
            limits: Vec::new(),
            verdicts: Vec::new(),
            anomalies: Vec::new(),
        }
    }

    /// Record a candidate and return its index.
    pub fn push_candidate(&mut self, candidate: CandidateMeasurement) -> usize {
        self.candidates.push(candidate);
        self.candidates.len() - 1
    }

    pub fn push_parse_anomaly(&mut self, anomaly: ParseAnomaly) {
        self.anomalies.push(Anomaly::Parse(anomaly));
    }

    pub fn push_normalization_anomaly(&mut self, anomaly: NormalizationAnomaly) {
        self.anomalies.push(Anomaly::Normalization(anomaly));
    }

    /// Record a verdict, along with its measurement and (deduplicated) limit.
    pub fn push_verdict(&mut self, verdict: VerdictRecord) {
        self.normalized.push(verdict.measurement.clone());
        if let Some(limit) = &verdict.limit {
            if !self.limits.contains(limit) {
                self.limits.push(limit.clone());
            }
        }
        self.verdicts.push(verdict);
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn finish(self, tool_version: &str) -> DocumentResult {
        let summary = ComplianceSummary::from_verdicts(
            &self.verdicts,
            self.anomalies.len(),
            self.extraction.omitted_input_bytes > 0,
        );
        DocumentResult {
            document_id: self.document_id,
            source: self.source,
            commodity_hint: self.commodity_hint,
            extraction: self.extraction,
            candidates: self.candidates,
            normalized: self.normalized,
            limits: self.limits,
            verdicts: self.verdicts,
            anomalies: self.anomalies,
            summary,
            processed_at: Utc::now(),
            tool_version: tool_version.to_string(),
        }
    }
}
