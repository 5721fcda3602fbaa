//! residue-audit CLI - pesticide residue report compliance checks

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;
use zeroize::Zeroizing;

use residue_audit::config::{
    self, LlmSettings, PipelineSettings, DEFAULT_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_TIMEOUT_SECS,
};
use residue_audit::models::{DocumentResult, ExtractionResponse, LlmProvider, VerdictStatus};
use residue_audit::pipeline::compliance::SharedLimits;
use residue_audit::pipeline::normalize::{MarkerPolicy, ValuePolicy};
use residue_audit::pipeline::processor::{
    build_llm_client, build_pipeline, ProcessingError, ResiduePipeline,
};
use residue_audit::pipeline::storage::read_result;
use residue_audit::pipeline::structuring::{
    sanitize_for_llm, CancellationFlag, LlmClient, OfflineClient, PROMPT_VERSION,
};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

#[derive(Parser)]
#[command(name = "residue-audit")]
#[command(version)]
#[command(about = "Check pesticide residue lab reports against maximum residue limits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on each report, one after the other
    Check {
        /// Lab report files (PDF or plain text)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Evaluate a saved model response against its source report (no service call)
    Evaluate {
        /// File holding the model's raw answer
        #[arg(long, value_name = "FILE")]
        response: PathBuf,

        /// The report the response was produced from
        #[arg(long, value_name = "FILE")]
        source: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the verdicts stored in a result artifact
    Show {
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,

        /// Print the whole artifact as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MarkerMode {
    /// Remove marker characters from both ends of a value
    Strip,
    /// Reject values that do not end with the marker
    Require,
    /// Leave values untouched
    Keep,
}

#[derive(Args)]
struct RunArgs {
    /// Reference limit table (analyte|commodity|max_residue_limit)
    #[arg(long, value_name = "FILE", env = "RESIDUE_AUDIT_LIMITS")]
    limits: PathBuf,

    /// Alias table (kind|alias|canonical)
    #[arg(long, value_name = "FILE", env = "RESIDUE_AUDIT_ALIASES")]
    aliases: Option<PathBuf>,

    /// Field delimiter of the reference files
    #[arg(long, default_value = "|")]
    delimiter: char,

    /// Directory for result artifacts
    #[arg(short, long, value_name = "DIR", env = "RESIDUE_AUDIT_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Commodity tested, used when the report names none
    #[arg(long)]
    commodity: Option<String>,

    /// Language model provider (ollama, openai)
    #[arg(long, default_value = "ollama", env = "RESIDUE_AUDIT_PROVIDER")]
    provider: LlmProvider,

    /// Base URL of the language model service
    #[arg(long, env = "RESIDUE_AUDIT_LLM_URL")]
    llm_url: Option<String>,

    #[arg(long, default_value = DEFAULT_MODEL, env = "RESIDUE_AUDIT_MODEL")]
    model: String,

    #[arg(long, env = "RESIDUE_AUDIT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    #[arg(long, value_enum, default_value = "strip")]
    marker_mode: MarkerMode,

    /// Marker character(s) terminating extracted values
    #[arg(long = "marker", default_value = "*")]
    markers: Vec<char>,

    /// Units equal to the reference unit (repeatable)
    #[arg(long = "unit", default_value = "mg/kg")]
    units: Vec<String>,
}

impl RunArgs {
    fn settings(&self) -> Result<PipelineSettings, ProcessingError> {
        if !self.delimiter.is_ascii() {
            return Err(ProcessingError::Config(format!(
                "delimiter '{}' is not a single-byte character",
                self.delimiter
            )));
        }

        let marker = match self.marker_mode {
            MarkerMode::Strip => MarkerPolicy::Strip {
                markers: self.markers.clone(),
            },
            MarkerMode::Require => MarkerPolicy::Require {
                marker: self.markers.first().copied().unwrap_or('*'),
            },
            MarkerMode::Keep => MarkerPolicy::Keep,
        };

        let base_url = self.llm_url.clone().unwrap_or_else(|| {
            match self.provider {
                LlmProvider::Ollama => DEFAULT_OLLAMA_URL,
                LlmProvider::OpenAi => DEFAULT_OPENAI_URL,
            }
            .to_string()
        });

        Ok(PipelineSettings {
            llm: LlmSettings {
                provider: self.provider,
                base_url,
                model: self.model.clone(),
                api_key: self.api_key.clone().map(Zeroizing::new),
                timeout_secs: self.timeout,
            },
            limits_path: self.limits.clone(),
            aliases_path: self.aliases.clone(),
            delimiter: self.delimiter as u8,
            output_dir: self.output.clone().unwrap_or_else(config::default_output_dir),
            value_policy: ValuePolicy {
                marker,
                accepted_units: self.units.clone(),
            },
        })
    }

    /// `offline` builds the pipeline without a service client, for commands
    /// that never call the model.
    fn pipeline(&self, offline: bool) -> Result<(PipelineSettings, ResiduePipeline), ProcessingError> {
        let settings = self.settings()?;
        tracing::debug!(?settings, "Resolved settings");
        let llm: Box<dyn LlmClient + Send + Sync> = if offline {
            Box::new(OfflineClient)
        } else {
            build_llm_client(&settings)?
        };
        let pipeline = build_pipeline(&settings, &SharedLimits::new(), llm)?;
        Ok((settings, pipeline))
    }
}

fn main() {
    residue_audit::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { files, run } => check(&files, &run),
        Commands::Evaluate {
            response,
            source,
            run,
        } => evaluate(&response, &source, &run),
        Commands::Show { artifact, json } => show(&artifact, json),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when at least one document aborted.
fn check(files: &[PathBuf], run: &RunArgs) -> Result<bool, ProcessingError> {
    let (_, pipeline) = run.pipeline(false)?;
    let cancel = CancellationFlag::new();
    let mut all_ok = true;

    for file in files {
        match pipeline.process_file(file, run.commodity.as_deref(), &cancel) {
            Ok(outcome) => {
                print_summary(&outcome.result);
                println!("  artifact: {}", outcome.artifact_path.display());
            }
            Err(e) => {
                all_ok = false;
                tracing::error!(path = %file.display(), error = %e, "Document aborted");
                eprintln!("{}: aborted: {e}", file.display());
            }
        }
    }

    Ok(all_ok)
}

fn evaluate(response_path: &Path, source: &Path, run: &RunArgs) -> Result<bool, ProcessingError> {
    let (settings, pipeline) = run.pipeline(true)?;
    let document = pipeline.load(source)?;
    let text = std::fs::read_to_string(response_path).map_err(|e| {
        ProcessingError::Config(format!("cannot read {}: {e}", response_path.display()))
    })?;

    let now = Utc::now();
    let response = ExtractionResponse {
        text,
        provider: settings.llm.provider,
        model: settings.llm.model.clone(),
        prompt_version: PROMPT_VERSION.to_string(),
        // The saved answer came from the same capped input.
        omitted_input_bytes: sanitize_for_llm(document.text(), None).omitted_bytes,
        requested_at: now,
        received_at: now,
    };

    let outcome = pipeline.finish(
        Uuid::new_v4(),
        &document,
        response,
        run.commodity.as_deref(),
        &CancellationFlag::new(),
    )?;
    print_summary(&outcome.result);
    println!("  artifact: {}", outcome.artifact_path.display());
    Ok(true)
}

fn show(artifact: &Path, json: bool) -> Result<bool, ProcessingError> {
    let result = read_result(artifact)?;
    if json {
        let text = serde_json::to_string_pretty(&result)
            .map_err(residue_audit::pipeline::storage::PersistenceError::from)?;
        println!("{text}");
    } else {
        print_summary(&result);
    }
    Ok(true)
}

fn print_summary(result: &DocumentResult) {
    let summary = &result.summary;
    println!(
        "{} [{}] {}",
        result.source.path,
        result.document_id,
        summary.overall.as_str().to_uppercase()
    );
    println!(
        "  compliant: {}  non-compliant: {}  limit unavailable: {}  anomalies: {}",
        summary.compliant, summary.non_compliant, summary.limit_unavailable, summary.anomalies
    );

    for verdict in &result.verdicts {
        let m = &verdict.measurement;
        let limit = match (&verdict.limit, verdict.status) {
            (Some(l), VerdictStatus::NonCompliant) => format!("> {}", l.max_residue_limit),
            (Some(l), _) => format!("<= {}", l.max_residue_limit),
            (None, _) => "no limit".to_string(),
        };
        println!(
            "  {:<12} {} / {}: {} {}",
            verdict.status.as_str(),
            m.analyte,
            m.commodity,
            m.value,
            limit
        );
    }

    if result.extraction.omitted_input_bytes > 0 {
        println!(
            "  input truncated: last {} bytes of the document were not analysed",
            result.extraction.omitted_input_bytes
        );
    }
    for anomaly in result.parse_anomalies() {
        println!("  unparsed segment {}: {}", anomaly.segment_index, anomaly.reason);
    }
    for anomaly in result.normalization_anomalies() {
        let reasons: Vec<String> = anomaly.issues.iter().map(|i| i.describe()).collect();
        println!("  {}: {}", anomaly.analyte_raw, reasons.join("; "));
    }
}
