use std::fmt;
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::models::LlmProvider;
use crate::pipeline::normalize::ValuePolicy;

/// Application-level constants
pub const APP_NAME: &str = "ResidueAudit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "mistral";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Delimiter of the reference limit and alias files.
pub const DEFAULT_DELIMITER: u8 = b'|';

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,residue_audit=info,reqwest=warn,pdf_extract=error"
}

/// Application data directory: `~/ResidueAudit/`.
/// Falls back to the working directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Where result artifacts go unless overridden.
pub fn default_output_dir() -> PathBuf {
    app_data_dir().join("results")
}

/// Language-model connection settings, already resolved by the caller.
#[derive(Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    /// Required for OpenAI-compatible services, ignored by Ollama.
    pub api_key: Option<Zeroizing<String>>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Everything a pipeline run needs. The library never reads the
/// environment; `main.rs` builds this from flags and env vars.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub llm: LlmSettings,
    pub limits_path: PathBuf,
    pub aliases_path: Option<PathBuf>,
    pub delimiter: u8,
    pub output_dir: PathBuf,
    pub value_policy: ValuePolicy,
}

impl PipelineSettings {
    pub fn new(limits_path: impl Into<PathBuf>) -> Self {
        Self {
            llm: LlmSettings::default(),
            limits_path: limits_path.into(),
            aliases_path: None,
            delimiter: DEFAULT_DELIMITER,
            output_dir: default_output_dir(),
            value_policy: ValuePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_under_app_data() {
        let out = default_output_dir();
        assert!(out.starts_with(app_data_dir()));
        assert!(out.ends_with("results"));
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with(APP_NAME));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let settings = LlmSettings {
            provider: LlmProvider::OpenAi,
            api_key: Some(Zeroizing::new("sk-secret".to_string())),
            ..LlmSettings::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn settings_defaults() {
        let settings = PipelineSettings::new("limits.csv");
        assert_eq!(settings.delimiter, b'|');
        assert_eq!(settings.llm.provider, LlmProvider::Ollama);
        assert_eq!(settings.value_policy, ValuePolicy::default());
        assert!(settings.aliases_path.is_none());
    }
}
