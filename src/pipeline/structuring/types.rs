use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ExtractionServiceError;

/// Language-model client abstraction (allows mocking).
///
/// A single request/response contract: instruction + document in, free text out.
pub trait LlmClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, ExtractionServiceError>;
}

/// Client for runs that evaluate a saved response and never call a service.
/// Any call fails with [`ExtractionServiceError::Offline`].
pub struct OfflineClient;

impl LlmClient for OfflineClient {
    fn generate(
        &self,
        _model: &str,
        _prompt: &str,
        _system: &str,
    ) -> Result<String, ExtractionServiceError> {
        Err(ExtractionServiceError::Offline)
    }
}

/// Caller-owned cancellation signal, cheap to clone across threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
