//! The `ExecutionBackend` trait: the adapter interface for the server that
//! runs an assembled plan.
//!
//! The trait is object-safe so the orchestrator can hold an
//! `Arc<dyn ExecutionBackend>` and tests can substitute a scripted backend.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::plan::Payload;

pub use http::HttpBackend;

/// Why a submission did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The request could not be sent or the response could not be read.
    #[error("submission failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success HTTP status.
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered 2xx but the response text reports a failure.
    #[error("run reported failure: {output}")]
    LogicalFailure { output: String },
}

impl SubmissionError {
    /// Response text to retain for display, if the backend sent any.
    pub fn output(&self) -> &str {
        match self {
            Self::Transport(message) => message,
            Self::Status { body, .. } => body,
            Self::LogicalFailure { output } => output,
        }
    }
}

/// Adapter interface for the plan execution server.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Human-readable name for logs (e.g. the endpoint URL).
    fn name(&self) -> &str;

    /// Submit `payload` and return the raw response text.
    ///
    /// Implementations return `Transport` or `Status` errors for failed
    /// exchanges. Classifying a 2xx body as a logical failure is left to
    /// the orchestrator.
    async fn submit(&self, payload: &Payload) -> Result<String, SubmissionError>;
}

// Compile-time assertion: ExecutionBackend must be object-safe.
const _: Option<&dyn ExecutionBackend> = None;
