//! HTTP adapter for the [`ExecutionBackend`] port.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{ExecutionBackend, SubmissionError};
use crate::plan::Payload;

/// Path of the run endpoint, relative to the backend base URL.
pub const RUN_CONFIG_PATH: &str = "/api/auth/run-config";

/// Posts the payload as JSON and reads the response as text.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: String,
}

impl HttpBackend {
    /// Create a backend client for the server at `base_url`.
    ///
    /// `timeout` bounds the whole exchange; runs execute synchronously on
    /// the server, so it should be generous.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SubmissionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}{RUN_CONFIG_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn submit(&self, payload: &Payload) -> Result<String, SubmissionError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            tasks = payload.task_count(),
            "posting run configuration"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmissionError::Transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(SubmissionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
