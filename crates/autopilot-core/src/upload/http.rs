//! HTTP adapter for the [`FileUploader`] port.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};

use super::{FileUploader, UploadError, UploadKind};

/// Path of the upload endpoint, relative to the backend base URL.
pub const UPLOAD_PATH: &str = "/api/auth/upload-file";

/// Uploads files as `multipart/form-data` with a `file` and a `type` part.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    /// Create an uploader for the backend at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}{UPLOAD_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FileUploader for HttpUploader {
    async fn upload(&self, file: &Path, kind: UploadKind) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(file).await.map_err(|source| UploadError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_owned());

        tracing::debug!(
            endpoint = %self.endpoint,
            file = %file.display(),
            kind = %kind,
            size = bytes.len(),
            "uploading file"
        );

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("type", kind.as_str());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Transport(format!("failed to read upload response: {e}")))?;

        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
