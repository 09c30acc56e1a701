//! File upload collaborator.
//!
//! Shell and db tasks reference files (SSH keys, scripts, SQL) by their
//! path on the execution server. A [`FileUploader`] sends a local file to
//! the server and returns that path, which becomes the field value verbatim.

pub mod http;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpUploader;

/// The `type` part of an upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pem,
    Sql,
    Sh,
}

impl UploadKind {
    /// Derive the kind from a file extension (with or without leading dot).
    /// Anything that is neither `.pem` nor `.sql` is sent as a shell script.
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pem" => Self::Pem,
            "sql" => Self::Sql,
            _ => Self::Sh,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pem => "pem",
            Self::Sql => "sql",
            Self::Sh => "sh",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from an upload attempt. The field keeps its previous value.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload request failed: {0}")]
    Transport(String),

    #[error("upload service returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends local files to the execution server.
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Upload `file` as `kind` and return the server-side path.
    async fn upload(&self, file: &Path, kind: UploadKind) -> Result<String, UploadError>;
}
