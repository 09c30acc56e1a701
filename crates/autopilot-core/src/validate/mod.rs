//! Field-level task validation.
//!
//! [`validate_task`] checks every declared field of a task's current kind:
//! - Text fields must be non-empty after trimming.
//! - A `POST` api task must not send `{}` as `headers` or `body`.
//! - JSON fields holding malformed text report [`INVALID_JSON`] and skip
//!   the other checks until corrected.
//!
//! [`check_extension`] guards file attachments before they are uploaded.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::task::{FieldValue, HttpMethod, Task, required_extension};

/// Field name to message, holding only the fields that are invalid.
pub type FieldErrors = BTreeMap<String, String>;

/// Message for a blank field in the short (per-edit) style.
pub const REQUIRED: &str = "Required";

/// Message for `{}` in a `POST` api task's `headers` or `body`.
pub const EMPTY_JSON: &str = "Cannot be empty JSON";

/// Message for a JSON field whose text does not parse.
pub const INVALID_JSON: &str = "Invalid JSON";

/// Which wording a call site uses for blank fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    /// `"Required"`, shown next to the field while editing.
    Short,
    /// `"<field> is required"`, used by whole-plan validation.
    Long,
}

impl MessageStyle {
    fn required(self, field: &str) -> String {
        match self {
            Self::Short => REQUIRED.to_owned(),
            Self::Long => format!("{field} is required"),
        }
    }
}

/// Compute the error map for one task.
pub fn validate_task(task: &Task, style: MessageStyle) -> FieldErrors {
    let is_post = matches!(task, Task::Api(c) if c.method == HttpMethod::Post);
    let mut errors = FieldErrors::new();

    for (field, value) in task.entries() {
        match value {
            FieldValue::Text(text) if text.trim().is_empty() => {
                errors.insert(field.to_owned(), style.required(field));
            }
            FieldValue::Json(json) if json.is_malformed() => {
                errors.insert(field.to_owned(), INVALID_JSON.to_owned());
            }
            FieldValue::Json(json) if is_post && json.is_empty_object() => {
                errors.insert(field.to_owned(), EMPTY_JSON.to_owned());
            }
            _ => {}
        }
    }

    errors
}

/// A file was attached to a field that requires a different extension.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Only {expected} files are allowed.")]
pub struct ExtensionMismatch {
    pub field: String,
    pub expected: &'static str,
    pub file_name: String,
}

/// Check that `file` may be attached to `field`.
///
/// Returns the lowercase extension of the file (with leading dot), or an
/// empty string when it has none. Fields without a required extension
/// accept any file.
pub fn check_extension(field: &str, file: &Path) -> Result<String, ExtensionMismatch> {
    let extension = file
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    match required_extension(field) {
        Some(expected) if extension != expected => Err(ExtensionMismatch {
            field: field.to_owned(),
            expected,
            file_name: file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }),
        _ => Ok(extension),
    }
}
