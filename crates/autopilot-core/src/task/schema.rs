//! Task schema registry: the field set and default record of each kind.

use thiserror::Error;

use super::{ApiConfig, DbConfig, ShellConfig, Task, TaskKind};

/// Wire names of the `api` fields, in declaration order.
pub const API_FIELDS: &[&str] = &["url", "method", "headers", "body"];

/// Wire names of the `shell` fields, in declaration order.
pub const SHELL_FIELDS: &[&str] = &[
    "serverIp",
    "serverUsername",
    "shellScriptFilepath",
    "privateKeyPemFilepath",
    "pemFilePassword",
];

/// Wire names of the `db` fields, in declaration order.
pub const DB_FIELDS: &[&str] = &["dbUrl", "dbUsername", "dbPassword", "sqlFilepath"];

/// Errors raised when a kind or field name does not match the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown task kind {0:?} (expected api, shell, or db)")]
    UnknownKind(String),

    #[error("{kind} tasks have no field {field:?}")]
    UnknownField { kind: TaskKind, field: String },

    #[error("invalid method {0:?} (expected GET or POST)")]
    InvalidMethod(String),

    #[error("field {0:?} does not take a file")]
    NotAFileField(String),
}

/// Default record for `kind`: every string empty, `GET`, and `{}` for JSON.
pub fn defaults_for(kind: TaskKind) -> Task {
    match kind {
        TaskKind::Api => Task::Api(ApiConfig::default()),
        TaskKind::Shell => Task::Shell(ShellConfig::default()),
        TaskKind::Db => Task::Db(DbConfig::default()),
    }
}

/// Defaults for a kind given by name, e.g. from the command line.
pub fn defaults_for_name(kind: &str) -> Result<Task, SchemaError> {
    Ok(defaults_for(kind.parse()?))
}

/// Declared fields of `kind`.
pub fn fields(kind: TaskKind) -> &'static [&'static str] {
    match kind {
        TaskKind::Api => API_FIELDS,
        TaskKind::Shell => SHELL_FIELDS,
        TaskKind::Db => DB_FIELDS,
    }
}

/// Whether `field` is edited as JSON text.
pub fn is_json_field(kind: TaskKind, field: &str) -> bool {
    kind == TaskKind::Api && matches!(field, "headers" | "body")
}

/// Whether `field` holds a server-side file path filled in by an upload.
pub fn is_file_field(field: &str) -> bool {
    field.to_ascii_lowercase().contains("path")
}

/// Extension (with leading dot) a file attached to `field` must have.
pub fn required_extension(field: &str) -> Option<&'static str> {
    match field {
        "privateKeyPemFilepath" => Some(".pem"),
        "shellScriptFilepath" => Some(".sh"),
        "sqlFilepath" => Some(".sql"),
        _ => None,
    }
}
