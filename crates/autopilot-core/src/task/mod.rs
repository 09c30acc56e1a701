//! Task data model: the three task kinds and their typed field records.
//!
//! A [`Task`] serializes to the wire shape the execution backend expects:
//!
//! ```text
//! { "type": "api", "config": { "url": "...", "method": "GET", "headers": {}, "body": {} } }
//! ```
//!
//! Field names on the wire (and in every user-facing message) are the
//! camelCase names listed by [`schema::fields`].

pub mod schema;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub use schema::{
    SchemaError, defaults_for, defaults_for_name, fields, is_file_field, is_json_field,
    required_extension,
};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Discriminator of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Api,
    Shell,
    Db,
}

impl TaskKind {
    /// All kinds, in the order they are offered to the user.
    pub const ALL: [TaskKind; 3] = [TaskKind::Api, TaskKind::Shell, TaskKind::Db];
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Api => "api",
            Self::Shell => "shell",
            Self::Db => "db",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Self::Api),
            "shell" => Ok(Self::Shell),
            "db" => Ok(Self::Db),
            other => Err(SchemaError::UnknownKind(other.to_owned())),
        }
    }
}

/// HTTP method of an `api` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
        };
        f.write_str(s)
    }
}

impl FromStr for HttpMethod {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            _ => Err(SchemaError::InvalidMethod(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-bearing fields
// ---------------------------------------------------------------------------

/// Value of a JSON-bearing field (`headers`, `body`).
///
/// While the user's text does not parse, the raw text is kept verbatim in
/// [`JsonField::Malformed`] so it can be corrected in place. On the wire a
/// malformed field is sent as a plain JSON string, so deserializing cannot
/// tell it apart from a parsed string and always yields [`JsonField::Parsed`].
/// Stores that need to keep the distinction record it alongside the task and
/// call [`JsonField::mark_malformed`] after loading.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonField {
    Parsed(Value),
    Malformed(String),
}

impl JsonField {
    /// Parse user-entered text, keeping the raw text when it is not JSON.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::Parsed(value),
            Err(_) => Self::Malformed(text.to_owned()),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Turn a parsed string back into the raw text it was saved from.
    /// Returns `false` and leaves the field alone for any other value.
    pub fn mark_malformed(&mut self) -> bool {
        match self {
            Self::Parsed(Value::String(raw)) => {
                let raw = std::mem::take(raw);
                *self = Self::Malformed(raw);
                true
            }
            Self::Malformed(_) => true,
            Self::Parsed(_) => false,
        }
    }

    /// `true` for a parsed `{}`.
    pub fn is_empty_object(&self) -> bool {
        matches!(self, Self::Parsed(Value::Object(map)) if map.is_empty())
    }

    /// Text shown when editing the field: empty for `{}`, pretty-printed
    /// JSON otherwise, or the raw text while malformed.
    pub fn display_text(&self) -> String {
        match self {
            Self::Parsed(_) if self.is_empty_object() => String::new(),
            Self::Parsed(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Malformed(raw) => raw.clone(),
        }
    }
}

impl Default for JsonField {
    fn default() -> Self {
        Self::Parsed(Value::Object(Map::new()))
    }
}

impl Serialize for JsonField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Parsed(value) => value.serialize(serializer),
            Self::Malformed(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for JsonField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::Parsed)
    }
}

// ---------------------------------------------------------------------------
// Per-kind field records
// ---------------------------------------------------------------------------

/// Fields of an `api` task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub url: String,
    pub method: HttpMethod,
    pub headers: JsonField,
    pub body: JsonField,
}

/// Fields of a `shell` task: run a script on a remote host over SSH.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellConfig {
    pub server_ip: String,
    pub server_username: String,
    pub shell_script_filepath: String,
    pub private_key_pem_filepath: String,
    pub pem_file_password: String,
}

/// Fields of a `db` task: run a SQL script against a database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbConfig {
    pub db_url: String,
    pub db_username: String,
    pub db_password: String,
    pub sql_filepath: String,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One step of an automation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum Task {
    Api(ApiConfig),
    Shell(ShellConfig),
    Db(DbConfig),
}

/// Borrowed view of a single field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Method(HttpMethod),
    Json(&'a JsonField),
}

impl FieldValue<'_> {
    /// Human-readable rendering of the value.
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(text) => (*text).to_owned(),
            Self::Method(method) => method.to_string(),
            Self::Json(json) => json.display_text(),
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        defaults_for(TaskKind::Api)
    }
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Api(_) => TaskKind::Api,
            Self::Shell(_) => TaskKind::Shell,
            Self::Db(_) => TaskKind::Db,
        }
    }

    /// Replace this task with the defaults of `kind`. Nothing carries over,
    /// even when `kind` equals the current kind.
    pub fn change_kind(&mut self, kind: TaskKind) {
        *self = defaults_for(kind);
    }

    /// Every declared field with its current value, in schema order.
    pub fn entries(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        match self {
            Self::Api(c) => vec![
                ("url", FieldValue::Text(&c.url)),
                ("method", FieldValue::Method(c.method)),
                ("headers", FieldValue::Json(&c.headers)),
                ("body", FieldValue::Json(&c.body)),
            ],
            Self::Shell(c) => vec![
                ("serverIp", FieldValue::Text(&c.server_ip)),
                ("serverUsername", FieldValue::Text(&c.server_username)),
                ("shellScriptFilepath", FieldValue::Text(&c.shell_script_filepath)),
                ("privateKeyPemFilepath", FieldValue::Text(&c.private_key_pem_filepath)),
                ("pemFilePassword", FieldValue::Text(&c.pem_file_password)),
            ],
            Self::Db(c) => vec![
                ("dbUrl", FieldValue::Text(&c.db_url)),
                ("dbUsername", FieldValue::Text(&c.db_username)),
                ("dbPassword", FieldValue::Text(&c.db_password)),
                ("sqlFilepath", FieldValue::Text(&c.sql_filepath)),
            ],
        }
    }

    /// Look up one field by its wire name.
    pub fn field(&self, name: &str) -> Result<FieldValue<'_>, SchemaError> {
        self.entries()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
            .ok_or_else(|| self.unknown_field(name))
    }

    /// Text to pre-fill when editing field `name`.
    pub fn field_value(&self, name: &str) -> Result<String, SchemaError> {
        self.field(name).map(|value| value.display_text())
    }

    /// Mutable access to a JSON-bearing field, `None` for any other name.
    pub fn json_field_mut(&mut self, name: &str) -> Option<&mut JsonField> {
        match (self, name) {
            (Self::Api(c), "headers") => Some(&mut c.headers),
            (Self::Api(c), "body") => Some(&mut c.body),
            _ => None,
        }
    }

    /// Set a field from user-entered text.
    ///
    /// `method` accepts `GET`/`POST` in any case. JSON fields keep the raw
    /// text as [`JsonField::Malformed`] when it does not parse, so this only
    /// fails for unknown fields or methods.
    pub fn set_field(&mut self, name: &str, text: &str) -> Result<(), SchemaError> {
        let unknown = self.unknown_field(name);
        let slot: &mut String = match (self, name) {
            (Self::Api(c), "method") => {
                c.method = text.parse()?;
                return Ok(());
            }
            (Self::Api(c), "headers") => {
                c.headers = JsonField::from_text(text);
                return Ok(());
            }
            (Self::Api(c), "body") => {
                c.body = JsonField::from_text(text);
                return Ok(());
            }
            (Self::Api(c), "url") => &mut c.url,
            (Self::Shell(c), "serverIp") => &mut c.server_ip,
            (Self::Shell(c), "serverUsername") => &mut c.server_username,
            (Self::Shell(c), "shellScriptFilepath") => &mut c.shell_script_filepath,
            (Self::Shell(c), "privateKeyPemFilepath") => &mut c.private_key_pem_filepath,
            (Self::Shell(c), "pemFilePassword") => &mut c.pem_file_password,
            (Self::Db(c), "dbUrl") => &mut c.db_url,
            (Self::Db(c), "dbUsername") => &mut c.db_username,
            (Self::Db(c), "dbPassword") => &mut c.db_password,
            (Self::Db(c), "sqlFilepath") => &mut c.sql_filepath,
            _ => return Err(unknown),
        };
        *slot = text.to_owned();
        Ok(())
    }

    fn unknown_field(&self, name: &str) -> SchemaError {
        SchemaError::UnknownField {
            kind: self.kind(),
            field: name.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_task_is_api_with_empty_fields() {
        let task = Task::default();
        assert_eq!(task.kind(), TaskKind::Api);
        let Task::Api(config) = task else {
            panic!("expected api task");
        };
        assert_eq!(config.url, "");
        assert_eq!(config.method, HttpMethod::Get);
        assert!(config.headers.is_empty_object());
        assert!(config.body.is_empty_object());
    }

    #[test]
    fn serializes_to_type_and_config() {
        let task = Task::Shell(ShellConfig {
            server_ip: "10.0.0.4".to_owned(),
            ..ShellConfig::default()
        });
        let value = serde_json::to_value(&task).expect("should serialize");
        assert_eq!(
            value,
            json!({
                "type": "shell",
                "config": {
                    "serverIp": "10.0.0.4",
                    "serverUsername": "",
                    "shellScriptFilepath": "",
                    "privateKeyPemFilepath": "",
                    "pemFilePassword": ""
                }
            })
        );
    }

    #[test]
    fn api_task_wire_shape_uses_uppercase_method() {
        let mut task = Task::default();
        task.set_field("method", "post").expect("method should parse");
        task.set_field("body", r#"{"id": 7}"#).expect("body is a field");
        let value = serde_json::to_value(&task).expect("should serialize");
        assert_eq!(value["config"]["method"], "POST");
        assert_eq!(value["config"]["body"], json!({"id": 7}));
        assert_eq!(value["config"]["headers"], json!({}));
    }

    #[test]
    fn malformed_json_goes_on_the_wire_as_a_string() {
        let mut task = Task::default();
        task.set_field("headers", "{bad json").expect("headers is a field");
        let value = serde_json::to_value(&task).expect("should serialize");
        assert_eq!(value["config"]["headers"], "{bad json");

        let mut back: Task = serde_json::from_value(value).expect("should deserialize");
        let headers = back.json_field_mut("headers").expect("headers is JSON");
        assert_eq!(headers, &JsonField::Parsed(json!("{bad json")));
        assert!(headers.mark_malformed());
        assert_eq!(back, task);
    }

    #[test]
    fn parsed_json_string_stays_parsed_after_roundtrip() {
        let mut task = Task::default();
        task.set_field("body", r#""hello""#).expect("body is a field");
        let Task::Api(config) = &task else {
            panic!("expected api task");
        };
        assert_eq!(config.body, JsonField::Parsed(json!("hello")));

        let text = serde_json::to_string(&task).expect("should serialize");
        let back: Task = serde_json::from_str(&text).expect("should deserialize");
        assert_eq!(back, task);
    }

    #[test]
    fn mark_malformed_only_applies_to_strings() {
        let mut field = JsonField::from_text(r#"{"a":1}"#);
        assert!(!field.mark_malformed());
        assert_eq!(field, JsonField::Parsed(json!({"a": 1})));
        assert!(Task::default().json_field_mut("url").is_none());
    }

    #[test]
    fn change_kind_discards_previous_fields() {
        let mut task = Task::default();
        task.set_field("url", "https://example.com").unwrap();
        task.change_kind(TaskKind::Db);
        assert_eq!(task, defaults_for(TaskKind::Db));

        task.set_field("dbUrl", "jdbc:postgresql://db/app").unwrap();
        task.change_kind(TaskKind::Db);
        assert_eq!(task, defaults_for(TaskKind::Db), "same-kind change still resets");
    }

    #[test]
    fn set_field_rejects_fields_of_other_kinds() {
        let mut task = defaults_for(TaskKind::Shell);
        let err = task.set_field("url", "https://example.com").unwrap_err();
        assert!(
            matches!(err, SchemaError::UnknownField { kind: TaskKind::Shell, ref field } if field == "url"),
            "expected UnknownField, got: {err}"
        );
    }

    #[test]
    fn set_field_rejects_unknown_method() {
        let mut task = Task::default();
        let err = task.set_field("method", "DELETE").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidMethod(_)), "got: {err}");
    }

    #[test]
    fn entries_follow_schema_order() {
        for kind in TaskKind::ALL {
            let task = defaults_for(kind);
            let names: Vec<&str> = task.entries().into_iter().map(|(n, _)| n).collect();
            assert_eq!(names, fields(kind), "field order for {kind}");
        }
    }

    #[test]
    fn json_display_text_hides_empty_object() {
        assert_eq!(JsonField::default().display_text(), "");
        assert_eq!(
            JsonField::Malformed("{oops".to_owned()).display_text(),
            "{oops"
        );
        let parsed = JsonField::from_text(r#"{"a":1}"#);
        assert_eq!(parsed.display_text(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn field_value_renders_for_editing() {
        let mut task = Task::default();
        task.set_field("method", "post").unwrap();
        assert_eq!(task.field_value("method").unwrap(), "POST");
        assert_eq!(task.field_value("headers").unwrap(), "");
        assert!(task.field_value("dbUrl").is_err());
    }

    #[test]
    fn kind_parse_rejects_unknown_names() {
        assert_eq!("db".parse::<TaskKind>().unwrap(), TaskKind::Db);
        let err = "ftp".parse::<TaskKind>().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownKind(ref k) if k == "ftp"));
    }
}
