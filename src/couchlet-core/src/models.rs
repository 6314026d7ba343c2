use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document is a JSON object with two reserved keys: `_id` and `_rev`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON value; `None` if it is not an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get("_id").and_then(Value::as_str)
    }

    pub fn rev(&self) -> Option<&str> {
        self.fields.get("_rev").and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.fields.insert("_id".to_string(), Value::String(id.into()));
    }

    pub fn set_rev(&mut self, rev: impl Into<String>) {
        self.fields.insert("_rev".to_string(), Value::String(rev.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Body returned by a successful write: `{"ok": true, "id": ..., "rev": ...}`
#[derive(Debug, Clone, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub ok: bool,
    pub id: String,
    pub rev: String,
}

/// Structured error body: `{"error": ..., "reason": ...}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ErrorBody {
    /// Extract `error`/`reason` from an error body, if it carries them
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let error = text_field(object.get("error")?);
        let reason = object.get("reason").filter(|v| !v.is_null()).map(text_field);
        Some(Self { error, reason })
    }
}

fn text_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UuidsResponse {
    pub uuids: Vec<String>,
}

/// Result of a `HEAD` existence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Existence {
    pub exists: bool,
    /// Revision from the `ETag` header, quotes stripped
    pub rev: Option<String>,
}

impl Existence {
    pub fn missing() -> Self {
        Self {
            exists: false,
            rev: None,
        }
    }
}

/// Strip the surrounding quotes from an `ETag` value
pub fn revision_from_etag(etag: &str) -> String {
    etag.trim().trim_matches('"').to_string()
}
