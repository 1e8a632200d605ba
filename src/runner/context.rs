use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Session field holding the API access token
pub const TOKEN_FIELD: &str = "Token";

/// Session field holding the authenticated user's ID
pub const USER_ID_FIELD: &str = "UserId";

/// A value captured from an API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON value into a storable field value.
    ///
    /// `null` yields `None`; objects and arrays are kept as their compact JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => Some(FieldValue::Number(n.clone())),
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            other => Some(FieldValue::Text(other.to_string())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

/// Field values accumulated over one authenticated run.
///
/// Created empty when a run starts and dropped when it ends. Only the
/// response aggregator writes to it; the gate and the resolver read it.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    fields: HashMap<String, FieldValue>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a captured field
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Store a field, replacing any previous value
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Access token, once authentication has captured one
    pub fn token(&self) -> Option<&FieldValue> {
        self.get(TOKEN_FIELD)
    }

    pub fn is_authenticated(&self) -> bool {
        self.has(TOKEN_FIELD)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Captured field names, sorted
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
