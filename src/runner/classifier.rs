use super::context::{FieldValue, SessionState};
use super::dispatcher::HttpResponse;
use super::state::OutcomeStatus;
use crate::parser::types::CollectField;
use serde_json::Value;

/// Top-level body field the API uses to signal an error
pub const ERROR_TYPE_FIELD: &str = "ErrorType";

/// Error code for a principal without access to the endpoint
pub const INVALID_AUTHORIZATION: &str = "INVALID_AUTHORIZATION";

/// Classified status and report detail for one response
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: OutcomeStatus,
    pub detail: String,
}

/// The body's error code, if it carries a non-empty one
pub fn error_type(body: &Value) -> Option<String> {
    match body.get(ERROR_TYPE_FIELD)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Classify a response by its error signal.
///
/// Only `INVALID_AUTHORIZATION` is distinguished. Any other error code is
/// reported like a success so the API's own error payload stays visible.
pub fn classify(response: &HttpResponse) -> Classification {
    match error_type(&response.json) {
        Some(code) if code == INVALID_AUTHORIZATION => Classification {
            status: OutcomeStatus::Unauthorized,
            detail: format!(
                "Error {}: this user is not authorized to access this endpoint",
                response.status
            ),
        },
        Some(code) => {
            log::warn!("API reported error {} (HTTP {})", code, response.status);
            Classification {
                status: OutcomeStatus::Success,
                detail: pretty_body(response),
            }
        }
        None => Classification {
            status: OutcomeStatus::Success,
            detail: pretty_body(response),
        },
    }
}

fn pretty_body(response: &HttpResponse) -> String {
    serde_json::to_string_pretty(&response.json).unwrap_or_else(|_| response.raw_body.clone())
}

/// Copy the fields named in `collect` from `body` into the session.
///
/// Object bodies are read directly; array bodies are read from their first
/// element. Absent and `null` fields are skipped. Returns the session names
/// that were written.
pub fn aggregate(body: &Value, collect: &[CollectField], state: &mut SessionState) -> Vec<String> {
    let source = match body {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    let Some(source) = source else {
        return Vec::new();
    };

    let mut stored = Vec::new();
    for field in collect {
        if let Some(value) = source.get(&field.source).and_then(FieldValue::from_json) {
            state.set(&field.store_as, value);
            stored.push(field.store_as.clone());
        }
    }
    stored
}
