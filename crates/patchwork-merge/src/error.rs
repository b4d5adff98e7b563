use serde_json::Value;
use thiserror::Error;

/// Errors raised while building a [`Patch`](crate::Patch) from external input.
///
/// Merging itself never fails; these only surface at the decoding boundary.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("invalid patch JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid assignment '{0}': expected KEY=VALUE")]
    InvalidAssignment(String),

    #[error("invalid assignment '{0}': key must not be empty")]
    EmptyKey(String),
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
