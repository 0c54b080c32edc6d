//! Turns raw OCR engine output into an [`OcrResult`]

use crate::error::RelayError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Key that marks a result as a failure instead of extracted fields
pub const ERROR_KEY: &str = "error";

/// Extracted fields as a JSON object, or `{"error": ...}` on failure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OcrResult(Map<String, Value>);

impl OcrResult {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// A result carrying only an error message
    pub fn error(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(ERROR_KEY.to_string(), Value::String(message.into()));
        Self(fields)
    }

    pub fn is_error(&self) -> bool {
        self.0.contains_key(ERROR_KEY)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.0.get(ERROR_KEY).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<RelayError> for OcrResult {
    fn from(err: RelayError) -> Self {
        OcrResult::error(err.to_string())
    }
}

/// Parse `raw` as a JSON object
pub fn try_decode(raw: &str) -> Result<OcrResult, RelayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RelayError::Decode("OCR engine produced no output".to_string()));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(fields)) => Ok(OcrResult(fields)),
        Ok(other) => Err(RelayError::Decode(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
        Err(e) => Err(RelayError::Decode(e.to_string())),
    }
}

/// Like [`try_decode`], but malformed output becomes an error result
pub fn decode(raw: &str) -> OcrResult {
    match try_decode(raw) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(output_len = raw.len(), "{}", e);
            tracing::debug!(output = %raw, "Undecodable OCR output");
            e.into()
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
