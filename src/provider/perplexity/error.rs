use serde::Deserialize;
use serde_json::Value;

use crate::provider::openai::error::extract_openai_error;

/// Perplexity returns OpenAI-style error bodies, except for request validation
/// failures which come back as `{"detail": ...}`.
pub(crate) fn extract_perplexity_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct DetailBody {
        detail: Value,
    }

    if let Some(message) = extract_openai_error(body) {
        return Some(message);
    }
    match serde_json::from_str::<DetailBody>(body).ok()?.detail {
        Value::String(detail) => Some(detail),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
