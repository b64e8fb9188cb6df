use serde::Deserialize;
use serde_json::Value;

/// Extracts a readable message from an OpenAI-style error body:
/// `{"error": {"message": ..., "type": ..., "code": ...}}`.
pub(crate) fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }
    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        r#type: Option<String>,
        code: Option<Value>,
    }

    let error = serde_json::from_str::<ErrorBody>(body).ok()?.error?;
    let message = error.message.unwrap_or_else(|| "unknown error".to_string());
    let code = match error.code {
        Some(Value::String(code)) => Some(code),
        Some(Value::Null) | None => error.r#type,
        Some(other) => Some(other.to_string()),
    };
    Some(match code {
        Some(code) => format!("{message} ({code})"),
        None => message,
    })
}
