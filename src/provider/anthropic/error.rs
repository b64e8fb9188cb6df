use serde::Deserialize;

/// Extracts a readable message from an Anthropic error body:
/// `{"type": "error", "error": {"type": ..., "message": ...}}`.
pub(crate) fn extract_anthropic_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }

    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        r#type: Option<String>,
    }

    let error = serde_json::from_str::<ErrorBody>(body).ok()?.error?;
    let message = error.message.unwrap_or_else(|| "unknown error".to_string());
    Some(match error.r#type {
        Some(kind) => format!("{message} ({kind})"),
        None => message,
    })
}
