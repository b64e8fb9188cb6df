use serde_json::{Map, Value, json};

use crate::types::{ChatOptions, Message};

/// Builds a Messages API body.
///
/// Anthropic takes the system prompt as a top-level `system` string and the
/// history only as user/assistant turns. `max_tokens` is mandatory, so
/// `default_max_tokens` fills it when the caller leaves it unset.
pub(crate) fn build_messages_body(
    model: &str,
    system_prompt: Option<&str>,
    history: &[Message],
    options: &ChatOptions,
    default_max_tokens: u32,
) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));

    if let Some(system) = system_prompt {
        body.insert("system".to_string(), Value::String(system.to_string()));
    }

    let messages = history
        .iter()
        .map(|message| json!({"role": message.role.as_str(), "content": message.content}))
        .collect::<Vec<_>>();
    body.insert("messages".to_string(), Value::Array(messages));

    body.insert(
        "max_tokens".to_string(),
        Value::from(options.max_tokens.unwrap_or(default_max_tokens)),
    );
    if let Some(temperature) = options.temperature {
        body.insert("temperature".to_string(), Value::from(temperature));
    }
    if let Some(top_p) = options.top_p {
        body.insert("top_p".to_string(), Value::from(top_p));
    }
    if !options.stop_sequences.is_empty() {
        body.insert("stop_sequences".to_string(), json!(options.stop_sequences));
    }
    for (k, v) in &options.extra {
        body.insert(k.clone(), v.clone());
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_is_a_top_level_field() {
        let history = vec![Message::user("Hello"), Message::assistant("Hi"), Message::user("Bye")];
        let body = build_messages_body(
            "claude-sonnet-4-5-20250929",
            Some("be brief"),
            &history,
            &ChatOptions::default(),
            4096,
        );
        assert_eq!(
            body,
            json!({
                "model": "claude-sonnet-4-5-20250929",
                "system": "be brief",
                "messages": [
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi"},
                    {"role": "user", "content": "Bye"}
                ],
                "max_tokens": 4096
            })
        );
    }

    #[test]
    fn system_field_is_omitted_without_prompt() {
        let body = build_messages_body("m", None, &[Message::user("Hello")], &ChatOptions::default(), 10);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn options_map_to_anthropic_fields() {
        let options = ChatOptions {
            temperature: Some(0.5),
            max_tokens: Some(256),
            stop_sequences: vec!["\n\nHuman:".to_string()],
            ..ChatOptions::default()
        };
        let body = build_messages_body("m", None, &[Message::user("q")], &options, 4096);
        assert_eq!(body["max_tokens"], json!(256));
        assert_eq!(body["temperature"], json!(0.5));
        assert_eq!(body["stop_sequences"], json!(["\n\nHuman:"]));
        assert!(body.get("stop").is_none());
    }
}
