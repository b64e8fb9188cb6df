use serde_json::{Map, Value, json};

use crate::types::{ChatOptions, EmbeddingOptions, Message};

/// Sampling values a client applies when the caller leaves them unset.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SamplingDefaults {
    pub(crate) temperature: Option<f64>,
    pub(crate) max_tokens: Option<u32>,
}

/// Builds a Chat Completions body: the system prompt becomes the first message,
/// followed by the full conversation history.
///
/// `max_tokens_field` differs between OpenAI (`max_completion_tokens`) and
/// OpenAI-compatible vendors that still use `max_tokens`.
pub(crate) fn build_chat_body(
    model: &str,
    system_prompt: Option<&str>,
    history: &[Message],
    options: &ChatOptions,
    defaults: SamplingDefaults,
    max_tokens_field: &str,
) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));

    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(prompt) = system_prompt {
        messages.push(json!({"role": "system", "content": prompt}));
    }
    messages.extend(
        history
            .iter()
            .map(|message| json!({"role": message.role.as_str(), "content": message.content})),
    );
    body.insert("messages".to_string(), Value::Array(messages));

    if let Some(temperature) = options.temperature.or(defaults.temperature) {
        body.insert("temperature".to_string(), Value::from(temperature));
    }
    if let Some(top_p) = options.top_p {
        body.insert("top_p".to_string(), Value::from(top_p));
    }
    if let Some(max_tokens) = options.max_tokens.or(defaults.max_tokens) {
        body.insert(max_tokens_field.to_string(), Value::from(max_tokens));
    }
    if !options.stop_sequences.is_empty() {
        body.insert("stop".to_string(), json!(options.stop_sequences));
    }
    for (k, v) in &options.extra {
        body.insert(k.clone(), v.clone());
    }
    Value::Object(body)
}

pub(crate) fn build_embeddings_body(model: &str, input: &str, options: &EmbeddingOptions) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert("input".to_string(), Value::String(input.to_string()));
    body.insert(
        "encoding_format".to_string(),
        Value::String("float".to_string()),
    );
    if let Some(dimensions) = options.dimensions {
        body.insert("dimensions".to_string(), Value::from(dimensions));
    }
    for (k, v) in &options.extra {
        body.insert(k.clone(), v.clone());
    }
    Value::Object(body)
}
