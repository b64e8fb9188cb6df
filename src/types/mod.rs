//! Shared data structures for unified chat and embedding calls.
//!
//! These types normalize provider-specific payloads so callers can stay agnostic of
//! individual API differences.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LLMError;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LLMError;

    /// Parses a wire role name.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_connectors::types::Role;
    ///
    /// assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
    /// assert!("tool".parse::<Role>().is_err());
    /// ```
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(LLMError::validation(format!("unknown message role: {other}"))),
        }
    }
}

/// One role-tagged turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Per-call chat parameters.
///
/// `None` fields fall back to the provider client's defaults. `extra` is forwarded
/// verbatim into the vendor payload for parameters this crate does not model, but it
/// may not shadow fields the client owns (model, messages, system prompt, ...).
///
/// # Examples
///
/// ```
/// use llm_connectors::types::ChatOptions;
///
/// let options = ChatOptions {
///     temperature: Some(0.2),
///     stop_sequences: vec!["\n\n".into()],
///     ..ChatOptions::answer_only()
/// };
/// assert!(options.return_only_answer);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    /// Return only the extracted assistant text instead of the full result.
    #[serde(default)]
    pub return_only_answer: bool,
    /// Vendor-specific parameters passed through untouched.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl ChatOptions {
    /// Default options that request the bare answer text.
    pub fn answer_only() -> Self {
        Self {
            return_only_answer: true,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Checks the options against a provider's parameter schema.
    pub(crate) fn validate(&self, schema: &OptionSchema) -> Result<(), LLMError> {
        validate_model(self.model.as_deref())?;
        if let Some(temperature) = self.temperature {
            let in_range = temperature.is_finite()
                && temperature >= 0.0
                && if schema.temperature_max_inclusive {
                    temperature <= schema.max_temperature
                } else {
                    temperature < schema.max_temperature
                };
            if !in_range {
                let bound = if schema.temperature_max_inclusive { "]" } else { ")" };
                return Err(LLMError::validation(format!(
                    "temperature {temperature} outside [0, {}{bound} for {}",
                    schema.max_temperature, schema.provider
                )));
            }
        }
        if let Some(top_p) = self.top_p {
            if !top_p.is_finite() || !(0.0..=1.0).contains(&top_p) {
                return Err(LLMError::validation(format!(
                    "top_p {top_p} outside [0, 1]"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(LLMError::validation("max_tokens must be positive"));
        }
        if self.stop_sequences.iter().any(|stop| stop.is_empty()) {
            return Err(LLMError::validation("stop sequences must not be empty"));
        }
        validate_extra(&self.extra, schema)
    }
}

/// Per-call embedding parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingOptions {
    pub model: Option<String>,
    /// Requested output dimensionality, where the model supports shortening.
    pub dimensions: Option<u32>,
    /// Return only the first embedding vector instead of the full result.
    #[serde(default)]
    pub return_only_embeddings: bool,
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl EmbeddingOptions {
    pub fn vector_only() -> Self {
        Self {
            return_only_embeddings: true,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self, schema: &OptionSchema) -> Result<(), LLMError> {
        validate_model(self.model.as_deref())?;
        if self.dimensions == Some(0) {
            return Err(LLMError::validation("dimensions must be positive"));
        }
        validate_extra(&self.extra, schema)
    }
}

/// Parameter constraints of one provider endpoint.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OptionSchema {
    pub(crate) provider: &'static str,
    pub(crate) max_temperature: f64,
    pub(crate) temperature_max_inclusive: bool,
    /// Payload keys built by the client itself; `extra` may not override them.
    pub(crate) reserved: &'static [&'static str],
}

fn validate_model(model: Option<&str>) -> Result<(), LLMError> {
    match model {
        Some(model) if model.trim().is_empty() => {
            Err(LLMError::validation("model must not be empty"))
        }
        _ => Ok(()),
    }
}

fn validate_extra(extra: &HashMap<String, Value>, schema: &OptionSchema) -> Result<(), LLMError> {
    if let Some(key) = extra
        .keys()
        .find(|key| schema.reserved.contains(&key.as_str()))
    {
        return Err(LLMError::validation(format!(
            "extra parameter {key:?} is managed by the {} client and cannot be overridden",
            schema.provider
        )));
    }
    Ok(())
}

/// Either the bare answer text or the full normalized result.
#[derive(Debug, Clone)]
pub enum ChatOutput {
    Answer(String),
    Full(ChatResult),
}

impl ChatOutput {
    /// Assistant text regardless of the variant.
    pub fn text(&self) -> &str {
        match self {
            ChatOutput::Answer(text) => text,
            ChatOutput::Full(result) => &result.answer,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ChatOutput::Answer(text) => text,
            ChatOutput::Full(result) => result.answer,
        }
    }

    pub fn into_result(self) -> Option<ChatResult> {
        match self {
            ChatOutput::Full(result) => Some(result),
            ChatOutput::Answer(_) => None,
        }
    }
}

/// Normalized chat completion result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    /// Primary assistant answer text.
    pub answer: String,
    /// Model that served the request as reported by the provider.
    pub model: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<TokenUsage>,
    /// Source URLs returned by search-backed providers.
    #[serde(default)]
    pub citations: Vec<String>,
    pub provider: ProviderMetadata,
}

/// Either the first embedding vector or the full normalized result.
#[derive(Debug, Clone)]
pub enum EmbeddingsOutput {
    Vector(Vec<f32>),
    Full(EmbeddingsResult),
}

impl EmbeddingsOutput {
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            EmbeddingsOutput::Vector(vector) => Some(vector),
            EmbeddingsOutput::Full(result) => result.embeddings.into_iter().next(),
        }
    }
}

/// Normalized embeddings result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsResult {
    /// One vector per input, in input order.
    pub embeddings: Vec<Vec<f32>>,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    pub provider: ProviderMetadata,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    StopSequence,
    ContentFilter,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    /// Maps vendor finish/stop reasons onto the shared enum.
    pub(crate) fn from_vendor(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            "stop_sequence" => FinishReason::StopSequence,
            "content_filter" | "refusal" => FinishReason::ContentFilter,
            "tool_calls" | "tool_use" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// Where a result came from, plus the untouched response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub provider: String,
    pub endpoint: Option<String>,
    pub request_id: Option<String>,
    /// Full JSON body as returned by the provider.
    pub raw: Value,
}

/// Capability matrix of a provider client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub supports_embeddings: bool,
    pub supports_stop_sequences: bool,
    /// System prompt travels in a dedicated field instead of the message list.
    pub separate_system_prompt: bool,
    pub returns_citations: bool,
}
