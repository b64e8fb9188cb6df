use crate::client::JsonResponse;
use crate::error::LLMError;
use crate::types::{ChatResult, EmbeddingsResult, FinishReason, TokenUsage};

use super::types::{
    OpenAiChatResponse, OpenAiEmbeddingResponse, OpenAiMessageContent, OpenAiUsage,
};

/// Normalizes a Chat Completions body. The answer is the first choice's message text.
pub(crate) fn map_chat_response(
    response: &JsonResponse,
    provider: &'static str,
) -> Result<ChatResult, LLMError> {
    let parsed: OpenAiChatResponse = serde_json::from_value(response.body.clone())
        .map_err(|err| response.malformed(provider, format!("unexpected chat response: {err}")))?;
    chat_result_from(parsed, response, provider)
}

/// Shared by OpenAI-compatible providers that wrap [`OpenAiChatResponse`].
pub(crate) fn chat_result_from(
    parsed: OpenAiChatResponse,
    response: &JsonResponse,
    provider: &'static str,
) -> Result<ChatResult, LLMError> {
    let choice = parsed
        .choices
        .iter()
        .min_by_key(|choice| choice.index)
        .ok_or_else(|| response.malformed(provider, "response contains no choices"))?;

    let answer = choice
        .message
        .as_ref()
        .map(|message| match &message.content {
            Some(OpenAiMessageContent::Text(text)) => text.clone(),
            Some(OpenAiMessageContent::Parts(parts)) => parts
                .iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
            None => message.refusal.clone().unwrap_or_default(),
        })
        .unwrap_or_default();

    Ok(ChatResult {
        answer,
        model: parsed.model.clone(),
        finish_reason: choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from_vendor),
        usage: parsed.usage.clone().map(convert_usage),
        citations: Vec::new(),
        provider: response.metadata(provider),
    })
}

/// Normalizes an embeddings body; vectors are ordered by their `index`.
pub(crate) fn map_embeddings_response(
    response: &JsonResponse,
    provider: &'static str,
) -> Result<EmbeddingsResult, LLMError> {
    let mut parsed: OpenAiEmbeddingResponse = serde_json::from_value(response.body.clone())
        .map_err(|err| {
            response.malformed(provider, format!("unexpected embeddings response: {err}"))
        })?;
    if parsed.data.is_empty() {
        return Err(response.malformed(provider, "response contains no embeddings"));
    }
    parsed.data.sort_by_key(|item| item.index);

    Ok(EmbeddingsResult {
        embeddings: parsed.data.into_iter().map(|item| item.embedding).collect(),
        model: parsed.model,
        usage: parsed.usage.map(convert_usage),
        provider: response.metadata(provider),
    })
}

pub(crate) fn convert_usage(usage: OpenAiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}
