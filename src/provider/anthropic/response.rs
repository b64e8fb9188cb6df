use crate::client::JsonResponse;
use crate::error::LLMError;
use crate::types::{ChatResult, FinishReason, TokenUsage};

use super::types::AnthropicMessageResponse;

/// Normalizes a Messages API body; the answer is every `text` block joined in order.
pub(crate) fn map_messages_response(
    response: &JsonResponse,
    provider: &'static str,
) -> Result<ChatResult, LLMError> {
    let parsed: AnthropicMessageResponse = serde_json::from_value(response.body.clone())
        .map_err(|err| response.malformed(provider, format!("unexpected messages response: {err}")))?;

    let answer = parsed
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<String>();

    let usage = parsed.usage.map(|usage| TokenUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: match (usage.input_tokens, usage.output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        },
    });

    let mut metadata = response.metadata(provider);
    // Anthropic 的 message id 作为兜底 request id
    if metadata.request_id.is_none() {
        metadata.request_id = parsed.id;
    }

    Ok(ChatResult {
        answer,
        model: parsed.model,
        finish_reason: parsed.stop_reason.as_deref().map(FinishReason::from_vendor),
        usage,
        citations: Vec::new(),
        provider: metadata,
    })
}
