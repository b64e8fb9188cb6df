use crate::client::JsonResponse;
use crate::error::LLMError;
use crate::provider::openai::response::chat_result_from;
use crate::types::ChatResult;

use super::types::PerplexityChatResponse;

/// Normalizes a Sonar response; citations come from `citations`, or from the
/// `search_results` URLs when the flat list is absent.
pub(crate) fn map_sonar_response(
    response: &JsonResponse,
    provider: &'static str,
) -> Result<ChatResult, LLMError> {
    let parsed: PerplexityChatResponse = serde_json::from_value(response.body.clone())
        .map_err(|err| response.malformed(provider, format!("unexpected chat response: {err}")))?;

    let citations = if parsed.citations.is_empty() {
        parsed
            .search_results
            .into_iter()
            .filter_map(|result| result.url)
            .collect()
    } else {
        parsed.citations
    };

    let mut result = chat_result_from(parsed.chat, response, provider)?;
    result.citations = citations;
    Ok(result)
}
