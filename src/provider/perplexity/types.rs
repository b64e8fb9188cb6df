use serde::{Deserialize, Serialize};

use crate::provider::openai::types::OpenAiChatResponse;

/// Chat Completions body plus Perplexity's source attributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PerplexityChatResponse {
    #[serde(flatten)]
    pub(crate) chat: OpenAiChatResponse,
    #[serde(default)]
    pub(crate) citations: Vec<String>,
    #[serde(default)]
    pub(crate) search_results: Vec<PerplexitySearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PerplexitySearchResult {
    #[serde(default)]
    pub(crate) url: Option<String>,
}
