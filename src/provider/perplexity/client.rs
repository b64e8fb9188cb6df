use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::client::ClientCore;
use crate::config::{ProviderKind, Settings};
use crate::conversation::Conversation;
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::provider::openai::request::{SamplingDefaults, build_chat_body};
use crate::provider::{LLMProvider, MENTOR_SYSTEM_PROMPT};
use crate::types::{CapabilityDescriptor, ChatOptions, ChatOutput, OptionSchema};

use super::error::extract_perplexity_error;
use super::response::map_sonar_response;

pub const DEFAULT_CHAT_MODEL: &str = "sonar";

const CHAT_SCHEMA: OptionSchema = OptionSchema {
    provider: "perplexity",
    max_temperature: 2.0,
    temperature_max_inclusive: false,
    reserved: &["model", "messages", "stream"],
};

/// Perplexity Sonar 客户端
///
/// Answers carry the source URLs in [`ChatResult::citations`](crate::types::ChatResult).
pub struct PerplexityClient {
    core: ClientCore,
    default_model: String,
}

impl PerplexityClient {
    pub fn new(settings: Settings) -> Result<Self, LLMError> {
        Self::with_transport(settings, default_dyn_transport()?)
    }

    pub fn with_transport(settings: Settings, transport: DynHttpTransport) -> Result<Self, LLMError> {
        let core = ClientCore::new(
            ProviderKind::Perplexity,
            settings,
            transport,
            Some(MENTOR_SYSTEM_PROMPT.to_string()),
        )?;
        Ok(Self {
            core,
            default_model: DEFAULT_CHAT_MODEL.to_string(),
        })
    }

    /// 从 `PPLX_*` 环境变量构建
    pub fn from_env() -> Result<Self, LLMError> {
        Self::new(Settings::from_env(ProviderKind::Perplexity)?)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.core.set_system_prompt(Some(prompt.into()));
        self
    }

    pub fn without_system_prompt(mut self) -> Self {
        self.core.set_system_prompt(None);
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn settings(&self) -> &Settings {
        self.core.settings()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.core.system_prompt()
    }

    fn build_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.core.settings().api_key()),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ])
    }
}

#[async_trait]
impl LLMProvider for PerplexityClient {
    async fn chat_completion(
        &mut self,
        query: &str,
        options: ChatOptions,
    ) -> Result<ChatOutput, LLMError> {
        self.core.begin_turn(query, &options, &CHAT_SCHEMA)?;

        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let body = build_chat_body(
            model,
            self.core.system_prompt(),
            self.core.conversation().history(),
            &options,
            SamplingDefaults::default(),
            "max_tokens",
        );
        let response = self
            .core
            .post_json(
                "chat/completions",
                self.build_headers(),
                &body,
                extract_perplexity_error,
            )
            .await?;
        let result = map_sonar_response(&response, self.name())?;

        self.core.record_answer(&result.answer);
        debug!(
            provider = self.name(),
            attempts = response.attempts,
            citations = result.citations.len(),
            "chat completion finished"
        );
        if options.return_only_answer {
            Ok(ChatOutput::Answer(result.answer))
        } else {
            Ok(ChatOutput::Full(result))
        }
    }

    fn close(&mut self) {
        self.core.close();
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    fn conversation(&self) -> &Conversation {
        self.core.conversation()
    }

    fn reset_conversation(&mut self) {
        self.core.reset_conversation();
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_embeddings: false,
            supports_stop_sequences: true,
            separate_system_prompt: false,
            returns_citations: true,
        }
    }

    fn name(&self) -> &'static str {
        self.core.name()
    }
}
