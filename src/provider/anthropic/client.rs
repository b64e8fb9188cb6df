use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::client::ClientCore;
use crate::config::{ProviderKind, Settings};
use crate::conversation::Conversation;
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::provider::{LLMProvider, MENTOR_SYSTEM_PROMPT};
use crate::types::{CapabilityDescriptor, ChatOptions, ChatOutput, OptionSchema};

use super::error::extract_anthropic_error;
use super::request::build_messages_body;
use super::response::map_messages_response;

pub const DEFAULT_CHAT_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

const CHAT_SCHEMA: OptionSchema = OptionSchema {
    provider: "anthropic",
    max_temperature: 1.0,
    temperature_max_inclusive: true,
    reserved: &["model", "messages", "system", "stream"],
};

/// Anthropic Messages 客户端（Claude）
///
/// Embeddings are not offered by Anthropic; [`LLMProvider::embeddings`] fails with
/// [`LLMError::NotSupported`] without touching the network.
pub struct AnthropicClient {
    core: ClientCore,
    default_model: String,
    version: String,
    beta: Option<String>,
}

impl AnthropicClient {
    /// 使用默认 reqwest transport 与 anthropic-version 创建客户端
    pub fn new(settings: Settings) -> Result<Self, LLMError> {
        Self::with_transport(settings, default_dyn_transport()?)
    }

    pub fn with_transport(settings: Settings, transport: DynHttpTransport) -> Result<Self, LLMError> {
        let core = ClientCore::new(
            ProviderKind::Anthropic,
            settings,
            transport,
            Some(MENTOR_SYSTEM_PROMPT.to_string()),
        )?;
        Ok(Self {
            core,
            default_model: DEFAULT_CHAT_MODEL.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            beta: None,
        })
    }

    /// 从 `ANTHROPIC_*` 环境变量构建 `ANTHROPIC_API_VERSION` 可覆盖 API 版本
    pub fn from_env() -> Result<Self, LLMError> {
        let mut client = Self::new(Settings::from_env(ProviderKind::Anthropic)?)?;
        if let Some(version) = std::env::var("ANTHROPIC_API_VERSION")
            .ok()
            .filter(|value| !value.trim().is_empty())
        {
            client.version = version;
        }
        Ok(client)
    }

    /// 自定义 Anthropic API 版本（anthropic-version）
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 设置 anthropic-beta 头，支持逗号分隔的 beta 列表
    pub fn with_beta(mut self, beta: impl Into<String>) -> Self {
        self.beta = Some(beta.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.core.set_system_prompt(Some(prompt.into()));
        self
    }

    pub fn without_system_prompt(mut self) -> Self {
        self.core.set_system_prompt(None);
        self
    }

    /// 设置默认模型名称
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
        let mut headers = HashMap::new();
        headers.insert(
            "x-api-key".to_string(),
            self.core.settings().api_key().to_string(),
        );
        headers.insert("anthropic-version".to_string(), self.version.clone());
        headers.insert("Accept".to_string(), "application/json".to_string());
        if let Some(beta) = &self.beta {
            headers.insert("anthropic-beta".to_string(), beta.clone());
        }
        headers
    }
}

#[async_trait]
impl LLMProvider for AnthropicClient {
    async fn chat_completion(
        &mut self,
        query: &str,
        options: ChatOptions,
    ) -> Result<ChatOutput, LLMError> {
        self.core.begin_turn(query, &options, &CHAT_SCHEMA)?;

        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let body = build_messages_body(
            model,
            self.core.system_prompt(),
            self.core.conversation().history(),
            &options,
            DEFAULT_MAX_TOKENS,
        );
        let response = self
            .core
            .post_json("messages", self.build_headers(), &body, extract_anthropic_error)
            .await?;
        let result = map_messages_response(&response, self.name())?;

        self.core.record_answer(&result.answer);
        debug!(
            provider = self.name(),
            attempts = response.attempts,
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
            separate_system_prompt: true,
            returns_citations: false,
        }
    }

    fn name(&self) -> &'static str {
        self.core.name()
    }
}
