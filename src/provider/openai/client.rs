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
use crate::types::{
    CapabilityDescriptor, ChatOptions, ChatOutput, EmbeddingOptions, EmbeddingsOutput,
    OptionSchema,
};

use super::error::extract_openai_error;
use super::request::{SamplingDefaults, build_chat_body, build_embeddings_body};
use super::response::{map_chat_response, map_embeddings_response};

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4.1-nano";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_TEMPERATURE: f64 = 0.85;

const CHAT_SCHEMA: OptionSchema = OptionSchema {
    provider: "openai",
    max_temperature: 2.0,
    temperature_max_inclusive: true,
    reserved: &["model", "messages", "stream"],
};

const EMBEDDINGS_SCHEMA: OptionSchema = OptionSchema {
    provider: "openai",
    max_temperature: 2.0,
    temperature_max_inclusive: true,
    reserved: &["model", "input"],
};

/// OpenAI Chat Completions + Embeddings 客户端
///
/// ```no_run
/// use llm_connectors::{ChatOptions, LLMProvider, OpenAiClient};
///
/// # async fn run() -> Result<(), llm_connectors::LLMError> {
/// let mut client = OpenAiClient::from_env()?;
/// let answer = client.chat_completion("Hello", ChatOptions::answer_only()).await?;
/// println!("{}", answer.text());
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct OpenAiClient {
    core: ClientCore,
    default_model: String,
    embedding_model: String,
    organization: Option<String>,
    project: Option<String>,
}

impl OpenAiClient {
    /// 使用默认 reqwest transport 创建客户端
    pub fn new(settings: Settings) -> Result<Self, LLMError> {
        Self::with_transport(settings, default_dyn_transport()?)
    }

    /// 注入自定义 transport（测试或共享连接池）
    pub fn with_transport(settings: Settings, transport: DynHttpTransport) -> Result<Self, LLMError> {
        let core = ClientCore::new(
            ProviderKind::OpenAi,
            settings,
            transport,
            Some(MENTOR_SYSTEM_PROMPT.to_string()),
        )?;
        Ok(Self {
            core,
            default_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            organization: None,
            project: None,
        })
    }

    /// 从 `OPENAI_*` 环境变量构建 另外读取 `OPENAI_ORGANIZATION` / `OPENAI_PROJECT`
    pub fn from_env() -> Result<Self, LLMError> {
        let mut client = Self::new(Settings::from_env(ProviderKind::OpenAi)?)?;
        client.organization = non_blank_env("OPENAI_ORGANIZATION");
        client.project = non_blank_env("OPENAI_PROJECT");
        Ok(client)
    }

    /// 配置组织 ID
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// 配置项目 ID
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.core.set_system_prompt(Some(prompt.into()));
        self
    }

    /// 不发送 system 消息
    pub fn without_system_prompt(mut self) -> Self {
        self.core.set_system_prompt(None);
        self
    }

    /// 设置默认聊天模型
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// 设置默认向量模型
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
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
            "Authorization".to_string(),
            format!("Bearer {}", self.core.settings().api_key()),
        );
        headers.insert("Accept".to_string(), "application/json".to_string());
        if let Some(org) = &self.organization {
            headers.insert("OpenAI-Organization".to_string(), org.clone());
        }
        if let Some(project) = &self.project {
            headers.insert("OpenAI-Project".to_string(), project.clone());
        }
        headers
    }
}

#[async_trait]
impl LLMProvider for OpenAiClient {
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
            SamplingDefaults {
                temperature: Some(DEFAULT_TEMPERATURE),
                max_tokens: None,
            },
            "max_completion_tokens",
        );
        let response = self
            .core
            .post_json(
                "chat/completions",
                self.build_headers(),
                &body,
                extract_openai_error,
            )
            .await?;
        let result = map_chat_response(&response, self.name())?;

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

    async fn embeddings(
        &self,
        input: &str,
        options: EmbeddingOptions,
    ) -> Result<EmbeddingsOutput, LLMError> {
        self.core.ensure_open()?;
        if input.trim().is_empty() {
            return Err(LLMError::validation("embedding input must not be empty"));
        }
        options.validate(&EMBEDDINGS_SCHEMA)?;

        let model = options.model.as_deref().unwrap_or(&self.embedding_model);
        let body = build_embeddings_body(model, input, &options);
        let response = self
            .core
            .post_json("embeddings", self.build_headers(), &body, extract_openai_error)
            .await?;
        let mut result = map_embeddings_response(&response, self.name())?;

        if options.return_only_embeddings {
            Ok(EmbeddingsOutput::Vector(result.embeddings.swap_remove(0)))
        } else {
            Ok(EmbeddingsOutput::Full(result))
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
            supports_embeddings: true,
            supports_stop_sequences: true,
            separate_system_prompt: false,
            returns_citations: false,
        }
    }

    fn name(&self) -> &'static str {
        self.core.name()
    }
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
