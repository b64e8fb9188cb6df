use async_trait::async_trait;

use crate::conversation::Conversation;
use crate::error::LLMError;
use crate::types::{
    CapabilityDescriptor, ChatOptions, ChatOutput, EmbeddingOptions, EmbeddingsOutput,
};

pub mod anthropic;
pub mod openai;
pub mod perplexity;

/// 默认 system prompt 各 Provider 共用
pub const MENTOR_SYSTEM_PROMPT: &str = "You are an expert, wise, and playful AI mentor. \
You explain technical and scientific ideas clearly, with curiosity and intelligence. \
You never produce hallucinations; if unsure, you say you don't know. \
You encourage critical thinking, prompt questions, and rigor.";

/// 统一的 Provider Trait 所有供应商实现该接口即可接入
///
/// `chat_completion` takes `&mut self` because every call appends to the client's
/// conversation; concurrent calls on one instance are therefore serialized by the
/// borrow checker. Use separate instances for parallel conversations.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// 提交一轮对话 并把问答写入会话历史
    async fn chat_completion(
        &mut self,
        query: &str,
        options: ChatOptions,
    ) -> Result<ChatOutput, LLMError>;

    /// 计算文本向量 默认不支持
    async fn embeddings(
        &self,
        _input: &str,
        _options: EmbeddingOptions,
    ) -> Result<EmbeddingsOutput, LLMError> {
        Err(LLMError::NotSupported {
            provider: self.name(),
            feature: "embeddings",
        })
    }

    /// 释放底层连接 可重复调用
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    /// 当前会话历史
    fn conversation(&self) -> &Conversation;

    fn reset_conversation(&mut self);

    /// 描述支持的能力范围
    fn capabilities(&self) -> CapabilityDescriptor;

    /// 供应商名称
    fn name(&self) -> &'static str;
}

/// 动态分发的 Provider
pub type DynProvider = Box<dyn LLMProvider>;
