//! OpenAI / Anthropic / Perplexity 统一异步客户端
//!
//! Each client keeps its own conversation history, retries transient failures with
//! exponential backoff and normalizes vendor responses into [`ChatResult`] /
//! [`EmbeddingsResult`].

mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod provider;
pub mod retry;
pub mod types;

pub use config::{ProviderKind, Settings, SettingsConfig};
pub use conversation::Conversation;
pub use error::{LLMError, TransportErrorKind};
pub use provider::anthropic::AnthropicClient;
pub use provider::openai::OpenAiClient;
pub use provider::perplexity::PerplexityClient;
pub use provider::{DynProvider, LLMProvider, MENTOR_SYSTEM_PROMPT};
pub use retry::{Jitter, RetryPolicy};
pub use types::*;
