//! Perplexity Sonar（OpenAI 兼容的 chat/completions，附带引用来源）

mod client;
pub(crate) mod error;
pub(crate) mod response;
pub(crate) mod types;

pub use client::{DEFAULT_CHAT_MODEL, PerplexityClient};
