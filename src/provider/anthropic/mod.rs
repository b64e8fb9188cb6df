//! Anthropic Messages API（Claude）

mod client;
pub(crate) mod error;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod types;

pub use client::{AnthropicClient, DEFAULT_API_VERSION, DEFAULT_CHAT_MODEL, DEFAULT_MAX_TOKENS};
