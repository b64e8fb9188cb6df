//! OpenAI Chat Completions and Embeddings.

mod client;
pub(crate) mod error;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod types;

pub use client::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, OpenAiClient};
