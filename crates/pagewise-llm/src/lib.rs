//! Chat completion and embedding backends.

pub mod embed;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;

pub use embed::{EmbeddingModel, HashEmbedder};
pub use error::LlmError;
pub use provider::{GenerationOptions, LlmProvider, Message, Role};
