use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters sent along with a chat request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationOptions {
    /// 0.0 is deterministic; higher values vary the phrasing.
    pub temperature: f32,
    /// Upper bound on generated tokens. `None` leaves it to the provider.
    pub max_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the model and return the generated text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached or the response is invalid.
    fn chat(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn name(&self) -> &str;
}
