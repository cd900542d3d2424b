use async_trait::async_trait;

use crate::error::{Result, TutorError};

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOptions {
    pub model: String,
    /// In `[0, 1]`; validated when the configuration is resolved.
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
}

impl ModelResponse {
    /// Wrap `text`, rejecting blank output so callers never receive an
    /// empty reply as if it were an answer.
    pub fn from_text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TutorError::EmptyResponse);
        }
        Ok(Self { text })
    }
}

/// A remote chat-completion endpoint. One call is one outbound request:
/// no retries, no caching.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<ModelResponse>;
}
