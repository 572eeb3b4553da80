//! Model provider abstraction for the vision/text stages.
//!
//! All three stage clients use the same narrow interface: send a prompt (and
//! optionally the photo), get raw text back. JSON repair and schema
//! validation happen in the stage layer, not here.

mod fake;
mod openai;

pub use fake::FakeModelProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Error type for model-provider operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// An image forwarded to a vision-capable model.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// One completion call. Stages always request strict-JSON output.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub image: Option<ImageAttachment>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_text: user_text.into(),
            image: None,
            temperature: 0.2,
            top_p: 0.9,
            max_tokens: 800,
        }
    }

    pub fn with_image(mut self, bytes: Vec<u8>, mime_type: &str) -> Self {
        self.image = Some(ImageAttachment {
            bytes,
            mime_type: mime_type.to_string(),
        });
        self
    }

    pub fn with_sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Trait for model providers.
///
/// Implementations should be stateless and thread-safe.
#[async_trait]
pub trait ModelProvider: Send + Sync + fmt::Debug {
    /// Send a completion request and return the model's raw text response.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;

    /// Get the provider name (e.g., "openai", "fake").
    fn provider_name(&self) -> &'static str;
}
