//! Core types for the provider abstraction

use async_trait::async_trait;

use crate::error::LlmError;

/// Uniform generation parameters. Each backend maps these onto its own
/// request shape and unwraps its own response format into plain text.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_message: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    /// Create a request with the default sampling parameters.
    #[must_use]
    pub fn new(prompt: impl Into<String>, system_message: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_message: system_message.into(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A configured text-generation backend.
///
/// Implementations fail fast at generation time with a descriptive error
/// when their endpoint or credential is unusable; construction never probes
/// the network.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name used in rotation logs and error messages.
    fn name(&self) -> &'static str;

    /// Generate a plain-text completion for the request.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` for transport failures, auth/quota rejections,
    /// provider outages, and timeouts.
    async fn generate(&self, req: &GenerationRequest) -> Result<String, LlmError>;
}
