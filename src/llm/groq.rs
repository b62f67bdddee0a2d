//! Groq backend (free tier, OpenAI-compatible chat endpoint)

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::http_client::HttpClient;
use crate::llm::openai::chat_generate;
use crate::llm::types::{GenerationRequest, Provider};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.1-70b-versatile";

pub(crate) struct GroqProvider {
    client: HttpClient,
    base_url: String,
    api_key: String,
    model: String,
}

impl GroqProvider {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be built.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn generate(&self, req: &GenerationRequest) -> Result<String, LlmError> {
        chat_generate(
            &self.client,
            &self.base_url,
            &self.api_key,
            &self.model,
            self.name(),
            req,
        )
        .await
    }
}
