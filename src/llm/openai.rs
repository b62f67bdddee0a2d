//! OpenAI chat-completions backend
//!
//! Also hosts the shared wire types for the OpenAI-compatible chat shape,
//! which the Groq backend reuses against its own endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;
use crate::llm::http_client::HttpClient;
use crate::llm::types::{GenerationRequest, Provider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub(crate) struct OpenAiProvider {
    client: HttpClient,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
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
impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
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

/// Issue one OpenAI-compatible chat-completions request and unwrap the first
/// choice into plain text. Shared by the OpenAI and Groq backends.
pub(crate) async fn chat_generate(
    client: &HttpClient,
    base_url: &str,
    api_key: &str,
    model: &str,
    provider_name: &'static str,
    req: &GenerationRequest,
) -> Result<String, LlmError> {
    debug!(
        provider = provider_name,
        model,
        max_tokens = req.max_tokens,
        temperature = req.temperature,
        "invoking chat backend"
    );

    let body = ChatRequest {
        model: model.to_string(),
        messages: build_messages(req),
        max_tokens: req.max_tokens,
        temperature: req.temperature,
    };

    let request = client
        .post(base_url)
        .bearer_auth(api_key)
        .header("content-type", "application/json")
        .json(&body);

    let response = client.execute(request, provider_name).await?;

    let parsed: ChatResponse = response.json().await.map_err(|e| {
        LlmError::Transport(format!("Failed to parse {provider_name} response: {e}"))
    })?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();

    let content = content.trim();
    if content.is_empty() {
        return Err(LlmError::Transport(format!(
            "{provider_name} response missing message content"
        )));
    }

    Ok(content.to_string())
}

pub(crate) fn build_messages(req: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !req.system_message.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: req.system_message.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: req.prompt.clone(),
    });
    messages
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_precedes_user_prompt() {
        let req = GenerationRequest::new("hello", "be terse");
        let messages = build_messages(&req);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "be terse");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn empty_system_message_is_omitted() {
        let req = GenerationRequest::new("hello", "");
        let messages = build_messages(&req);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn parses_chat_response_shape() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content, "hi there");
    }
}
