//! Hugging Face Inference API backend (free tier)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;
use crate::llm::http_client::HttpClient;
use crate::llm::types::{GenerationRequest, Provider};

const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";
const DEFAULT_MODEL: &str = "HuggingFaceH4/zephyr-7b-beta";

pub(crate) struct HuggingFaceProvider {
    client: HttpClient,
    base_url: String,
    api_key: String,
    model: String,
}

impl HuggingFaceProvider {
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
impl Provider for HuggingFaceProvider {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn generate(&self, req: &GenerationRequest) -> Result<String, LlmError> {
        debug!(provider = "huggingface", model = %self.model, "invoking Hugging Face backend");

        // The inference API takes one flat prompt, so the system message is
        // prepended rather than sent as a separate role.
        let full_prompt = if req.system_message.is_empty() {
            req.prompt.clone()
        } else {
            format!("{}\n\n{}", req.system_message, req.prompt)
        };

        let body = InferenceRequest {
            inputs: full_prompt,
            parameters: InferenceParameters {
                max_new_tokens: req.max_tokens,
                temperature: req.temperature,
                do_sample: true,
                return_full_text: false,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), self.model);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body);

        let response = self.client.execute(request, self.name()).await?;

        let parsed: Vec<InferenceOutput> = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse Hugging Face response: {e}"))
        })?;

        let text = parsed
            .into_iter()
            .next()
            .map(|out| out.generated_text)
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::Transport(
                "Hugging Face response missing generated text".to_string(),
            ));
        }

        Ok(text.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Clone, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    do_sample: bool,
    return_full_text: bool,
}

#[derive(Debug, Clone, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct InferenceOutput {
    generated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inference_output_list() {
        let parsed: Vec<InferenceOutput> =
            serde_json::from_str(r#"[{"generated_text":"  answer  "}]"#).unwrap();
        assert_eq!(parsed[0].generated_text.trim(), "answer");
    }
}
