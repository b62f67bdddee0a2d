//! Multi-provider LLM access layer with rotation and failover
//!
//! Providers implement the [`Provider`] trait; the [`LlmRouter`] holds them
//! in a fixed preference order and rotates a cursor across calls so load is
//! spread over every configured backend instead of always hitting the first
//! one. A single call tries each provider at most once before giving up.

mod anthropic;
mod groq;
mod http_client;
mod huggingface;
mod openai;
mod types;

pub use types::{GenerationRequest, Provider};

pub(crate) use http_client::redact_error_message;

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::config::{Config, ProviderConfig};
use crate::error::LlmError;

use anthropic::AnthropicProvider;
use groq::GroqProvider;
use huggingface::HuggingFaceProvider;
use openai::OpenAiProvider;

/// Ordered set of configured providers with a rotation cursor.
///
/// The cursor is owned by the router instance. Instances are not meant to be
/// shared across concurrent tasks without external coordination; host one
/// router per concurrent execution context.
pub struct LlmRouter {
    providers: Vec<Box<dyn Provider>>,
    cursor: AtomicUsize,
}

impl LlmRouter {
    /// Build a router from explicit providers, preserving their order.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        Self {
            providers,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Enumerate configured providers in fixed preference order: commercial
    /// backends first (openai, anthropic), free tiers after (groq,
    /// huggingface). A provider is enrolled only when its API key
    /// environment variable is set; an empty rotation is a valid but
    /// degraded state that fails every generation call.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Box<dyn Provider>> = Vec::new();

        let llm = &config.llm;
        enroll(&mut providers, "openai", llm.openai.as_ref(), "OPENAI_API_KEY", |key, c| {
            OpenAiProvider::new(key, c.base_url.clone(), c.model.clone())
                .map(|p| Box::new(p) as Box<dyn Provider>)
        });
        enroll(&mut providers, "anthropic", llm.anthropic.as_ref(), "ANTHROPIC_API_KEY", |key, c| {
            AnthropicProvider::new(key, c.base_url.clone(), c.model.clone())
                .map(|p| Box::new(p) as Box<dyn Provider>)
        });
        enroll(&mut providers, "groq", llm.groq.as_ref(), "GROQ_API_KEY", |key, c| {
            GroqProvider::new(key, c.base_url.clone(), c.model.clone())
                .map(|p| Box::new(p) as Box<dyn Provider>)
        });
        enroll(&mut providers, "huggingface", llm.huggingface.as_ref(), "HUGGINGFACE_API_KEY", |key, c| {
            HuggingFaceProvider::new(key, c.base_url.clone(), c.model.clone())
                .map(|p| Box::new(p) as Box<dyn Provider>)
        });

        if providers.is_empty() {
            warn!("no LLM providers configured; every generation call will fail");
        } else {
            info!(
                count = providers.len(),
                providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
                "LLM providers loaded"
            );
        }

        Self::new(providers)
    }

    /// Number of providers in the rotation.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Rotation position the next attempt will use, modulo provider count.
    #[must_use]
    pub fn cursor_position(&self) -> usize {
        if self.providers.is_empty() {
            0
        } else {
            self.cursor.load(Ordering::Relaxed) % self.providers.len()
        }
    }

    /// Generate a response, rotating across providers on failure.
    ///
    /// Every attempt consumes one rotation step, on success and on failure
    /// alike, so successive calls spread load across all configured
    /// providers regardless of outcome.
    ///
    /// # Errors
    ///
    /// - `LlmError::NoProviders` when the rotation is empty
    /// - `LlmError::AllProvidersFailed` embedding the last failure's message
    ///   after every provider was tried exactly once
    pub async fn generate_response(&self, req: &GenerationRequest) -> Result<String, LlmError> {
        let total = self.providers.len();
        if total == 0 {
            return Err(LlmError::NoProviders);
        }

        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=total {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % total;
            let provider = &self.providers[index];

            debug!(
                provider = provider.name(),
                attempt,
                total,
                "trying provider"
            );

            match provider.generate(req).await {
                Ok(text) => {
                    info!(provider = provider.name(), "generation succeeded");
                    return Ok(text);
                }
                Err(error) => {
                    warn!(
                        provider = provider.name(),
                        error = %redact_error_message(&error.to_string()),
                        "provider failed, rotating"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(LlmError::AllProvidersFailed {
            attempted: total,
            last: last_error
                .map(|e| redact_error_message(&e.to_string()))
                .unwrap_or_default(),
        })
    }
}

/// Construct and enroll one provider when its credential is present.
fn enroll<F>(
    providers: &mut Vec<Box<dyn Provider>>,
    name: &str,
    section: Option<&ProviderConfig>,
    default_env: &str,
    build: F,
) where
    F: FnOnce(String, &ProviderConfig) -> Result<Box<dyn Provider>, LlmError>,
{
    let default_section = ProviderConfig::default();
    let section = section.unwrap_or(&default_section);
    let env_name = section.api_key_env.as_deref().unwrap_or(default_env);

    let Ok(key) = std::env::var(env_name) else {
        debug!(provider = name, env = env_name, "skipping provider, no API key");
        return;
    };
    if key.is_empty() {
        debug!(provider = name, env = env_name, "skipping provider, empty API key");
        return;
    }

    match build(key, section) {
        Ok(provider) => {
            info!(provider = name, "loaded provider");
            providers.push(provider);
        }
        Err(error) => {
            warn!(provider = name, error = %error, "failed to construct provider, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    /// Provider that fails or succeeds according to a fixed script.
    struct ScriptedProvider {
        name: &'static str,
        succeeds: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, succeeds: bool) -> Self {
            Self {
                name,
                succeeds,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn generate(&self, _req: &GenerationRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeeds {
                Ok(format!("response from {}", self.name))
            } else {
                Err(LlmError::ProviderOutage(format!("{} is down", self.name)))
            }
        }
    }

    fn router_of(specs: &[(&'static str, bool)]) -> LlmRouter {
        LlmRouter::new(
            specs
                .iter()
                .map(|(name, ok)| Box::new(ScriptedProvider::new(name, *ok)) as Box<dyn Provider>)
                .collect(),
        )
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("prompt", "system")
    }

    #[tokio::test]
    async fn empty_rotation_fails_immediately() {
        let router = LlmRouter::new(Vec::new());
        match router.generate_response(&request()).await {
            Err(LlmError::NoProviders) => {}
            other => panic!("expected NoProviders, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failover_tries_each_provider_once_and_returns_first_success() {
        let router = router_of(&[("a", false), ("b", false), ("c", true)]);

        let text = router.generate_response(&request()).await.unwrap();
        assert_eq!(text, "response from c");

        // Cursor consumed three rotation steps, landing just past C (mod 3).
        assert_eq!(router.cursor_position(), 0);
    }

    #[tokio::test]
    async fn success_advances_cursor_by_one() {
        let router = router_of(&[("a", true), ("b", true), ("c", true)]);

        let text = router.generate_response(&request()).await.unwrap();
        assert_eq!(text, "response from a");
        assert_eq!(router.cursor_position(), 1);

        // Next call is served by the next provider in rotation.
        let text = router.generate_response(&request()).await.unwrap();
        assert_eq!(text, "response from b");
        assert_eq!(router.cursor_position(), 2);
    }

    #[tokio::test]
    async fn all_providers_failing_yields_aggregate_with_last_error() {
        let a = ScriptedProvider::new("a", false);
        let b = ScriptedProvider::new("b", false);
        let a_calls = Arc::clone(&a.calls);
        let b_calls = Arc::clone(&b.calls);
        let router = LlmRouter::new(vec![Box::new(a), Box::new(b)]);

        match router.generate_response(&request()).await {
            Err(LlmError::AllProvidersFailed { attempted, last }) => {
                assert_eq!(attempted, 2);
                assert!(last.contains("b is down"), "last error was: {last}");
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }

        // No provider is attempted twice within a single call.
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rotation_spreads_consecutive_calls() {
        let router = router_of(&[("a", true), ("b", true)]);

        let first = router.generate_response(&request()).await.unwrap();
        let second = router.generate_response(&request()).await.unwrap();
        let third = router.generate_response(&request()).await.unwrap();

        assert_eq!(first, "response from a");
        assert_eq!(second, "response from b");
        assert_eq!(third, "response from a");
    }
}
