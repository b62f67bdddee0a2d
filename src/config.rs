//! Configuration model and discovery
//!
//! Configuration is a TOML file with per-provider sections. API keys are
//! never stored in the file; each section names the environment variable
//! holding the credential (`api_key_env`) and the router only enrolls a
//! provider whose variable is actually set.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub eval: EvalConfig,
    #[serde(default)]
    pub collab: CollabConfig,
}

/// LLM provider configuration, one optional section per backend.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    pub openai: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
    pub groq: Option<ProviderConfig>,
    pub huggingface: Option<ProviderConfig>,
}

/// Per-provider settings. Every field is optional; backends supply their
/// own defaults for anything unset. Sampling parameters are not configured
/// here: each pipeline phase sets its own budget per request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// Evaluation engine settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EvalConfig {
    /// Page navigation timeout in seconds (default 30)
    pub navigation_timeout_secs: Option<u64>,
    /// Extra settle delay after load for client-side rendering (default 2000)
    pub settle_delay_ms: Option<u64>,
}

/// External collaborator endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CollabConfig {
    /// Base URL of the code-generation collaborator
    pub generator_url: Option<String>,
    /// Base URL of the hosting collaborator
    pub host_url: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file. A missing path yields defaults,
    /// so a bare environment (API keys only) is a valid configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
impl Config {
    /// Minimal Config for unit tests that don't need full discovery.
    pub fn minimal_for_testing() -> Self {
        Self::default()
    }
}
