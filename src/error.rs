//! Error taxonomy for the task pipeline
//!
//! Errors are grouped by subsystem. Recoverable categories (single-provider
//! failures, unparseable structured responses, individual check failures) are
//! handled locally and never reach these types; what surfaces here is either
//! an aggregate failure or a fatal one.

use std::time::Duration;
use thiserror::Error;

/// Errors from the LLM access layer and its provider backends.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (connectivity, malformed response body)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Request timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Invalid provider configuration (bad client setup, missing model)
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// No providers configured at all; every generation call fails this way
    #[error("No LLM providers configured")]
    NoProviders,

    /// Every configured provider was tried exactly once and failed
    #[error("All {attempted} LLM providers failed. Last error: {last}")]
    AllProvidersFailed { attempted: usize, last: String },
}

/// Errors from the headless-browser evaluation engine.
///
/// Navigation failures and per-check failures are not errors: they are
/// encoded inside the evaluation result. This type covers failures that
/// prevent an evaluation from producing any result at all.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Browser launch failed: {0}")]
    Launch(String),
}

/// Errors from external collaborators (generation, hosting, lookup).
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("Artifact generation failed: {0}")]
    Generation(String),

    #[error("Deployment failed: {0}")]
    Deployment(String),

    #[error("Failed to fetch deployed files: {0}")]
    Fetch(String),

    #[error("Deployment lookup failed: {0}")]
    Lookup(String),
}

/// Top-level pipeline error. A task whose processing returns this is "failed";
/// everything else degrades internally to a completed task with a reduced score.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Collaborator error: {0}")]
    Collab(#[from] CollabError),

    #[error("Workspace error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid task: {0}")]
    InvalidTask(String),
}
