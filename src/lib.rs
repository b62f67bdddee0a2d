//! sitewright: autonomous web-development task pipeline
//!
//! Takes a natural-language task brief with machine-evaluable checks,
//! runs it through a Think -> Plan -> Act -> Review pipeline backed by a
//! rotating multi-provider LLM router, deploys the generated artifact
//! through external collaborators, and scores the live deployment in a
//! headless browser.

pub mod collab;
pub mod config;
pub mod error;
pub mod eval;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod types;

pub use collab::{ArtifactGenerator, DeploymentLookup, Host, HttpGenerator, HttpHost};
pub use config::Config;
pub use error::{CollabError, EvalError, LlmError, PipelineError};
pub use eval::{HeadlessEvaluator, PageEvaluator};
pub use llm::{GenerationRequest, LlmRouter, Provider};
pub use pipeline::Orchestrator;
pub use retry::{RetryPolicy, retry};
pub use types::{Deployment, EvaluationResult, Report, Task, TaskStatus};
