//! Think -> Plan -> Act -> Review task pipeline
//!
//! One [`Orchestrator`] instance processes tasks end to end. Think and Plan
//! ask the LLM router for structured analyses and degrade to deterministic
//! fallbacks when the response is unparseable; Act materializes generated
//! sources in a scratch workspace and deploys them through the hosting
//! collaborator; Review scores the live deployment with the evaluation
//! engine. Only deployment-path failures fail the task; everything in
//! Review degrades to a reduced score instead.

mod artifact;
mod phases;
mod workspace;

pub use phases::PhaseId;
pub use workspace::Workspace;

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::collab::{
    ArtifactGenerator, CompletionCallback, DeployRequest, DeploymentLookup, GenerationSpec, Host,
    post_callback,
};
use crate::error::PipelineError;
use crate::eval::PageEvaluator;
use crate::llm::{GenerationRequest, LlmRouter};
use crate::retry::RetryPolicy;
use crate::types::{Analysis, Deployment, FileMap, Plan, Report, Task, TaskStatus};

use artifact::{
    ReadmeContext, explanation_prompt, fallback_explanation, mit_license, render_readme,
};
use phases::{
    PLAN_MAX_TOKENS, PLAN_SYSTEM_MESSAGE, PLAN_TEMPERATURE, THINK_MAX_TOKENS,
    THINK_SYSTEM_MESSAGE, THINK_TEMPERATURE, parse_analysis, parse_plan, plan_prompt,
    think_prompt,
};

const EXPLANATION_MAX_TOKENS: u32 = 600;
const EXPLANATION_TEMPERATURE: f32 = 0.5;

const EXPLANATION_SYSTEM_MESSAGE: &str =
    "You are a technical writer documenting a finished web application. Write clear, \
     concise prose.";

const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Orchestrator {
    router: LlmRouter,
    generator: Arc<dyn ArtifactGenerator>,
    host: Arc<dyn Host>,
    lookup: Arc<dyn DeploymentLookup>,
    evaluator: Arc<dyn PageEvaluator>,
    http: reqwest::Client,
    callback_policy: RetryPolicy,
    navigation_timeout: Duration,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        router: LlmRouter,
        generator: Arc<dyn ArtifactGenerator>,
        host: Arc<dyn Host>,
        lookup: Arc<dyn DeploymentLookup>,
        evaluator: Arc<dyn PageEvaluator>,
    ) -> Self {
        Self {
            router,
            generator,
            host,
            lookup,
            evaluator,
            http: reqwest::Client::new(),
            callback_policy: RetryPolicy::default(),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Process one task through all four phases.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` when the task is invalid, every LLM provider
    /// fails during Think or Plan, or the deployment path fails. Review
    /// failures never surface here.
    pub async fn process_task(&self, task: &Task) -> Result<Report, PipelineError> {
        validate(task)?;
        info!(task_id = %task.task_id, round = task.round, "starting task processing");

        info!(task_id = %task.task_id, phase = PhaseId::Think.as_str(), "analyzing requirements");
        let analysis = self.think(task).await?;

        info!(task_id = %task.task_id, phase = PhaseId::Plan.as_str(), "creating development plan");
        let plan = self.plan(task, &analysis).await?;

        info!(task_id = %task.task_id, phase = PhaseId::Act.as_str(), "executing development");
        let deployment = if task.round >= 2 {
            match self.lookup.prior_deployment(&task.task_id).await? {
                Some(prior) => self.act_update(task, &plan, &prior).await?,
                None => {
                    // A revision round without a prior record is processed
                    // as a fresh task rather than rejected.
                    warn!(
                        task_id = %task.task_id,
                        round = task.round,
                        "no prior deployment found, processing as fresh task"
                    );
                    self.act(task, &plan).await?
                }
            }
        } else {
            self.act(task, &plan).await?
        };

        info!(task_id = %task.task_id, phase = PhaseId::Review.as_str(), "running quality checks");
        let report = self.review(task, deployment).await;

        info!(task_id = %task.task_id, score = report.score, "task completed");
        Ok(report)
    }

    async fn think(&self, task: &Task) -> Result<Analysis, PipelineError> {
        let req = GenerationRequest::new(think_prompt(task), THINK_SYSTEM_MESSAGE)
            .with_max_tokens(THINK_MAX_TOKENS)
            .with_temperature(THINK_TEMPERATURE);
        let text = self.router.generate_response(&req).await?;
        Ok(parse_analysis(&text, task))
    }

    async fn plan(&self, task: &Task, analysis: &Analysis) -> Result<Plan, PipelineError> {
        let req = GenerationRequest::new(plan_prompt(task, analysis), PLAN_SYSTEM_MESSAGE)
            .with_max_tokens(PLAN_MAX_TOKENS)
            .with_temperature(PLAN_TEMPERATURE);
        let text = self.router.generate_response(&req).await?;
        Ok(parse_plan(&text))
    }

    /// Fresh deployment: generate, add repository artifacts, deploy, then
    /// rewrite the README with the real URLs.
    async fn act(&self, task: &Task, plan: &Plan) -> Result<Deployment, PipelineError> {
        let workspace = Workspace::create(&task.task_id)?;
        let result = self.act_in(task, plan, &workspace).await;
        if let Err(e) = workspace.cleanup() {
            warn!(task_id = %task.task_id, error = %e, "workspace cleanup failed");
        }
        result
    }

    async fn act_in(
        &self,
        task: &Task,
        plan: &Plan,
        workspace: &Workspace,
    ) -> Result<Deployment, PipelineError> {
        info!(
            task_id = %task.task_id,
            steps = plan.steps.len(),
            "generating application sources"
        );

        let spec = GenerationSpec::from_task(task, workspace.path());
        let mut files = self.generator.generate(&spec).await?;
        files.insert("LICENSE".to_string(), mit_license());

        let explanation = self.explain(task, &files).await;
        files.insert(
            "README.md".to_string(),
            render_readme(&ReadmeContext {
                task_id: &task.task_id,
                brief: &task.brief,
                checks: &task.checks,
                repo_url: "",
                pages_url: "",
                files: &files,
                explanation: &explanation,
            }),
        );
        workspace.materialize(&files)?;

        let deployment = self
            .host
            .deploy(&DeployRequest {
                task_id: task.task_id.clone(),
                files: files.clone(),
                description: truncate(&task.brief, 100),
            })
            .await?;

        // Second README render now that the URLs exist.
        let readme = render_readme(&ReadmeContext {
            task_id: &task.task_id,
            brief: &task.brief,
            checks: &task.checks,
            repo_url: &deployment.repo_url,
            pages_url: &deployment.pages_url,
            files: &files,
            explanation: &explanation,
        });
        let updated = self
            .host
            .update(&DeployRequest {
                task_id: task.task_id.clone(),
                files: FileMap::from([("README.md".to_string(), readme)]),
                description: "Update README with deployment URLs".to_string(),
            })
            .await?;

        let deployment = Deployment {
            commit_sha: updated.commit_sha,
            ..deployment
        };
        self.send_callback(task, &deployment).await;
        Ok(deployment)
    }

    /// Revision round: revise the deployment's true current files in place.
    async fn act_update(
        &self,
        task: &Task,
        plan: &Plan,
        prior: &Deployment,
    ) -> Result<Deployment, PipelineError> {
        let workspace = Workspace::create(&task.task_id)?;
        let result = self.act_update_in(task, plan, prior, &workspace).await;
        if let Err(e) = workspace.cleanup() {
            warn!(task_id = %task.task_id, error = %e, "workspace cleanup failed");
        }
        result
    }

    async fn act_update_in(
        &self,
        task: &Task,
        plan: &Plan,
        prior: &Deployment,
        workspace: &Workspace,
    ) -> Result<Deployment, PipelineError> {
        info!(
            task_id = %task.task_id,
            round = task.round,
            steps = plan.steps.len(),
            repo_url = %prior.repo_url,
            "revising existing deployment"
        );

        let existing = self.host.fetch_files(&task.task_id).await?;
        let spec = GenerationSpec::from_task(task, workspace.path());
        let mut files = self.generator.update(&spec, &existing).await?;

        let explanation = self.explain(task, &files).await;
        files.insert(
            "README.md".to_string(),
            render_readme(&ReadmeContext {
                task_id: &task.task_id,
                brief: &task.brief,
                checks: &task.checks,
                repo_url: &prior.repo_url,
                pages_url: &prior.pages_url,
                files: &files,
                explanation: &explanation,
            }),
        );
        workspace.materialize(&files)?;

        let deployment = self
            .host
            .update(&DeployRequest {
                task_id: task.task_id.clone(),
                files,
                description: format!("Round {} update: {}", task.round, truncate(&task.brief, 50)),
            })
            .await?;

        self.send_callback(task, &deployment).await;
        Ok(deployment)
    }

    /// LLM-written implementation notes; decorative content, so any failure
    /// degrades to a canned explanation instead of failing the task.
    async fn explain(&self, task: &Task, files: &FileMap) -> String {
        let req = GenerationRequest::new(
            explanation_prompt(&task.brief, files),
            EXPLANATION_SYSTEM_MESSAGE,
        )
        .with_max_tokens(EXPLANATION_MAX_TOKENS)
        .with_temperature(EXPLANATION_TEMPERATURE);

        match self.router.generate_response(&req).await {
            Ok(text) => text,
            Err(e) => {
                warn!(task_id = %task.task_id, error = %e, "explanation generation failed");
                fallback_explanation(&task.brief)
            }
        }
    }

    /// Deliver the completion callback. Failure is logged, never fatal:
    /// the deployment already succeeded.
    async fn send_callback(&self, task: &Task, deployment: &Deployment) {
        let Some(url) = task.evaluation_url.as_deref() else {
            warn!(task_id = %task.task_id, "no evaluation URL provided, skipping callback");
            return;
        };

        let payload = CompletionCallback::new(task, deployment);
        if let Err(e) = post_callback(&self.http, url, &payload, &self.callback_policy).await {
            warn!(
                task_id = %task.task_id,
                url,
                error = %e,
                "completion callback failed after retries"
            );
        }
    }

    /// Score the live deployment. An evaluation-infrastructure failure
    /// degrades to a neutral score with every check marked failed.
    async fn review(&self, task: &Task, deployment: Deployment) -> Report {
        let evaluation = self
            .evaluator
            .evaluate(&deployment.pages_url, &task.checks, self.navigation_timeout)
            .await;

        match evaluation {
            Ok(eval) => Report {
                task_id: task.task_id.clone(),
                status: TaskStatus::Completed,
                score: eval.score,
                checks_passed: eval.checks_passed.clone(),
                checks_failed: eval
                    .checks_failed
                    .iter()
                    .map(|f| f.check.clone())
                    .collect(),
                recommendations: vec![
                    "Application deployed successfully".to_string(),
                    format!(
                        "Passed {}/{} checks",
                        eval.checks_passed.len(),
                        eval.total_checks
                    ),
                ],
                deployment: Some(deployment),
                completed_at: chrono::Utc::now(),
            },
            Err(e) => {
                warn!(task_id = %task.task_id, error = %e, "quality checks failed");
                Report {
                    task_id: task.task_id.clone(),
                    status: TaskStatus::Completed,
                    score: 0.5,
                    checks_passed: Vec::new(),
                    checks_failed: task.checks.clone(),
                    recommendations: vec![format!("Evaluation error: {e}")],
                    deployment: Some(deployment),
                    completed_at: chrono::Utc::now(),
                }
            }
        }
    }
}

fn validate(task: &Task) -> Result<(), PipelineError> {
    if task.task_id.trim().is_empty() {
        return Err(PipelineError::InvalidTask("task_id is empty".to_string()));
    }
    if task.round == 0 {
        return Err(PipelineError::InvalidTask(
            "round must be at least 1".to_string(),
        ));
    }
    if task.brief.trim().is_empty() {
        return Err(PipelineError::InvalidTask("brief is empty".to_string()));
    }
    Ok(())
}

/// Char-boundary-safe prefix for commit descriptions.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
