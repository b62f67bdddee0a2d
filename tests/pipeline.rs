//! End-to-end pipeline tests with in-memory collaborators
//!
//! Every external seam (LLM provider, generator, host, lookup, evaluator)
//! is replaced by a recording fake so the four phases can be exercised
//! deterministically, including the degradation paths.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sitewright::collab::{
    ArtifactGenerator, DeployRequest, DeploymentLookup, GenerationSpec, Host,
};
use sitewright::error::{CollabError, EvalError, LlmError, PipelineError};
use sitewright::eval::PageEvaluator;
use sitewright::llm::{GenerationRequest, LlmRouter, Provider};
use sitewright::pipeline::Orchestrator;
use sitewright::types::{
    Deployment, EvaluationResult, FailedCheck, FileMap, Task, TaskStatus,
};

/// Provider answering from a fixed queue of responses, failing once empty.
struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| (*s).to_string()).collect()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, _req: &GenerationRequest) -> Result<String, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::ProviderOutage("script exhausted".to_string()))
    }
}

#[derive(Default)]
struct RecordingGenerator {
    generate_calls: AtomicUsize,
    update_calls: AtomicUsize,
    specs: Mutex<Vec<GenerationSpec>>,
    existing_seen: Mutex<Vec<FileMap>>,
    fail: bool,
}

impl RecordingGenerator {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn artifact_files() -> FileMap {
        FileMap::from([
            ("index.html".to_string(), "<html><body></body></html>".to_string()),
            ("style.css".to_string(), "body { margin: 0; }".to_string()),
        ])
    }
}

#[async_trait]
impl ArtifactGenerator for RecordingGenerator {
    async fn generate(&self, spec: &GenerationSpec) -> Result<FileMap, CollabError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.specs.lock().unwrap().push(spec.clone());
        if self.fail {
            return Err(CollabError::Generation("generator offline".to_string()));
        }
        Ok(Self::artifact_files())
    }

    async fn update(
        &self,
        spec: &GenerationSpec,
        existing: &FileMap,
    ) -> Result<FileMap, CollabError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.specs.lock().unwrap().push(spec.clone());
        self.existing_seen.lock().unwrap().push(existing.clone());
        Ok(Self::artifact_files())
    }
}

#[derive(Default)]
struct RecordingHost {
    deploys: Mutex<Vec<DeployRequest>>,
    updates: Mutex<Vec<DeployRequest>>,
    deployed_files: Mutex<FileMap>,
}

impl RecordingHost {
    fn with_deployed_files(files: FileMap) -> Self {
        Self {
            deployed_files: Mutex::new(files),
            ..Self::default()
        }
    }

    fn deployment() -> Deployment {
        Deployment {
            repo_url: "https://git.example.com/t-1".to_string(),
            commit_sha: "c-deploy".to_string(),
            pages_url: "https://pages.example.com/t-1/".to_string(),
        }
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn deploy(&self, request: &DeployRequest) -> Result<Deployment, CollabError> {
        self.deploys.lock().unwrap().push(request.clone());
        Ok(Self::deployment())
    }

    async fn update(&self, request: &DeployRequest) -> Result<Deployment, CollabError> {
        self.updates.lock().unwrap().push(request.clone());
        Ok(Deployment {
            commit_sha: "c-update".to_string(),
            ..Self::deployment()
        })
    }

    async fn fetch_files(&self, _task_id: &str) -> Result<FileMap, CollabError> {
        Ok(self.deployed_files.lock().unwrap().clone())
    }
}

struct StaticLookup {
    prior: Option<Deployment>,
}

#[async_trait]
impl DeploymentLookup for StaticLookup {
    async fn prior_deployment(&self, _task_id: &str) -> Result<Option<Deployment>, CollabError> {
        Ok(self.prior.clone())
    }
}

/// Evaluator that records the URL it was handed and replays a fixed result.
struct FakeEvaluator {
    urls: Mutex<Vec<String>>,
    fail_launch: bool,
    pass_all: bool,
}

impl FakeEvaluator {
    fn passing() -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            fail_launch: false,
            pass_all: true,
        }
    }

    fn failing_checks() -> Self {
        Self {
            pass_all: false,
            ..Self::passing()
        }
    }

    fn broken() -> Self {
        Self {
            fail_launch: true,
            ..Self::passing()
        }
    }
}

#[async_trait]
impl PageEvaluator for FakeEvaluator {
    async fn evaluate(
        &self,
        url: &str,
        checks: &[String],
        _timeout: Duration,
    ) -> Result<EvaluationResult, EvalError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail_launch {
            return Err(EvalError::Launch("no chrome executable".to_string()));
        }

        let mut result = EvaluationResult::new(url, checks.len());
        if self.pass_all {
            result.checks_passed = checks.to_vec();
        } else {
            result.checks_failed = checks
                .iter()
                .map(|check| FailedCheck {
                    check: check.clone(),
                    reason: "not satisfied".to_string(),
                })
                .collect();
        }
        result.finalize_score();
        Ok(result)
    }
}

const ANALYSIS_JSON: &str =
    r#"{"technologies":["HTML","CSS"],"complexity":"low","key_components":["ui"]}"#;
const PLAN_JSON: &str =
    r#"{"steps":[{"step":1,"description":"build the page"}],"testing_strategy":"manual"}"#;
const EXPLANATION: &str = "A single static page with styles.";

fn scripted_router() -> LlmRouter {
    LlmRouter::new(vec![Box::new(ScriptedProvider::new(&[
        ANALYSIS_JSON,
        PLAN_JSON,
        EXPLANATION,
    ]))])
}

fn task(round: u32) -> Task {
    serde_json::from_str(&format!(
        r#"{{
            "task_id": "t-1",
            "round": {round},
            "nonce": "n-1",
            "brief": "a weather dashboard",
            "checks": ["page title mentions Weather", "has a #forecast element"],
            "email": "agent@example.com"
        }}"#
    ))
    .unwrap()
}

struct Harness {
    generator: Arc<RecordingGenerator>,
    host: Arc<RecordingHost>,
    evaluator: Arc<FakeEvaluator>,
    orchestrator: Orchestrator,
}

fn harness(
    router: LlmRouter,
    generator: RecordingGenerator,
    host: RecordingHost,
    prior: Option<Deployment>,
    evaluator: FakeEvaluator,
) -> Harness {
    let generator = Arc::new(generator);
    let host = Arc::new(host);
    let evaluator = Arc::new(evaluator);
    let orchestrator = Orchestrator::new(
        router,
        generator.clone(),
        host.clone(),
        Arc::new(StaticLookup { prior }),
        evaluator.clone(),
    );
    Harness {
        generator,
        host,
        evaluator,
        orchestrator,
    }
}

#[tokio::test]
async fn round_one_deploys_and_scores_full_marks() {
    let h = harness(
        scripted_router(),
        RecordingGenerator::default(),
        RecordingHost::default(),
        None,
        FakeEvaluator::passing(),
    );

    let report = h.orchestrator.process_task(&task(1)).await.unwrap();

    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(report.score, 1.0);
    assert_eq!(report.checks_passed.len(), 2);
    let deployment = report.deployment.unwrap();
    assert_eq!(deployment.pages_url, "https://pages.example.com/t-1/");
    // README rewrite after deploy produced the final commit.
    assert_eq!(deployment.commit_sha, "c-update");

    assert_eq!(h.generator.generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.update_calls.load(Ordering::SeqCst), 0);

    let deploys = h.host.deploys.lock().unwrap();
    assert_eq!(deploys.len(), 1);
    let files = &deploys[0].files;
    assert!(files.contains_key("index.html"));
    assert!(files["LICENSE"].starts_with("MIT License"));
    // First README render has no URLs yet.
    assert!(files["README.md"].contains("(pending deployment)"));

    let updates = h.host.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    let readme = &updates[0].files["README.md"];
    assert!(readme.contains("https://pages.example.com/t-1/"));
    assert!(!readme.contains("(pending deployment)"));

    // Review evaluated the deployed URL.
    assert_eq!(
        h.evaluator.urls.lock().unwrap().as_slice(),
        ["https://pages.example.com/t-1/"]
    );
}

#[tokio::test]
async fn unparseable_llm_responses_degrade_to_fallback_phases() {
    let router = LlmRouter::new(vec![Box::new(ScriptedProvider::new(&[
        "I will not produce JSON.",
        "Nor a plan.",
        "Some explanation prose.",
    ]))]);
    let h = harness(
        router,
        RecordingGenerator::default(),
        RecordingHost::default(),
        None,
        FakeEvaluator::passing(),
    );

    let report = h.orchestrator.process_task(&task(1)).await.unwrap();
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(h.host.deploys.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn llm_total_failure_fails_the_task() {
    // Empty script: every generation call fails on the only provider.
    let router = LlmRouter::new(vec![Box::new(ScriptedProvider::new(&[]))]);
    let h = harness(
        router,
        RecordingGenerator::default(),
        RecordingHost::default(),
        None,
        FakeEvaluator::passing(),
    );

    match h.orchestrator.process_task(&task(1)).await {
        Err(PipelineError::Llm(LlmError::AllProvidersFailed { .. })) => {}
        other => panic!("expected AllProvidersFailed, got {other:?}"),
    }
    assert!(h.host.deploys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn revision_round_updates_in_place_with_true_prior_files() {
    let existing = FileMap::from([(
        "index.html".to_string(),
        "<html>previously deployed</html>".to_string(),
    )]);
    let h = harness(
        scripted_router(),
        RecordingGenerator::default(),
        RecordingHost::with_deployed_files(existing.clone()),
        Some(RecordingHost::deployment()),
        FakeEvaluator::passing(),
    );

    let report = h.orchestrator.process_task(&task(2)).await.unwrap();
    assert_eq!(report.status, TaskStatus::Completed);

    // Update path, never a fresh deploy.
    assert_eq!(h.generator.generate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.generator.update_calls.load(Ordering::SeqCst), 1);
    assert!(h.host.deploys.lock().unwrap().is_empty());

    // The generator revised the deployment's actual current contents.
    assert_eq!(h.generator.existing_seen.lock().unwrap().as_slice(), [existing]);

    let updates = h.host.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].description.starts_with("Round 2 update:"));
    assert!(updates[0].files["README.md"].contains("https://pages.example.com/t-1/"));
}

#[tokio::test]
async fn revision_round_without_prior_record_falls_back_to_fresh_deploy() {
    let h = harness(
        scripted_router(),
        RecordingGenerator::default(),
        RecordingHost::default(),
        None,
        FakeEvaluator::passing(),
    );

    let report = h.orchestrator.process_task(&task(2)).await.unwrap();
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(h.generator.generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.update_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.host.deploys.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_checks_reduce_the_score() {
    let h = harness(
        scripted_router(),
        RecordingGenerator::default(),
        RecordingHost::default(),
        None,
        FakeEvaluator::failing_checks(),
    );

    let report = h.orchestrator.process_task(&task(1)).await.unwrap();
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(report.score, 0.0);
    assert_eq!(report.checks_failed.len(), 2);
    assert!(report.recommendations.iter().any(|r| r.contains("Passed 0/2")));
}

#[tokio::test]
async fn evaluation_breakdown_degrades_to_neutral_score() {
    let h = harness(
        scripted_router(),
        RecordingGenerator::default(),
        RecordingHost::default(),
        None,
        FakeEvaluator::broken(),
    );

    let report = h.orchestrator.process_task(&task(1)).await.unwrap();
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(report.score, 0.5);
    assert!(report.checks_passed.is_empty());
    assert_eq!(report.checks_failed, task(1).checks);
    assert_eq!(report.recommendations.len(), 1);
    assert!(report.recommendations[0].contains("Evaluation error"));
}

#[tokio::test]
async fn generator_failure_fails_the_task_and_cleans_the_workspace() {
    let h = harness(
        scripted_router(),
        RecordingGenerator::failing(),
        RecordingHost::default(),
        None,
        FakeEvaluator::passing(),
    );

    // Distinct task id so concurrent tests' workspaces can't interfere
    // with the leftover scan below.
    let mut failing_task = task(1);
    failing_task.task_id = "t-cleanup".to_string();

    match h.orchestrator.process_task(&failing_task).await {
        Err(PipelineError::Collab(CollabError::Generation(_))) => {}
        other => panic!("expected generation failure, got {other:?}"),
    }

    // The scratch workspace is gone despite the mid-Act failure.
    let leftovers: Vec<_> = std::fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("sitewright-t-cleanup-")
        })
        .collect();
    assert!(leftovers.is_empty(), "workspace left behind: {leftovers:?}");
}

#[tokio::test]
async fn invalid_task_is_rejected_before_any_phase() {
    let h = harness(
        scripted_router(),
        RecordingGenerator::default(),
        RecordingHost::default(),
        None,
        FakeEvaluator::passing(),
    );

    let mut invalid = task(1);
    invalid.brief = String::new();

    match h.orchestrator.process_task(&invalid).await {
        Err(PipelineError::InvalidTask(_)) => {}
        other => panic!("expected InvalidTask, got {other:?}"),
    }
    assert_eq!(h.generator.generate_calls.load(Ordering::SeqCst), 0);
}
