//! External collaborator interfaces
//!
//! The pipeline delegates artifact source generation, hosting, and
//! prior-deployment lookup to external services. Each collaborator is a
//! trait at the seam with an HTTP implementation speaking a JSON wire
//! contract; the pipeline only ever sees the traits, so tests substitute
//! in-memory fakes. Outbound calls go through the backoff retrier since
//! transient failure is expected from all of these services.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CollabError;
use crate::retry::{RetryPolicy, retry};
use crate::types::{Attachment, Deployment, FileMap, Task};

/// What the generator needs to produce artifact sources.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSpec {
    pub task_id: String,
    pub brief: String,
    pub checks: Vec<String>,
    pub attachments: Vec<Attachment>,
    /// Scratch directory the pipeline materializes sources into
    pub workspace_path: String,
}

impl GenerationSpec {
    #[must_use]
    pub fn from_task(task: &Task, workspace_path: &std::path::Path) -> Self {
        Self {
            task_id: task.task_id.clone(),
            brief: task.brief.clone(),
            checks: task.checks.clone(),
            attachments: task.attachments.clone(),
            workspace_path: workspace_path.display().to_string(),
        }
    }
}

/// Deployment request sent to the hosting collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct DeployRequest {
    pub task_id: String,
    pub files: FileMap,
    pub description: String,
}

/// Produces artifact sources for a brief.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    /// Generate a fresh set of files for the spec.
    ///
    /// # Errors
    ///
    /// Returns `CollabError::Generation` when the collaborator cannot
    /// produce files.
    async fn generate(&self, spec: &GenerationSpec) -> Result<FileMap, CollabError>;

    /// Revise an existing set of files against the spec. `existing` holds
    /// the true current contents of the deployment being revised.
    ///
    /// # Errors
    ///
    /// Returns `CollabError::Generation` when the collaborator cannot
    /// produce files.
    async fn update(&self, spec: &GenerationSpec, existing: &FileMap)
    -> Result<FileMap, CollabError>;
}

/// Hosts deployed artifacts and serves their current contents back.
#[async_trait]
pub trait Host: Send + Sync {
    /// Create a deployment for the task's files.
    ///
    /// # Errors
    ///
    /// Returns `CollabError::Deployment` on any hosting failure.
    async fn deploy(&self, request: &DeployRequest) -> Result<Deployment, CollabError>;

    /// Commit new file contents into an existing deployment.
    ///
    /// # Errors
    ///
    /// Returns `CollabError::Deployment` on any hosting failure.
    async fn update(&self, request: &DeployRequest) -> Result<Deployment, CollabError>;

    /// Fetch the current file contents of a task's deployment.
    ///
    /// # Errors
    ///
    /// Returns `CollabError::Fetch` when the deployment's files cannot be
    /// retrieved.
    async fn fetch_files(&self, task_id: &str) -> Result<FileMap, CollabError>;
}

/// Resolves the deployment a previous round produced for a task.
/// Record persistence itself lives with the collaborator.
#[async_trait]
pub trait DeploymentLookup: Send + Sync {
    /// Look up the prior deployment for a task id. `Ok(None)` means no
    /// record exists and the task should be processed as a fresh round.
    ///
    /// # Errors
    ///
    /// Returns `CollabError::Lookup` when the lookup service misbehaves;
    /// a missing record is not an error.
    async fn prior_deployment(&self, task_id: &str) -> Result<Option<Deployment>, CollabError>;
}

/// Payload POSTed to the task's evaluation callback after deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionCallback {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl CompletionCallback {
    #[must_use]
    pub fn new(task: &Task, deployment: &Deployment) -> Self {
        Self {
            email: task.email.clone(),
            task: task.task_id.clone(),
            round: task.round,
            nonce: task.nonce.clone(),
            repo_url: deployment.repo_url.clone(),
            commit_sha: deployment.commit_sha.clone(),
            pages_url: deployment.pages_url.clone(),
        }
    }
}

/// Deliver the completion callback with backoff. The final failure
/// propagates so the caller can log it; callback delivery never fails the
/// task itself.
///
/// # Errors
///
/// Returns `CollabError::Deployment` when every attempt fails.
pub async fn post_callback(
    client: &reqwest::Client,
    url: &str,
    payload: &CompletionCallback,
    policy: &RetryPolicy,
) -> Result<(), CollabError> {
    retry(policy, || async {
        let response = client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| CollabError::Deployment(format!("callback POST failed: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CollabError::Deployment(format!(
                "callback returned status {}",
                response.status()
            )))
        }
    })
    .await?;

    info!(url, task = %payload.task, round = payload.round, "completion callback delivered");
    Ok(())
}

/// HTTP client for the code-generation collaborator.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpGenerator {
    /// # Errors
    ///
    /// Returns `CollabError::Generation` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, CollabError> {
        Ok(Self {
            client: build_client().map_err(CollabError::Generation)?,
            base_url: trimmed(base_url),
            policy: RetryPolicy::quick(),
        })
    }

    async fn request_files(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<FileMap, CollabError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response: GeneratedFiles = retry(&self.policy, || async {
            post_json(&self.client, &url, body, CollabError::Generation).await
        })
        .await?;

        if response.files.is_empty() {
            return Err(CollabError::Generation(
                "generator returned no files".to_string(),
            ));
        }

        debug!(endpoint, files = response.files.len(), "generator returned files");
        Ok(response.files)
    }
}

#[async_trait]
impl ArtifactGenerator for HttpGenerator {
    async fn generate(&self, spec: &GenerationSpec) -> Result<FileMap, CollabError> {
        self.request_files("generate", spec).await
    }

    async fn update(
        &self,
        spec: &GenerationSpec,
        existing: &FileMap,
    ) -> Result<FileMap, CollabError> {
        let body = UpdateSpec {
            spec: spec.clone(),
            existing_files: existing.clone(),
        };
        self.request_files("update", &body).await
    }
}

/// HTTP client for the hosting collaborator. Also serves as the
/// deployment-record lookup since the host owns those records.
pub struct HttpHost {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpHost {
    /// # Errors
    ///
    /// Returns `CollabError::Deployment` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, CollabError> {
        Ok(Self {
            client: build_client().map_err(CollabError::Deployment)?,
            base_url: trimmed(base_url),
            policy: RetryPolicy::quick(),
        })
    }

    fn deployment_url(&self, task_id: &str) -> String {
        format!("{}/deployments/{task_id}", self.base_url)
    }
}

#[async_trait]
impl Host for HttpHost {
    async fn deploy(&self, request: &DeployRequest) -> Result<Deployment, CollabError> {
        let url = format!("{}/deployments", self.base_url);
        let deployment: Deployment = retry(&self.policy, || async {
            post_json(&self.client, &url, request, CollabError::Deployment).await
        })
        .await?;

        info!(
            task_id = %request.task_id,
            repo_url = %deployment.repo_url,
            pages_url = %deployment.pages_url,
            "deployment created"
        );
        Ok(deployment)
    }

    async fn update(&self, request: &DeployRequest) -> Result<Deployment, CollabError> {
        let url = self.deployment_url(&request.task_id);
        let deployment: Deployment = retry(&self.policy, || async {
            post_json(&self.client, &url, request, CollabError::Deployment).await
        })
        .await?;

        info!(
            task_id = %request.task_id,
            commit_sha = %deployment.commit_sha,
            "deployment updated"
        );
        Ok(deployment)
    }

    async fn fetch_files(&self, task_id: &str) -> Result<FileMap, CollabError> {
        let url = format!("{}/files", self.deployment_url(task_id));
        let response: DeployedFiles = retry(&self.policy, || async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| CollabError::Fetch(format!("GET {url} failed: {e}")))?;
            decode_response(response, CollabError::Fetch).await
        })
        .await?;

        debug!(task_id, files = response.files.len(), "fetched deployed files");
        Ok(response.files)
    }
}

#[async_trait]
impl DeploymentLookup for HttpHost {
    async fn prior_deployment(&self, task_id: &str) -> Result<Option<Deployment>, CollabError> {
        let url = self.deployment_url(task_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollabError::Lookup(format!("GET {url} failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(task_id, "no prior deployment record");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CollabError::Lookup(format!(
                "lookup returned status {}",
                response.status()
            )));
        }

        let deployment: Deployment = response
            .json()
            .await
            .map_err(|e| CollabError::Lookup(format!("invalid lookup response: {e}")))?;
        Ok(Some(deployment))
    }
}

fn build_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .connect_timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))
}

fn trimmed(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// POST a JSON body and decode a JSON response, mapping failures through
/// the caller's error constructor.
async fn post_json<T, B>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    make_error: fn(String) -> CollabError,
) -> Result<T, CollabError>
where
    T: serde::de::DeserializeOwned,
    B: Serialize,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| make_error(format!("POST {url} failed: {e}")))?;
    decode_response(response, make_error).await
}

async fn decode_response<T>(
    response: reqwest::Response,
    make_error: fn(String) -> CollabError,
) -> Result<T, CollabError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, "collaborator returned error status");
        return Err(make_error(format!("status {status}: {body}")));
    }
    response
        .json()
        .await
        .map_err(|e| make_error(format!("invalid response body: {e}")))
}

#[derive(Debug, Clone, Serialize)]
struct UpdateSpec {
    #[serde(flatten)]
    spec: GenerationSpec,
    existing_files: FileMap,
}

#[derive(Debug, Clone, Deserialize)]
struct GeneratedFiles {
    files: FileMap,
}

#[derive(Debug, Clone, Deserialize)]
struct DeployedFiles {
    files: FileMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        serde_json::from_str(
            r#"{
                "task_id": "t-42",
                "round": 2,
                "nonce": "abc123",
                "brief": "a todo list",
                "checks": ["has a #list element"],
                "email": "agent@example.com"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn callback_payload_carries_task_identity_and_deployment() {
        let deployment = Deployment {
            repo_url: "https://example.com/repo".to_string(),
            commit_sha: "deadbeef".to_string(),
            pages_url: "https://example.com/page".to_string(),
        };
        let payload = CompletionCallback::new(&task(), &deployment);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["task"], "t-42");
        assert_eq!(json["round"], 2);
        assert_eq!(json["nonce"], "abc123");
        assert_eq!(json["email"], "agent@example.com");
        assert_eq!(json["repo_url"], "https://example.com/repo");
        assert_eq!(json["commit_sha"], "deadbeef");
        assert_eq!(json["pages_url"], "https://example.com/page");
    }

    #[test]
    fn generation_spec_mirrors_task_fields() {
        let spec = GenerationSpec::from_task(&task(), std::path::Path::new("/tmp/ws"));
        assert_eq!(spec.task_id, "t-42");
        assert_eq!(spec.checks, vec!["has a #list element".to_string()]);
        assert_eq!(spec.workspace_path, "/tmp/ws");
    }

    #[test]
    fn update_spec_flattens_generation_fields() {
        let spec = GenerationSpec::from_task(&task(), std::path::Path::new("/tmp/ws"));
        let mut existing = FileMap::new();
        existing.insert("index.html".to_string(), "<html></html>".to_string());

        let json = serde_json::to_value(UpdateSpec {
            spec,
            existing_files: existing,
        })
        .unwrap();
        assert_eq!(json["task_id"], "t-42");
        assert!(json["existing_files"]["index.html"].is_string());
    }
}
