//! Core data model: tasks, per-phase outputs, and evaluation results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Map of artifact filename to text content.
///
/// Ordered so that serialized requests and commit payloads are deterministic.
pub type FileMap = BTreeMap<String, String>;

/// An incoming task descriptor. Immutable once pipeline execution starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    /// Iteration counter: 1 for initial fulfillment, 2+ for revision requests
    pub round: u32,
    #[serde(default)]
    pub nonce: String,
    /// Natural-language project brief
    pub brief: String,
    /// Ordered machine-evaluable acceptance criteria
    pub checks: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Callback URL notified after deployment; absent means no callback
    #[serde(default)]
    pub evaluation_url: Option<String>,
    #[serde(default)]
    pub email: String,
}

/// A named attachment referenced by a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Terminal and intermediate task statuses visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Accepted,
    Processing,
    Completed,
    Failed,
}

/// Complexity tier assigned during the Think phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Structured output of the Think phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub technologies: Vec<String>,
    pub complexity: Complexity,
    #[serde(default)]
    pub key_components: Vec<String>,
    #[serde(default)]
    pub potential_challenges: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

/// Structured output of the Plan phase.
///
/// The file manifest is advisory: it feeds logging only and is never
/// enforced against what the generator actually produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub file_manifest: BTreeMap<String, String>,
    #[serde(default)]
    pub testing_strategy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: u32,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Output of the Act phase: where the artifact landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

/// Final report produced by the Review phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub task_id: String,
    pub status: TaskStatus,
    pub deployment: Option<Deployment>,
    pub score: f64,
    pub checks_passed: Vec<String>,
    pub checks_failed: Vec<String>,
    pub recommendations: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// A failed check with the reason it failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCheck {
    pub check: String,
    pub reason: String,
}

/// Result of evaluating one deployed page against a list of checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub url: String,
    pub total_checks: usize,
    pub checks_passed: Vec<String>,
    pub checks_failed: Vec<FailedCheck>,
    /// Fraction of passed checks in [0, 1]; 0.0 for an empty check list
    pub score: f64,
    /// Full-page screenshot, when capture succeeded
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
    /// Fatal errors encountered before any checks could run
    pub errors: Vec<String>,
}

impl EvaluationResult {
    /// Empty result for a page that has not been scored yet.
    #[must_use]
    pub fn new(url: impl Into<String>, total_checks: usize) -> Self {
        Self {
            url: url.into(),
            total_checks,
            checks_passed: Vec::new(),
            checks_failed: Vec::new(),
            score: 0.0,
            screenshot: None,
            errors: Vec::new(),
        }
    }

    /// Result for a page that could not be reached: zero passed checks,
    /// no failed-check entries, exactly one navigation error. Checks are
    /// never executed against an unreachable page.
    #[must_use]
    pub fn aborted(url: impl Into<String>, total_checks: usize, error: impl Into<String>) -> Self {
        let mut result = Self::new(url, total_checks);
        result.errors.push(error.into());
        result
    }

    /// Recompute the score from the current pass counts.
    pub fn finalize_score(&mut self) {
        self.score = score(self.checks_passed.len(), self.total_checks);
    }
}

/// Fractional score: passed / total, or 0.0 when there is nothing to check.
#[must_use]
pub fn score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_fraction_of_passed() {
        assert_eq!(score(0, 4), 0.0);
        assert_eq!(score(1, 4), 0.25);
        assert_eq!(score(4, 4), 1.0);
    }

    #[test]
    fn score_of_empty_check_list_is_zero() {
        assert_eq!(score(0, 0), 0.0);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        for total in 1..=10usize {
            for passed in 0..=total {
                let s = score(passed, total);
                assert!((0.0..=1.0).contains(&s), "score {s} out of range");
            }
        }
    }

    #[test]
    fn aborted_result_has_single_error_and_no_checks() {
        let result = EvaluationResult::aborted("https://example.com", 3, "page returned status 404");
        assert!(result.checks_passed.is_empty());
        assert!(result.checks_failed.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.total_checks, 3);
    }

    #[test]
    fn task_deserializes_with_optional_fields_missing() {
        let task: Task = serde_json::from_str(
            r#"{"task_id":"t-1","round":1,"brief":"a page","checks":["has a #main element"]}"#,
        )
        .unwrap();
        assert_eq!(task.round, 1);
        assert!(task.attachments.is_empty());
        assert!(task.evaluation_url.is_none());
    }
}
