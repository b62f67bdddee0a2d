//! Headless-browser evaluation engine
//!
//! Loads a deployed artifact's live URL in headless Chrome (via CDP),
//! executes the task's checks in input order, and derives a fractional
//! score plus per-check pass/fail reasons. An unreachable page aborts the
//! whole evaluation with zero credit; a single failing check never does.

mod check;

pub use check::{Check, Heuristic};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::EvalError;
use crate::types::{EvaluationResult, FailedCheck};

/// Extra delay after load for client-side rendering frameworks to settle
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Evaluates one page against a list of checks.
///
/// The browser-backed implementation is [`HeadlessEvaluator`]; the pipeline
/// depends on this trait so tests can substitute a deterministic evaluator.
#[async_trait]
pub trait PageEvaluator: Send + Sync {
    /// Evaluate `url` against `checks` with a per-navigation `timeout`.
    ///
    /// Navigation failures are not errors: they are recorded inside the
    /// result. An `Err` means the evaluation infrastructure itself failed
    /// (browser missing, session lost) before a result could be produced.
    ///
    /// # Errors
    ///
    /// Returns `EvalError` when the browser could not be driven at all.
    async fn evaluate(
        &self,
        url: &str,
        checks: &[String],
        timeout: Duration,
    ) -> Result<EvaluationResult, EvalError>;
}

/// Scoped evaluator that launches a fresh headless browser per evaluation
/// and guarantees it is terminated on every exit path.
#[derive(Debug, Clone, Default)]
pub struct HeadlessEvaluator {
    settle_delay: Option<Duration>,
}

impl HeadlessEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settle_delay(settle_delay: Duration) -> Self {
        Self {
            settle_delay: Some(settle_delay),
        }
    }
}

#[async_trait]
impl PageEvaluator for HeadlessEvaluator {
    async fn evaluate(
        &self,
        url: &str,
        checks: &[String],
        timeout: Duration,
    ) -> Result<EvaluationResult, EvalError> {
        let session = BrowserSession::launch(
            self.settle_delay.unwrap_or(DEFAULT_SETTLE_DELAY),
        )
        .await?;
        // evaluate_page encodes its failures in the result, so the browser
        // is shut down on every path that reaches here.
        let result = session.evaluate_page(url, checks, timeout).await;
        session.close().await;
        Ok(result)
    }
}

/// A live browser instance reused across page evaluations within one scope.
pub struct BrowserSession {
    browser: Browser,
    event_loop: JoinHandle<()>,
    http: reqwest::Client,
    settle_delay: Duration,
}

impl BrowserSession {
    /// Launch headless Chrome and spawn its CDP event loop.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Launch` when no Chrome executable is available
    /// or the browser process fails to start.
    pub async fn launch(settle_delay: Duration) -> Result<Self, EvalError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(EvalError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EvalError::Launch(e.to_string()))?;

        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| EvalError::Launch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            browser,
            event_loop,
            http,
            settle_delay,
        })
    }

    /// Terminate the browser process. Must run on every exit path.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        let _ = self.browser.wait().await;
        self.event_loop.abort();
    }

    /// Evaluate one page. Failures are encoded in the returned result:
    /// an unreachable page yields zero passed checks and a single
    /// navigation error; individual check failures carry their reasons.
    pub async fn evaluate_page(
        &self,
        url: &str,
        checks: &[String],
        timeout: Duration,
    ) -> EvaluationResult {
        info!(url, checks = checks.len(), "evaluating page");

        let page = match self.load_page(url, timeout).await {
            Ok(page) => page,
            Err(reason) => {
                warn!(url, reason, "navigation failed, aborting evaluation");
                return EvaluationResult::aborted(url, checks.len(), reason);
            }
        };

        let mut result = EvaluationResult::new(url, checks.len());

        for raw in checks {
            let outcome = self.run_check(&page, raw).await;
            if outcome.passed {
                result.checks_passed.push(raw.clone());
            } else {
                result.checks_failed.push(FailedCheck {
                    check: raw.clone(),
                    reason: outcome.reason.unwrap_or_else(|| "Check failed".to_string()),
                });
            }
        }

        result.finalize_score();

        // Best-effort screenshot; failure is logged, never fatal.
        match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(bytes) => {
                debug!(url, bytes = bytes.len(), "screenshot captured");
                result.screenshot = Some(bytes);
            }
            Err(e) => warn!(url, error = %e, "failed to capture screenshot"),
        }

        if let Err(e) = page.close().await {
            warn!(url, error = %e, "failed to close page");
        }

        info!(
            url,
            passed = result.checks_passed.len(),
            total = result.total_checks,
            score = result.score,
            "evaluation complete"
        );

        result
    }

    /// Preflight the URL, then navigate and wait for load plus the settle
    /// delay. Returns a navigation-failure reason on any error.
    async fn load_page(&self, url: &str, timeout: Duration) -> Result<Page, String> {
        preflight(&self.http, url, timeout).await?;

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to open page: {e}"))?;

        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Err(_) => {
                let _ = page.close().await;
                Err(format!("Navigation timed out after {}s", timeout.as_secs()))
            }
            Ok(Err(e)) => {
                let _ = page.close().await;
                Err(format!("Failed to load page: {e}"))
            }
            Ok(Ok(())) => {
                tokio::time::sleep(self.settle_delay).await;
                Ok(page)
            }
        }
    }

    async fn run_check(&self, page: &Page, raw: &str) -> CheckOutcome {
        match Check::parse(raw) {
            Check::Js(expr) => run_js_check(page, &expr).await,
            Check::SelectorExists(id) => run_selector_check(page, &id).await,
            Check::Heuristic(heuristic) => run_heuristic_check(page, raw, &heuristic).await,
        }
    }
}

/// Status probe run before any browser interaction: checks must never run
/// against a page that is unreachable or answers with an error status.
async fn preflight(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<(), String> {
    let response = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| format!("Failed to load page: {e}"))?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(format!("Page returned status {}", response.status()))
    }
}

struct CheckOutcome {
    passed: bool,
    reason: Option<String>,
}

impl CheckOutcome {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Evaluate a `js:` expression; the result is coerced to boolean. An
/// evaluation exception fails this check only, never the whole run.
async fn run_js_check(page: &Page, expr: &str) -> CheckOutcome {
    match page.evaluate(expr).await {
        Ok(evaluation) => {
            let value = evaluation.value().cloned().unwrap_or(Value::Null);
            if is_truthy(&value) {
                CheckOutcome::pass()
            } else {
                CheckOutcome::fail(js_failure_reason(&value))
            }
        }
        Err(e) => CheckOutcome::fail(format!("JS evaluation error: {e}")),
    }
}

async fn run_selector_check(page: &Page, id: &str) -> CheckOutcome {
    // Attribute selector rather than `#{id}`: digit-initial ids are valid
    // id values but invalid CSS idents.
    match page.find_element(format!(r#"[id="{id}"]"#)).await {
        Ok(_) => CheckOutcome::pass(),
        Err(_) => CheckOutcome::fail(format!("Element #{id} not found")),
    }
}

async fn run_heuristic_check(page: &Page, raw: &str, heuristic: &Heuristic) -> CheckOutcome {
    match heuristic {
        // Satisfied by the deployment collaborator, not the rendered page.
        Heuristic::RepoLevel => CheckOutcome::pass(),
        Heuristic::Title => {
            let title = match page.get_title().await {
                Ok(title) => title.unwrap_or_default(),
                Err(e) => return CheckOutcome::fail(format!("Failed to read title: {e}")),
            };
            if title_matches(raw, &title) {
                CheckOutcome::pass()
            } else {
                CheckOutcome::fail(format!("Title '{title}' doesn't match requirement"))
            }
        }
        Heuristic::Library(token) => match page.evaluate(library_probe(token)).await {
            Ok(evaluation) => {
                let found = evaluation
                    .value()
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if found {
                    CheckOutcome::pass()
                } else {
                    CheckOutcome::fail(format!("{token} not found"))
                }
            }
            Err(e) => CheckOutcome::fail(format!("Library probe failed: {e}")),
        },
        // Lenient fallback: no structural anchor means nothing to verify
        // deterministically, so a loaded page passes.
        Heuristic::Unanchored => CheckOutcome::pass(),
    }
}

/// JS boolean coercion over the JSON value an expression returned.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Failure reason for a falsy `js:` result, carrying the literal value.
fn js_failure_reason(value: &Value) -> String {
    format!("JS expression returned: {value}")
}

/// Does any word of the check appear in the page title?
fn title_matches(check: &str, title: &str) -> bool {
    let title = title.to_lowercase();
    check
        .to_lowercase()
        .split_whitespace()
        .any(|word| title.contains(word))
}

/// Expression probing for a CSS/script tag whose path contains `token`.
fn library_probe(token: &str) -> String {
    format!(
        r#"(() => {{
            const links = document.querySelectorAll('link[href*="{token}"]');
            const scripts = document.querySelectorAll('script[src*="{token}"]');
            return links.length > 0 || scripts.length > 0;
        }})()"#
    )
}
