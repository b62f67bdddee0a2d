//! Repository-level artifacts added around the generated sources
//!
//! Every deployment carries an MIT LICENSE, a README describing the task
//! and its deployment, and an LLM-written code explanation embedded in the
//! README. The README is rendered twice per deployment: once with
//! placeholder URLs before the artifact exists, once with the real URLs
//! after.

use chrono::{Datelike, Utc};

use crate::types::FileMap;

const LICENSE_HOLDER: &str = "Autonomous Web Agent";

/// Placeholder shown in the pre-deployment README render.
const PENDING_URL: &str = "(pending deployment)";

#[must_use]
pub fn mit_license() -> String {
    format!(
        r#"MIT License

Copyright (c) {year} {LICENSE_HOLDER}

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
"#,
        year = Utc::now().year(),
    )
}

/// Inputs to one README render.
pub struct ReadmeContext<'a> {
    pub task_id: &'a str,
    pub brief: &'a str,
    pub checks: &'a [String],
    /// Empty until deployment; rendered as a pending placeholder
    pub repo_url: &'a str,
    pub pages_url: &'a str,
    pub files: &'a FileMap,
    pub explanation: &'a str,
}

#[must_use]
pub fn render_readme(ctx: &ReadmeContext<'_>) -> String {
    let checks = ctx
        .checks
        .iter()
        .map(|check| format!("- {check}"))
        .collect::<Vec<_>>()
        .join("\n");
    let files = ctx
        .files
        .keys()
        .map(|name| format!("- `{name}`"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"# Task {task_id}

{brief}

## Live Site

{pages_url}

## Repository

{repo_url}

## Requirements

{checks}

## Files

{files}

## Implementation Notes

{explanation}

## License

MIT
"#,
        task_id = ctx.task_id,
        brief = ctx.brief,
        pages_url = or_pending(ctx.pages_url),
        repo_url = or_pending(ctx.repo_url),
        checks = checks,
        files = files,
        explanation = ctx.explanation,
    )
}

/// Prompt for the LLM-written implementation notes.
#[must_use]
pub fn explanation_prompt(brief: &str, files: &FileMap) -> String {
    let names = files.keys().cloned().collect::<Vec<_>>().join(", ");
    format!(
        "Write a short explanation (2-3 paragraphs) of how this web application \
         was implemented.\n\nProject brief: {brief}\nFiles: {names}\n\n\
         Describe the structure and the main implementation decisions in plain \
         prose, no code blocks."
    )
}

/// Explanation used when the LLM cannot produce one; decorative content
/// never fails a deployment.
#[must_use]
pub fn fallback_explanation(brief: &str) -> String {
    format!("Static web application implementing: {brief}")
}

fn or_pending(url: &str) -> &str {
    if url.is_empty() { PENDING_URL } else { url }
}
