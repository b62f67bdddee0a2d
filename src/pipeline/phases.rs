//! Think and Plan phase prompts and response parsing
//!
//! Both phases ask the model for a JSON document. Models wrap JSON in prose
//! often enough that parsing first tries the raw text, then the outermost
//! brace-delimited slice, and finally falls back to a deterministic default
//! so an unparseable response degrades the phase instead of failing the task.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::types::{Analysis, Complexity, Plan, PlanStep, Task};

/// Pipeline phase identifiers, used for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseId {
    Think,
    Plan,
    Act,
    Review,
}

impl PhaseId {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseId::Think => "think",
            PhaseId::Plan => "plan",
            PhaseId::Act => "act",
            PhaseId::Review => "review",
        }
    }
}

/// Generation budget for the Think phase.
pub const THINK_MAX_TOKENS: u32 = 800;
pub const THINK_TEMPERATURE: f32 = 0.3;

/// Generation budget for the Plan phase.
pub const PLAN_MAX_TOKENS: u32 = 1000;
pub const PLAN_TEMPERATURE: f32 = 0.4;

pub const THINK_SYSTEM_MESSAGE: &str = "You are an expert web developer analyzing project \
     requirements. Provide detailed, structured analysis of the task requirements.";

pub const PLAN_SYSTEM_MESSAGE: &str = "You are a senior software architect creating development \
     plans. Provide detailed, actionable plans that a developer can follow.";

#[must_use]
pub fn think_prompt(task: &Task) -> String {
    format!(
        r#"Analyze this web development task and provide a comprehensive understanding:

Task Brief: {brief}
Requirements: {checks}
Round: {round}

Provide analysis as JSON in the following format:
{{
    "technologies": ["list", "of", "technologies"],
    "complexity": "low|medium|high",
    "key_components": ["component1", "component2"],
    "potential_challenges": ["challenge1", "challenge2"],
    "success_criteria": ["criteria1", "criteria2"]
}}"#,
        brief = task.brief,
        checks = serde_json::to_string(&task.checks).unwrap_or_default(),
        round = task.round,
    )
}

#[must_use]
pub fn plan_prompt(task: &Task, analysis: &Analysis) -> String {
    format!(
        r#"Create a detailed development plan for this web application:

Analysis: {analysis}
Requirements: {checks}
Round: {round}

Provide a step-by-step plan as JSON in the following format:
{{
    "steps": [
        {{
            "step": 1,
            "description": "Detailed description",
            "dependencies": ["step1", "step2"]
        }}
    ],
    "file_manifest": {{
        "index.html": "Main HTML file",
        "style.css": "CSS styles",
        "script.js": "JavaScript functionality"
    }},
    "testing_strategy": "How to test each component"
}}"#,
        analysis = serde_json::to_string(analysis).unwrap_or_default(),
        checks = serde_json::to_string(&task.checks).unwrap_or_default(),
        round = task.round,
    )
}

/// Parse the Think response, or fall back to a generic analysis seeded
/// with the task's own checks as success criteria.
#[must_use]
pub fn parse_analysis(text: &str, task: &Task) -> Analysis {
    match parse_json_response::<Analysis>(text) {
        Some(analysis) => analysis,
        None => {
            warn!(phase = PhaseId::Think.as_str(), "unparseable response, using fallback analysis");
            fallback_analysis(task)
        }
    }
}

/// Parse the Plan response, or fall back to the standard three-step plan.
#[must_use]
pub fn parse_plan(text: &str) -> Plan {
    match parse_json_response::<Plan>(text) {
        Some(plan) if !plan.steps.is_empty() => plan,
        _ => {
            warn!(phase = PhaseId::Plan.as_str(), "unparseable response, using fallback plan");
            fallback_plan()
        }
    }
}

#[must_use]
pub fn fallback_analysis(task: &Task) -> Analysis {
    Analysis {
        technologies: vec![
            "HTML".to_string(),
            "CSS".to_string(),
            "JavaScript".to_string(),
        ],
        complexity: Complexity::Medium,
        key_components: vec!["User interface".to_string(), "Functionality".to_string()],
        potential_challenges: vec!["Cross-browser compatibility".to_string()],
        success_criteria: task.checks.iter().take(2).cloned().collect(),
    }
}

#[must_use]
pub fn fallback_plan() -> Plan {
    let steps = [
        (1, "Create HTML structure", vec![]),
        (2, "Add CSS styling", vec!["step 1"]),
        (3, "Implement JavaScript functionality", vec!["step 1", "step 2"]),
    ];
    Plan {
        steps: steps
            .into_iter()
            .map(|(step, description, dependencies)| PlanStep {
                step,
                description: description.to_string(),
                dependencies: dependencies.into_iter().map(str::to_string).collect(),
            })
            .collect(),
        file_manifest: [
            ("index.html", "Main application file"),
            ("style.css", "Application styles"),
            ("script.js", "Application logic"),
        ]
        .into_iter()
        .map(|(name, description)| (name.to_string(), description.to_string()))
        .collect(),
        testing_strategy: "Manual testing in browser".to_string(),
    }
}

/// Try the whole text as JSON, then the outermost `{...}` slice.
fn parse_json_response<T: DeserializeOwned>(text: &str) -> Option<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        serde_json::from_str(
            r#"{
                "task_id": "t-1",
                "round": 1,
                "brief": "a weather dashboard",
                "checks": ["page title mentions Weather", "has a #forecast element", "uses Bootstrap"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_clean_json_analysis() {
        let analysis = parse_analysis(
            r#"{"technologies":["HTML","Chart.js"],"complexity":"high","key_components":["chart"]}"#,
            &task(),
        );
        assert_eq!(analysis.complexity, Complexity::High);
        assert_eq!(analysis.technologies, vec!["HTML", "Chart.js"]);
    }

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let analysis = parse_analysis(
            r#"Here is my analysis:
            {"technologies":["HTML"],"complexity":"low"}
            Let me know if you need more detail."#,
            &task(),
        );
        assert_eq!(analysis.complexity, Complexity::Low);
    }

    #[test]
    fn garbage_think_response_degrades_to_fallback() {
        let analysis = parse_analysis("I cannot produce JSON today.", &task());
        assert_eq!(analysis.complexity, Complexity::Medium);
        // Fallback seeds success criteria from the first two checks.
        assert_eq!(
            analysis.success_criteria,
            vec![
                "page title mentions Weather".to_string(),
                "has a #forecast element".to_string()
            ]
        );
    }

    #[test]
    fn garbage_plan_response_degrades_to_three_step_fallback() {
        let plan = parse_plan("no plan here");
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[0].description, "Create HTML structure");
        assert!(plan.file_manifest.contains_key("index.html"));
    }

    #[test]
    fn plan_with_empty_steps_is_rejected() {
        let plan = parse_plan(r#"{"steps":[]}"#);
        assert_eq!(plan.steps.len(), 3);
    }

    #[test]
    fn prompts_embed_task_fields() {
        let prompt = think_prompt(&task());
        assert!(prompt.contains("a weather dashboard"));
        assert!(prompt.contains("Round: 1"));

        let plan = plan_prompt(&task(), &fallback_analysis(&task()));
        assert!(plan.contains("has a #forecast element"));
    }
}
