//! Check-string classification
//!
//! Check strings arrive as free text with a small micro-grammar layered on
//! top: a literal `js:` prefix selects JavaScript-expression evaluation, an
//! `#id` token selects a DOM-existence query, and everything else falls
//! through to substring heuristics. Classification happens exactly once per
//! evaluation run, here, so the rules stay single-sourced. The prefix
//! convention is part of the wire contract with task submitters and must be
//! preserved exactly.

use once_cell::sync::Lazy;
use regex::Regex;

/// Literal marker selecting JS-expression evaluation
const JS_PREFIX: &str = "js:";

/// `#id` token within a free-text check. Digit-initial ids are valid here:
/// the DOM query goes through `querySelector`-style lookup by id value, not
/// a CSS ident parse.
static ID_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([\w-]+)").unwrap());

/// Framework tokens recognized by the library-presence heuristic
const LIBRARY_TOKENS: &[&str] = &["bootstrap", "tailwind", "jquery"];

/// A check string parsed into its evaluation semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// Evaluate the expression in the page's JS context, coerced to boolean
    Js(String),
    /// Pass when an element with this id exists in the DOM
    SelectorExists(String),
    /// Substring-matched free-text claim
    Heuristic(Heuristic),
}

/// Free-text check kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heuristic {
    /// License/readme claims; satisfied by the deployment collaborator,
    /// not the rendered page, so they auto-pass here
    RepoLevel,
    /// Match check words against the page title
    Title,
    /// A CSS/script tag whose path contains this framework token
    Library(String),
    /// No structural anchor; passes once the page has loaded (lenient
    /// fallback by design, existing check authors depend on it)
    Unanchored,
}

impl Check {
    /// Classify a raw check string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(expr) = raw.strip_prefix(JS_PREFIX) {
            return Check::Js(expr.trim().to_string());
        }

        let lower = raw.to_lowercase();

        if (lower.contains("license") && lower.contains("mit")) || lower.contains("readme") {
            return Check::Heuristic(Heuristic::RepoLevel);
        }

        if lower.contains("title") {
            return Check::Heuristic(Heuristic::Title);
        }

        if let Some(capture) = ID_TOKEN.captures(raw) {
            return Check::SelectorExists(capture[1].to_string());
        }

        for token in LIBRARY_TOKENS {
            if lower.contains(token) {
                return Check::Heuristic(Heuristic::Library((*token).to_string()));
            }
        }

        Check::Heuristic(Heuristic::Unanchored)
    }
}
