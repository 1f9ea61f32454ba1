//! Validation stages
//!
//! A stage is one named check over an opaque input. The built-in variants
//! form a closed set behind [`Stage::evaluate`]; hosts can add their own
//! checks through [`Check`] and [`Stage::custom`].
//!
//! Every stage is a pure function of its input and its own configuration.
//! A check that fails or panics yields a Blocked/High verdict.

use super::patterns::{compile_all, default_input_deny, default_output_deny, default_pii};
use super::tools::{ToolCall, ToolRiskProfile};
use super::types::{RiskLevel, StageVerdict};
use crate::error::{Result, StageFailure};
use regex::Regex;
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

/// Reason shown when a stage could not produce a verdict
pub const STAGE_FAILURE_REASON: &str = "stage failure";

/// What a stage looks at
#[derive(Debug, Clone, Copy)]
pub enum StageInput<'a> {
    /// User input or generated output
    Text(&'a str),
    /// One requested tool call
    Tool(&'a ToolCall),
}

impl<'a> StageInput<'a> {
    /// Text scanned by content predicates
    pub fn text(&self) -> Cow<'a, str> {
        match self {
            StageInput::Text(text) => Cow::Borrowed(*text),
            StageInput::Tool(call) => Cow::Owned(call.describe()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StageInput::Text(text) => text.trim().is_empty(),
            StageInput::Tool(call) => call.name.trim().is_empty() && call.arguments.is_null(),
        }
    }
}

/// Host-provided check
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a verdict, or fail; failures are converted to Blocked/High.
    fn check(&self, input: &StageInput<'_>) -> std::result::Result<StageVerdict, StageFailure>;
}

/// Shared handle to a host check
#[derive(Clone)]
pub struct CustomCheck(Arc<dyn Check>);

impl std::fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CustomCheck").field(&self.0.name()).finish()
    }
}

/// One named check within a tier
#[derive(Debug, Clone)]
pub enum Stage {
    /// Case-insensitive substring denylist → Blocked/High
    DenySubstring { name: String, terms: Vec<String> },
    /// Regex denylist → Blocked/High
    DenyPattern { name: String, patterns: Vec<Regex> },
    /// Off-topic keywords → Blocked/Low
    Relevance { name: String, off_topic: Vec<String> },
    /// None of the keywords present → Escalated/Medium
    RequireKeywords { name: String, keywords: Vec<String> },
    /// PII detected → Escalated/Medium
    Pii { name: String, patterns: Vec<Regex> },
    /// Tool risk table: Low → Approved, Medium → Escalated, High → Blocked
    ToolRisk { name: String, profile: ToolRiskProfile },
    /// Prohibited terms or too short → Blocked/Medium
    BrandAlignment {
        name: String,
        prohibited: Vec<String>,
        min_length: usize,
    },
    /// Too short, no sentence, flat capitalization → Escalated/Low
    Quality { name: String, min_length: usize },
    Custom(CustomCheck),
}

impl Stage {
    /// Block any input containing `term` (case-insensitive)
    pub fn block_if_contains(term: impl Into<String>) -> Self {
        Self::deny_substring("blocklist", [term.into()])
    }

    pub fn deny_substring<I, S>(name: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Stage::DenySubstring {
            name: name.into(),
            terms: lowercase_all(terms),
        }
    }

    /// Case-insensitive regex denylist
    pub fn deny_pattern<S: AsRef<str>>(name: impl Into<String>, patterns: &[S]) -> Result<Self> {
        Ok(Stage::DenyPattern {
            name: name.into(),
            patterns: compile_all(patterns, true)?,
        })
    }

    /// Input safety filter with the default harmful-request patterns
    pub fn safety_filter() -> Self {
        Stage::DenyPattern {
            name: "safety filter".to_string(),
            patterns: default_input_deny(),
        }
    }

    /// Output filter with the default unsafe-content patterns
    pub fn content_safety() -> Self {
        Stage::DenyPattern {
            name: "content safety".to_string(),
            patterns: default_output_deny(),
        }
    }

    pub fn relevance<I, S>(off_topic: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Stage::Relevance {
            name: "relevance".to_string(),
            off_topic: lowercase_all(off_topic),
        }
    }

    pub fn require_keywords<I, S>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Stage::RequireKeywords {
            name: name.into(),
            keywords: lowercase_all(keywords),
        }
    }

    pub fn pii() -> Self {
        Stage::Pii {
            name: "pii detection".to_string(),
            patterns: default_pii(),
        }
    }

    pub fn pii_with<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Ok(Stage::Pii {
            name: "pii detection".to_string(),
            patterns: compile_all(patterns, false)?,
        })
    }

    pub fn tool_risk(profile: ToolRiskProfile) -> Self {
        Stage::ToolRisk {
            name: "tool risk".to_string(),
            profile,
        }
    }

    pub fn brand_alignment<I, S>(prohibited: I, min_length: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Stage::BrandAlignment {
            name: "brand alignment".to_string(),
            prohibited: lowercase_all(prohibited),
            min_length,
        }
    }

    pub fn quality(min_length: usize) -> Self {
        Stage::Quality {
            name: "quality".to_string(),
            min_length,
        }
    }

    pub fn custom(check: impl Check + 'static) -> Self {
        Stage::Custom(CustomCheck(Arc::new(check)))
    }

    pub fn name(&self) -> &str {
        match self {
            Stage::DenySubstring { name, .. }
            | Stage::DenyPattern { name, .. }
            | Stage::Relevance { name, .. }
            | Stage::RequireKeywords { name, .. }
            | Stage::Pii { name, .. }
            | Stage::ToolRisk { name, .. }
            | Stage::BrandAlignment { name, .. }
            | Stage::Quality { name, .. } => name,
            Stage::Custom(custom) => custom.0.name(),
        }
    }

    /// Evaluate the stage. Never fails: errors and panics become Blocked/High.
    pub fn evaluate(&self, input: &StageInput<'_>) -> StageVerdict {
        match panic::catch_unwind(AssertUnwindSafe(|| self.check(input))) {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(failure)) => {
                warn!(stage = self.name(), error = %failure, "stage failed, blocking");
                self.failure_verdict()
            }
            Err(_) => {
                error!(stage = self.name(), "stage panicked, blocking");
                self.failure_verdict()
            }
        }
    }

    fn failure_verdict(&self) -> StageVerdict {
        StageVerdict::blocked(self.name(), RiskLevel::High, STAGE_FAILURE_REASON)
            .with_recommendations(["Review stage configuration"])
    }

    fn check(&self, input: &StageInput<'_>) -> std::result::Result<StageVerdict, StageFailure> {
        if let Stage::Custom(custom) = self {
            // Host checks decide for themselves what empty input means
            return custom.0.check(input);
        }
        if input.is_empty() {
            return Ok(StageVerdict::approved(self.name(), "empty input"));
        }

        let name = self.name();
        let text = input.text();
        let lowered = text.to_lowercase();

        let verdict = match self {
            Stage::DenySubstring { terms, .. } => match terms.iter().find(|t| lowered.contains(t.as_str())) {
                Some(term) => StageVerdict::blocked(
                    name,
                    RiskLevel::High,
                    format!("Content contains blocked phrase: \"{}\"", term),
                )
                .with_recommendations(["Block request", "Log security incident"]),
                None => StageVerdict::approved(name, "No blocked phrases found"),
            },
            Stage::DenyPattern { patterns, .. } => match patterns.iter().find(|re| re.is_match(&text)) {
                Some(re) => StageVerdict::blocked(
                    name,
                    RiskLevel::High,
                    format!("Content contains potentially harmful pattern: {}", re.as_str()),
                )
                .with_recommendations([
                    "Block request",
                    "Log security incident",
                    "Alert monitoring team",
                ]),
                None => StageVerdict::approved(name, "No harmful content patterns detected"),
            },
            Stage::Relevance { off_topic, .. } => {
                if off_topic.iter().any(|k| lowered.contains(k.as_str())) {
                    StageVerdict::blocked(
                        name,
                        RiskLevel::Low,
                        "Request appears unrelated to agent capabilities",
                    )
                    .with_recommendations([
                        "Redirect to appropriate service",
                        "Provide capability overview",
                    ])
                } else {
                    StageVerdict::approved(name, "Request appears relevant to agent capabilities")
                }
            }
            Stage::RequireKeywords { keywords, .. } => {
                if keywords.iter().any(|k| lowered.contains(k.as_str())) {
                    StageVerdict::approved(name, "Required context present")
                } else {
                    StageVerdict::escalated(
                        name,
                        RiskLevel::Medium,
                        format!("Content mentions none of: {}", keywords.join(", ")),
                    )
                    .with_recommendations(["Request human review"])
                }
            }
            Stage::Pii { patterns, .. } => {
                let found: usize = patterns.iter().map(|re| re.find_iter(&text).count()).sum();
                if found > 0 {
                    StageVerdict::escalated(
                        name,
                        RiskLevel::Medium,
                        format!("Detected {} potential PII instances", found),
                    )
                    .with_recommendations([
                        "Sanitize PII",
                        "Request user confirmation",
                        "Apply data handling policies",
                    ])
                } else {
                    StageVerdict::approved(name, "No PII detected")
                }
            }
            Stage::ToolRisk { profile, .. } => match input {
                StageInput::Tool(call) => tool_verdict(name, call, profile),
                StageInput::Text(_) => StageVerdict::approved(name, "Not a tool request"),
            },
            Stage::BrandAlignment {
                prohibited,
                min_length,
                ..
            } => {
                let mut violations: Vec<String> = prohibited
                    .iter()
                    .filter(|term| lowered.contains(term.as_str()))
                    .map(|term| format!("Contains prohibited term: {}", term))
                    .collect();
                if text.chars().count() < *min_length {
                    violations.push("Response too brief for professional tone".to_string());
                }
                if violations.is_empty() {
                    StageVerdict::approved(name, "Output aligns with brand guidelines")
                } else {
                    StageVerdict::blocked(
                        name,
                        RiskLevel::Medium,
                        format!("Brand guideline violations: {}", violations.join("; ")),
                    )
                    .with_recommendations(["Regenerate response", "Apply brand voice guidelines"])
                }
            }
            Stage::Quality { min_length, .. } => {
                let issues = quality_issues(&text, *min_length);
                if issues.is_empty() {
                    StageVerdict::approved(name, "Output meets quality standards")
                } else {
                    StageVerdict::escalated(
                        name,
                        RiskLevel::Low,
                        format!("Quality issues detected: {}", issues.join("; ")),
                    )
                    .with_recommendations(["Improve response quality", "Consider regeneration"])
                }
            }
            Stage::Custom(custom) => return custom.0.check(input),
        };
        Ok(verdict)
    }
}

fn tool_verdict(name: &str, call: &ToolCall, profile: &ToolRiskProfile) -> StageVerdict {
    let risk = profile.risk_for(&call.name);
    match risk {
        RiskLevel::Low => StageVerdict::approved(
            name,
            format!("Low-risk tool {} auto-approved", call.name),
        ),
        RiskLevel::Medium => StageVerdict::escalated(
            name,
            risk,
            format!("Medium-risk tool {} requires human review", call.name),
        )
        .with_recommendations([
            "Execute with enhanced monitoring",
            "Require confirmation for sensitive operations",
        ]),
        RiskLevel::High => StageVerdict::blocked(
            name,
            risk,
            format!("High-risk tool {} automatically blocked", call.name),
        )
        .with_recommendations(["Block tool access", "Escalate to security team"]),
    }
}

fn quality_issues(text: &str, min_length: usize) -> Vec<&'static str> {
    let mut issues = Vec::new();
    if text.chars().count() < min_length {
        issues.push("Response too short");
    }
    if !text.contains('.') {
        issues.push("Missing sentence structure");
    }
    let cased: Vec<char> = text
        .chars()
        .filter(|c| c.is_uppercase() || c.is_lowercase())
        .collect();
    if !cased.is_empty()
        && (cased.iter().all(|c| c.is_uppercase()) || cased.iter().all(|c| c.is_lowercase()))
    {
        issues.push("Poor capitalization");
    }
    issues
}

fn lowercase_all<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(|item| item.into().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}
