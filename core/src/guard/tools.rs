//! Tool requests and the per-tool risk table used by the tool tier

use super::patterns::is_glob;
use super::types::RiskLevel;
use crate::error::{GuardError, Result};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A tool invocation the agent wants to make
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: serde_json::Value::Null,
        }
    }

    pub fn with_arguments(mut self, arguments: serde_json::Value) -> Self {
        self.arguments = arguments;
        self
    }

    /// Text form scanned by content stages: name followed by compact JSON arguments
    pub fn describe(&self) -> String {
        if self.arguments.is_null() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.arguments)
        }
    }
}

/// Risk per tool name. Keys may be exact names or globs (`database_*`).
///
/// Names are compared ASCII case-insensitively and with surrounding
/// whitespace ignored, for exact keys and globs alike.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRiskProfile {
    exact: BTreeMap<String, RiskLevel>,
    globs: Vec<(Pattern, RiskLevel)>,
    /// Risk for tools matching no entry
    unknown: RiskLevel,
}

const DEFAULT_TOOL_RISKS: [(&str, RiskLevel); 9] = [
    ("web_search", RiskLevel::Low),
    ("calculator", RiskLevel::Low),
    ("file_read", RiskLevel::Medium),
    ("api_call", RiskLevel::Medium),
    ("email_send", RiskLevel::Medium),
    ("file_write", RiskLevel::High),
    ("system_command", RiskLevel::High),
    ("database_*", RiskLevel::High),
    ("financial_transaction", RiskLevel::High),
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl Default for ToolRiskProfile {
    fn default() -> Self {
        let mut profile = Self::new(RiskLevel::Medium);
        for (name, risk) in DEFAULT_TOOL_RISKS {
            if let Err(e) = profile.insert(name, risk) {
                warn!(tool = name, error = %e, "default tool pattern rejected");
                profile.unknown = RiskLevel::High;
            }
        }
        profile
    }
}

impl ToolRiskProfile {
    /// Empty table: every tool gets `unknown`
    pub fn new(unknown: RiskLevel) -> Self {
        Self {
            exact: BTreeMap::new(),
            globs: Vec::new(),
            unknown,
        }
    }

    pub fn from_map(tools: BTreeMap<String, RiskLevel>, unknown: RiskLevel) -> Result<Self> {
        let mut profile = Self::new(unknown);
        for (name, risk) in tools {
            profile.insert(&name, risk)?;
        }
        Ok(profile)
    }

    pub fn with_tool(mut self, pattern: &str, risk: RiskLevel) -> Result<Self> {
        self.insert(pattern, risk)?;
        Ok(self)
    }

    fn insert(&mut self, pattern: &str, risk: RiskLevel) -> Result<()> {
        let key = normalize(pattern);
        if !is_glob(&key) {
            self.exact.insert(key, risk);
            return Ok(());
        }
        let compiled = Pattern::new(&key).map_err(|e| GuardError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.globs.retain(|(existing, _)| existing.as_str() != compiled.as_str());
        self.globs.push((compiled, risk));
        Ok(())
    }

    /// Exact entries win; otherwise the riskiest matching glob; otherwise `unknown`.
    pub fn risk_for(&self, tool_name: &str) -> RiskLevel {
        let name = normalize(tool_name);
        if let Some(risk) = self.exact.get(&name) {
            return *risk;
        }
        self.globs
            .iter()
            .filter(|(pattern, _)| pattern.matches_with(&name, MATCH_OPTIONS))
            .map(|(_, risk)| *risk)
            .max()
            .unwrap_or(self.unknown)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
