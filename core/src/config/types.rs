use crate::audit::{AuditSink, JournalAuditSink, MemoryAuditSink};
use crate::error::GuardError;
use crate::guard::{RiskLevel, Stage, Tier, ToolRiskProfile, ValidationPipeline};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error occurred while reading/writing config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// A value parsed but is out of range or inconsistent
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl From<GuardError> for ConfigError {
    fn from(err: GuardError) -> Self {
        ConfigError::InvalidValue(err.to_string())
    }
}

/// One stage in a tier list, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageSpec {
    DenySubstring {
        #[serde(default)]
        name: Option<String>,
        terms: Vec<String>,
    },
    DenyPattern {
        #[serde(default)]
        name: Option<String>,
        patterns: Vec<String>,
    },
    /// Built-in harmful-request patterns
    SafetyFilter,
    /// Built-in unsafe-output patterns
    ContentSafety,
    Relevance {
        #[serde(default = "default_off_topic")]
        off_topic: Vec<String>,
    },
    RequireKeywords {
        #[serde(default)]
        name: Option<String>,
        keywords: Vec<String>,
    },
    Pii {
        /// Replaces the built-in detectors when set
        #[serde(default)]
        patterns: Option<Vec<String>>,
    },
    ToolRisk {
        /// Replaces the built-in risk table when set
        #[serde(default)]
        tools: Option<BTreeMap<String, RiskLevel>>,
        #[serde(default)]
        unknown: Option<RiskLevel>,
    },
    BrandAlignment {
        #[serde(default = "default_prohibited")]
        prohibited: Vec<String>,
        #[serde(default = "default_brand_min_length")]
        min_length: usize,
    },
    Quality {
        #[serde(default = "default_quality_min_length")]
        min_length: usize,
    },
}

fn default_off_topic() -> Vec<String> {
    ["weather", "sports", "cooking", "random"].map(String::from).to_vec()
}

fn default_prohibited() -> Vec<String> {
    ["cheap", "sketchy", "unreliable"].map(String::from).to_vec()
}

fn default_brand_min_length() -> usize {
    10
}

fn default_quality_min_length() -> usize {
    20
}

impl StageSpec {
    /// Compile into a runnable stage
    pub fn build(&self) -> Result<Stage, GuardError> {
        let stage = match self {
            StageSpec::DenySubstring { name, terms } => {
                Stage::deny_substring(name.as_deref().unwrap_or("blocklist"), terms.clone())
            }
            StageSpec::DenyPattern { name, patterns } => {
                Stage::deny_pattern(name.as_deref().unwrap_or("pattern denylist"), patterns)?
            }
            StageSpec::SafetyFilter => Stage::safety_filter(),
            StageSpec::ContentSafety => Stage::content_safety(),
            StageSpec::Relevance { off_topic } => Stage::relevance(off_topic.clone()),
            StageSpec::RequireKeywords { name, keywords } => Stage::require_keywords(
                name.as_deref().unwrap_or("required keywords"),
                keywords.clone(),
            ),
            StageSpec::Pii { patterns: None } => Stage::pii(),
            StageSpec::Pii {
                patterns: Some(patterns),
            } => Stage::pii_with(patterns)?,
            StageSpec::ToolRisk { tools, unknown } => {
                let profile = match tools {
                    Some(tools) => ToolRiskProfile::from_map(
                        tools.clone(),
                        unknown.unwrap_or(RiskLevel::Medium),
                    )?,
                    None => ToolRiskProfile::default(),
                };
                Stage::tool_risk(profile)
            }
            StageSpec::BrandAlignment {
                prohibited,
                min_length,
            } => Stage::brand_alignment(prohibited.clone(), *min_length),
            StageSpec::Quality { min_length } => Stage::quality(*min_length),
        };
        Ok(stage)
    }
}

/// `[pipeline]`: stage lists per tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: Vec<StageSpec>,
    pub tool: Vec<StageSpec>,
    pub output: Vec<StageSpec>,
}

impl PipelineConfig {
    pub fn build(&self) -> Result<ValidationPipeline, GuardError> {
        let mut pipeline = ValidationPipeline::default();
        for tier in Tier::ALL {
            let specs = match tier {
                Tier::Input => &self.input,
                Tier::Tool => &self.tool,
                Tier::Output => &self.output,
            };
            for spec in specs {
                pipeline = pipeline.with_stage(tier, spec.build()?);
            }
        }
        Ok(pipeline)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditBackend {
    #[default]
    Memory,
    Journal,
}

/// `[audit]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub backend: AuditBackend,
    /// Journal file; defaults to the user data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// fsync after every append
    pub sync: bool,
}

impl AuditConfig {
    pub fn journal_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(JournalAuditSink::default_path)
    }

    /// Open the configured sink
    pub fn open_sink(&self) -> Result<Arc<dyn AuditSink>, GuardError> {
        match self.backend {
            AuditBackend::Memory => Ok(Arc::new(MemoryAuditSink::new())),
            AuditBackend::Journal => {
                let path = self.journal_path().ok_or_else(|| {
                    GuardError::audit_unavailable("no journal path and no data directory")
                })?;
                Ok(Arc::new(JournalAuditSink::open(path)?.with_sync(self.sync)))
            }
        }
    }
}
