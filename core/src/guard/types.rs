//! Verdict and risk types shared by stages, pipelines and the audit trail

use serde::{Deserialize, Serialize};

/// Risk attached to a verdict. Ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Outcome of one stage evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Blocked,
    /// Needs external (human) adjudication
    Escalated,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => write!(f, "approved"),
            Verdict::Blocked => write!(f, "blocked"),
            Verdict::Escalated => write!(f, "escalated"),
        }
    }
}

/// Result of one stage. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageVerdict {
    stage: String,
    verdict: Verdict,
    risk: RiskLevel,
    reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    recommendations: Vec<String>,
}

impl StageVerdict {
    pub fn new(
        stage: impl Into<String>,
        verdict: Verdict,
        risk: RiskLevel,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            verdict,
            risk,
            reason: reason.into(),
            recommendations: Vec::new(),
        }
    }

    pub fn approved(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(stage, Verdict::Approved, RiskLevel::Low, reason)
    }

    pub fn blocked(stage: impl Into<String>, risk: RiskLevel, reason: impl Into<String>) -> Self {
        Self::new(stage, Verdict::Blocked, risk, reason)
    }

    pub fn escalated(stage: impl Into<String>, risk: RiskLevel, reason: impl Into<String>) -> Self {
        Self::new(stage, Verdict::Escalated, risk, reason)
    }

    pub fn with_recommendations<I, S>(mut self, recommendations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations = recommendations.into_iter().map(Into::into).collect();
        self
    }

    /// Copy with the risk raised to at least `floor`; risk is never lowered.
    pub(crate) fn with_risk_floor(&self, floor: RiskLevel) -> Self {
        let mut raised = self.clone();
        raised.risk = raised.risk.max(floor);
        raised
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk
    }

    /// Human-readable reason, safe to show to end users
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn is_approved(&self) -> bool {
        self.verdict == Verdict::Approved
    }

    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Blocked
    }

    pub fn is_escalated(&self) -> bool {
        self.verdict == Verdict::Escalated
    }
}

/// Phase of a request's lifecycle a stage runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Input,
    Tool,
    Output,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Input, Tier::Tool, Tier::Output];
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Input => write!(f, "input"),
            Tier::Tool => write!(f, "tool"),
            Tier::Output => write!(f, "output"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" | "med" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "input" => Ok(Tier::Input),
            "tool" | "tools" => Ok(Tier::Tool),
            "output" => Ok(Tier::Output),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Pipeline state machine
///
/// `Pending → RunningInput → RunningTool → RunningOutput → Approved | Blocked | Escalated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    RunningInput,
    RunningTool,
    RunningOutput,
    Approved,
    Blocked,
    /// Terminal until an external decision resumes or blocks the run
    Escalated,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Approved | PipelineState::Blocked | PipelineState::Escalated
        )
    }

    pub(crate) fn running(tier: Tier) -> Self {
        match tier {
            Tier::Input => PipelineState::RunningInput,
            Tier::Tool => PipelineState::RunningTool,
            Tier::Output => PipelineState::RunningOutput,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Pending => write!(f, "pending"),
            PipelineState::RunningInput => write!(f, "running_input"),
            PipelineState::RunningTool => write!(f, "running_tool"),
            PipelineState::RunningOutput => write!(f, "running_output"),
            PipelineState::Approved => write!(f, "approved"),
            PipelineState::Blocked => write!(f, "blocked"),
            PipelineState::Escalated => write!(f, "escalated"),
        }
    }
}

impl std::str::FromStr for PipelineState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approved" => Ok(PipelineState::Approved),
            "blocked" => Ok(PipelineState::Blocked),
            "escalated" => Ok(PipelineState::Escalated),
            other => Err(format!("not a terminal state: {}", other)),
        }
    }
}
