//! Human-approval hook for escalated runs

use super::pipeline::{PipelineDecision, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External decision on an escalated run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ApprovalOutcome {
    /// Resume the run at the output tier
    Granted,
    /// Finalize the run as blocked
    Denied { reason: Option<String> },
}

impl ApprovalOutcome {
    pub fn denied(reason: impl Into<String>) -> Self {
        ApprovalOutcome::Denied {
            reason: Some(reason.into()),
        }
    }
}

/// Approval capability error
#[derive(Error, Debug, Clone)]
#[error("approval error: {message}")]
pub struct ApprovalError {
    pub message: String,
}

impl ApprovalError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Resolves escalations, usually by asking a human.
///
/// An error is treated as a denial.
pub trait EscalationHook {
    fn review(
        &self,
        decision: &PipelineDecision,
        request: &Request,
    ) -> Result<ApprovalOutcome, ApprovalError>;
}

/// Hook that always answers the same way (tests, batch runs)
#[derive(Debug, Clone)]
pub struct StaticApproval(pub ApprovalOutcome);

impl StaticApproval {
    pub fn grant() -> Self {
        Self(ApprovalOutcome::Granted)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self(ApprovalOutcome::denied(reason))
    }
}

impl EscalationHook for StaticApproval {
    fn review(
        &self,
        _decision: &PipelineDecision,
        _request: &Request,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_error_display() {
        let err = ApprovalError::new("terminal closed");
        assert_eq!(err.to_string(), "approval error: terminal closed");
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_string(&ApprovalOutcome::denied("no budget")).unwrap();
        assert_eq!(json, r#"{"outcome":"denied","reason":"no budget"}"#);
        let back: ApprovalOutcome = serde_json::from_str(r#"{"outcome":"granted"}"#).unwrap();
        assert_eq!(back, ApprovalOutcome::Granted);
    }
}
