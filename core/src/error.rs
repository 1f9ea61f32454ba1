//! Structured error types for guardlab
//!
//! Construction-time parameter errors, audit persistence failures and the
//! ambient configuration/IO errors share one type. Stage check failures
//! have their own type because they are never propagated.

use thiserror::Error;

/// Primary error type for guardlab operations
#[derive(Error, Debug)]
pub enum GuardError {
    // =========================================================================
    // Construction Errors
    // =========================================================================
    /// Bad estimator or controller constant
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Denylist or PII pattern failed to compile
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    // =========================================================================
    // Pipeline / Audit Errors
    // =========================================================================
    /// Audit store cannot durably record a decision
    #[error("audit unavailable: {reason}")]
    AuditUnavailable { reason: String },

    /// Operation not valid for the decision's state (e.g. resuming an approved run)
    #[error("invalid state: {description}")]
    InvalidState { description: String },

    // =========================================================================
    // External Error Wrappers
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),
}

impl GuardError {
    pub(crate) fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn audit_unavailable(reason: impl std::fmt::Display) -> Self {
        Self::AuditUnavailable {
            reason: reason.to_string(),
        }
    }

    /// Whether the current run must stop.
    ///
    /// A decision that could not be audited must not proceed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuditUnavailable { .. } | Self::Io(_) | Self::InvalidState { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::AuditUnavailable { .. } => {
                "The request could not be recorded and was not processed.".to_string()
            }
            Self::InvalidParameter { name, .. } => {
                format!("Setting '{}' is out of range.", name)
            }
            Self::InvalidState { .. } => "This decision can no longer be changed.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<regex::Error> for GuardError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: String::new(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias using GuardError
pub type Result<T> = std::result::Result<T, GuardError>;

/// Failure raised by a single stage check.
///
/// Never reaches the caller: the pipeline turns it into a Blocked/High verdict.
#[derive(Error, Debug, Clone)]
#[error("stage '{stage}' failed: {message}")]
pub struct StageFailure {
    pub stage: String,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
