pub mod audit;
pub mod config;
pub mod error;
pub mod estimator;
pub mod guard;
pub mod output;

// Re-exports for convenience
pub use audit::{AuditFilter, AuditRecord, AuditSink, InputDigest, JournalAuditSink, MemoryAuditSink};
pub use config::Config;
pub use error::{GuardError, Result, StageFailure};
pub use estimator::{Action, EstimatorConfig, PreferenceEstimator, StaticThermostat, Thermostat};
pub use guard::{
    ApprovalOutcome, AuditedPipeline, EscalationHook, PipelineDecision, PipelineState, Request,
    RiskLevel, Stage, StageVerdict, Tier, ToolCall, ValidationPipeline, Verdict,
};
