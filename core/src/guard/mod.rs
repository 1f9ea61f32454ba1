//! Layered request validation
//!
//! Requests pass an input tier, a tool tier and an output tier of ordered
//! [`Stage`]s. See [`pipeline`] for the tier rules and [`audited`] for the
//! audit wiring.

pub mod approval;
pub mod audited;
pub mod patterns;
pub mod pipeline;
pub mod stage;
pub mod tools;
pub mod types;

pub use approval::{ApprovalError, ApprovalOutcome, EscalationHook, StaticApproval};
pub use audited::AuditedPipeline;
pub use pipeline::{PipelineDecision, RecordedVerdict, Request, TierOutcome, ValidationPipeline};
pub use stage::{Check, Stage, StageInput};
pub use tools::{ToolCall, ToolRiskProfile};
pub use types::{PipelineState, RiskLevel, StageVerdict, Tier, Verdict};
