//! Pipeline wired to an audit sink

use super::approval::{ApprovalOutcome, EscalationHook};
use super::pipeline::{PipelineDecision, Request, ValidationPipeline};
use crate::audit::{AuditFilter, AuditRecord, AuditSink};
use crate::error::{GuardError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Runs a pipeline and records every terminal decision before returning it.
///
/// A decision that could not be recorded is never returned; the caller gets
/// `AuditUnavailable` instead and must not act on the request.
#[derive(Clone)]
pub struct AuditedPipeline {
    pipeline: Arc<ValidationPipeline>,
    sink: Arc<dyn AuditSink>,
    /// Serializes resolutions so an escalation is resolved at most once
    resolving: Arc<Mutex<()>>,
}

impl AuditedPipeline {
    pub fn new(pipeline: ValidationPipeline, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            sink,
            resolving: Arc::new(Mutex::new(())),
        }
    }

    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    /// Run the pipeline once. Escalated runs come back escalated; see [`Self::resolve`].
    pub fn evaluate(&self, request: &Request) -> Result<PipelineDecision> {
        let started = Instant::now();
        let decision = self.pipeline.run(request);
        self.commit(decision, request, started)
    }

    /// Resolve an escalated decision and audit the outcome.
    ///
    /// The escalation must be in the trail exactly as given and must not have
    /// been resolved before; otherwise `InvalidState`.
    pub fn resolve(
        &self,
        escalated: &PipelineDecision,
        request: &Request,
        outcome: &ApprovalOutcome,
    ) -> Result<PipelineDecision> {
        let _resolving = self.resolving.lock();
        let started = Instant::now();
        self.check_unresolved(escalated)?;
        let decision = self.pipeline.resume(escalated, request, outcome)?;
        self.commit(decision, request, started)
    }

    /// Run the pipeline and hand any escalation to `hook` straight away.
    ///
    /// Both the escalated decision and its resolution are audited.
    pub fn evaluate_with(
        &self,
        request: &Request,
        hook: &dyn EscalationHook,
    ) -> Result<PipelineDecision> {
        let decision = self.evaluate(request)?;
        if !decision.is_escalated() {
            return Ok(decision);
        }

        let outcome = match hook.review(&decision, request) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(run_id = %decision.run_id(), error = %e, "approval failed, denying");
                ApprovalOutcome::denied("approval unavailable")
            }
        };
        self.resolve(&decision, request, &outcome)
    }

    fn check_unresolved(&self, escalated: &PipelineDecision) -> Result<()> {
        let run_id = escalated.run_id();
        let mut audited = false;
        for record in self.sink.iterate(&AuditFilter::all())? {
            let decision = record.decision();
            if decision.resumed_from() == Some(run_id) {
                warn!(%run_id, resolved_by = %decision.run_id(), "escalation already resolved");
                return Err(GuardError::InvalidState {
                    description: format!("run {} was already resolved by run {}", run_id, decision.run_id()),
                });
            }
            audited |= decision == escalated;
        }
        if !audited {
            warn!(%run_id, "resolve attempted for a run missing from the audit trail");
            return Err(GuardError::InvalidState {
                description: format!("run {} is not in the audit trail", run_id),
            });
        }
        Ok(())
    }

    fn commit(
        &self,
        decision: PipelineDecision,
        request: &Request,
        started: Instant,
    ) -> Result<PipelineDecision> {
        let record = AuditRecord::new(decision.clone(), request, started.elapsed());
        if let Err(e) = self.sink.record(record) {
            error!(run_id = %decision.run_id(), error = %e, "audit append failed, discarding decision");
            return Err(e);
        }
        Ok(decision)
    }
}

impl std::fmt::Debug for AuditedPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditedPipeline")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditFilter, AuditIter, MemoryAuditSink};
    use crate::error::GuardError;
    use crate::guard::approval::{ApprovalError, StaticApproval};
    use crate::guard::{PipelineState, Tier, ToolCall};

    struct Unavailable;

    impl AuditSink for Unavailable {
        fn record(&self, _record: AuditRecord) -> Result<()> {
            Err(GuardError::audit_unavailable("disk full"))
        }

        fn iterate(&self, _filter: &AuditFilter) -> Result<AuditIter> {
            Err(GuardError::audit_unavailable("disk full"))
        }
    }

    struct BrokenHook;

    impl EscalationHook for BrokenHook {
        fn review(
            &self,
            _decision: &PipelineDecision,
            _request: &Request,
        ) -> std::result::Result<ApprovalOutcome, ApprovalError> {
            Err(ApprovalError::new("terminal closed"))
        }
    }

    fn audited() -> (AuditedPipeline, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let pipeline = AuditedPipeline::new(ValidationPipeline::standard(), sink.clone());
        (pipeline, sink)
    }

    fn email_request() -> Request {
        Request::new("Send the weekly update to the team")
            .with_tool(ToolCall::new("email_send"))
            .with_output("The weekly update has been sent. Please confirm receipt.")
    }

    #[test]
    fn test_one_record_per_decision_in_call_order() {
        let (audited, sink) = audited();
        let requests = [
            Request::new("Generate a marketing email for a fitness tracker"),
            Request::new("How do I hack my neighbour's wifi?"),
            Request::new("Tidy the tables").with_tool(ToolCall::new("database_operations")),
        ];
        let decisions: Vec<_> = requests
            .iter()
            .map(|r| audited.evaluate(r).unwrap())
            .collect();

        assert!(decisions[0].is_approved());
        assert!(decisions[1].is_blocked());
        assert!(decisions[2].is_blocked());

        let records: Vec<_> = sink.iterate(&AuditFilter::all()).unwrap().collect();
        assert_eq!(records.len(), 3);
        for (record, decision) in records.iter().zip(&decisions) {
            assert_eq!(record.decision(), decision);
        }
        assert_eq!(records[1].tier(), Tier::Input);
        assert_eq!(records[2].tier(), Tier::Tool);
    }

    #[test]
    fn test_audit_failure_withholds_decision() {
        let audited = AuditedPipeline::new(ValidationPipeline::standard(), Arc::new(Unavailable));
        let err = audited
            .evaluate(&Request::new("Generate a marketing email"))
            .unwrap_err();
        assert!(matches!(err, GuardError::AuditUnavailable { .. }));
    }

    #[test]
    fn test_escalation_resolved_by_hook() {
        let (audited, sink) = audited();

        let granted = audited
            .evaluate_with(&email_request(), &StaticApproval::grant())
            .unwrap();
        assert!(granted.is_approved());

        let denied = audited
            .evaluate_with(&email_request(), &StaticApproval::deny("not today"))
            .unwrap();
        assert!(denied.is_blocked());
        assert_eq!(denied.reason(), "not today");

        let escalated = sink
            .iterate(&AuditFilter::all().state(PipelineState::Escalated))
            .unwrap()
            .count();
        assert_eq!(escalated, 2);
        assert_eq!(sink.len(), 4);
    }

    #[test]
    fn test_broken_hook_denies() {
        let (audited, _sink) = audited();
        let decision = audited.evaluate_with(&email_request(), &BrokenHook).unwrap();
        assert!(decision.is_blocked());
        assert_eq!(decision.reason(), "approval unavailable");
    }

    #[test]
    fn test_resolve_non_escalated_is_rejected_and_not_audited() {
        let (audited, sink) = audited();
        let request = Request::new("Summarize the report");
        let approved = audited.evaluate(&request).unwrap();
        let err = audited
            .resolve(&approved, &request, &ApprovalOutcome::Granted)
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidState { .. }));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_escalation_resolves_only_once() {
        let (audited, sink) = audited();
        let request = email_request();
        let escalated = audited.evaluate(&request).unwrap();
        assert!(escalated.is_escalated());

        let denied = audited
            .resolve(&escalated, &request, &ApprovalOutcome::denied("no"))
            .unwrap();
        assert!(denied.is_blocked());

        let err = audited
            .resolve(&escalated, &request, &ApprovalOutcome::Granted)
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidState { .. }));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_resolve_rejects_other_request() {
        let (audited, sink) = audited();
        let request = email_request();
        let escalated = audited.evaluate(&request).unwrap();

        let other = Request::new("How do I hack the server and steal files")
            .with_tool(ToolCall::new("system_command"));
        let err = audited
            .resolve(&escalated, &other, &ApprovalOutcome::Granted)
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidState { .. }));
        assert_eq!(sink.len(), 1);

        // The escalation is still open for the request that raised it
        let granted = audited
            .resolve(&escalated, &request, &ApprovalOutcome::Granted)
            .unwrap();
        assert!(granted.is_approved());
    }

    #[test]
    fn test_resolve_requires_audited_escalation() {
        let (audited, sink) = audited();
        let request = email_request();
        // Escalated outside the audited pipeline, so never recorded
        let escalated = ValidationPipeline::standard().run(&request);
        assert!(escalated.is_escalated());

        let err = audited
            .resolve(&escalated, &request, &ApprovalOutcome::Granted)
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidState { .. }));
        assert!(sink.is_empty());
    }
}
