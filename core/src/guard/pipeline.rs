//! Three-tier validation pipeline
//!
//! Tiers run in strict order (input, tool, output). Inside a tier the first
//! Blocked verdict ends the tier; the first Escalated verdict is kept and
//! the tier carries on, so a later Blocked verdict still wins. A blocked
//! tier ends the run. An escalated tool tier stops the run at `Escalated`
//! until [`ValidationPipeline::resume`] is called with an external decision.

use super::approval::ApprovalOutcome;
use super::stage::{Stage, StageInput};
use super::tools::{ToolCall, ToolRiskProfile};
use super::types::{PipelineState, RiskLevel, StageVerdict, Tier, Verdict};
use crate::error::{GuardError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name used for verdicts synthesized by the pipeline itself
pub const PIPELINE_STAGE: &str = "pipeline";
/// Name used for verdicts recorded from an external reviewer
pub const REVIEW_STAGE: &str = "human review";
/// Hex characters of the SHA-256 kept in a request fingerprint
pub const FINGERPRINT_LEN: usize = 16;

/// Everything a run looks at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// User input, checked by the input tier
    pub input: String,
    /// Requested tool calls, checked by the tool tier one by one
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Generated output, checked by the output tier
    #[serde(default)]
    pub output: Option<String>,
}

impl Request {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_tool(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Truncated SHA-256 over input, tool calls and output
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.input.as_bytes());
        for call in &self.tool_calls {
            hasher.update([0u8]);
            hasher.update(call.describe().as_bytes());
        }
        if let Some(output) = &self.output {
            hasher.update([1u8]);
            hasher.update(output.as_bytes());
        }
        let mut fingerprint = hex::encode(hasher.finalize());
        fingerprint.truncate(FINGERPRINT_LEN);
        fingerprint
    }
}

/// A verdict together with the tier that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedVerdict {
    pub tier: Tier,
    pub verdict: StageVerdict,
}

/// Result of one tier
#[derive(Debug, Clone)]
pub struct TierOutcome {
    pub tier: Tier,
    /// Every verdict produced, in evaluation order
    pub verdicts: Vec<StageVerdict>,
    winner: Option<usize>,
}

impl TierOutcome {
    /// First Blocked verdict, else first Escalated verdict, else `None` (approved)
    pub fn result(&self) -> Option<&StageVerdict> {
        self.winner.map(|idx| &self.verdicts[idx])
    }

    pub fn verdict(&self) -> Verdict {
        self.result().map_or(Verdict::Approved, StageVerdict::verdict)
    }
}

/// Aggregate result of one run. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDecision {
    run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resumed_from: Option<Uuid>,
    /// Fingerprint of the request the run evaluated
    #[serde(default)]
    request: String,
    state: PipelineState,
    /// Tier that blocked or escalated; `None` when approved
    halted_at: Option<Tier>,
    terminal: StageVerdict,
    verdicts: Vec<RecordedVerdict>,
}

impl PipelineDecision {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run this one resumed, if it is the resolution of an escalation
    pub fn resumed_from(&self) -> Option<Uuid> {
        self.resumed_from
    }

    /// See [`Request::fingerprint`]
    pub fn request_fingerprint(&self) -> &str {
        &self.request
    }

    /// Terminal state: `Approved`, `Blocked` or `Escalated`
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn halted_at(&self) -> Option<Tier> {
        self.halted_at
    }

    /// Tier the run ended in
    pub fn final_tier(&self) -> Tier {
        self.halted_at.unwrap_or(Tier::Output)
    }

    pub fn terminal(&self) -> &StageVerdict {
        &self.terminal
    }

    pub fn verdicts(&self) -> &[RecordedVerdict] {
        &self.verdicts
    }

    pub fn reason(&self) -> &str {
        self.terminal.reason()
    }

    pub fn risk(&self) -> RiskLevel {
        self.terminal.risk()
    }

    pub fn is_approved(&self) -> bool {
        self.state == PipelineState::Approved
    }

    pub fn is_blocked(&self) -> bool {
        self.state == PipelineState::Blocked
    }

    pub fn is_escalated(&self) -> bool {
        self.state == PipelineState::Escalated
    }

    /// Verdicts produced by one tier
    pub fn tier_verdicts(&self, tier: Tier) -> impl Iterator<Item = &StageVerdict> {
        self.verdicts
            .iter()
            .filter(move |recorded| recorded.tier == tier)
            .map(|recorded| &recorded.verdict)
    }
}

/// Ordered stages for the three tiers. Configuration is fixed after construction.
#[derive(Debug, Clone, Default)]
pub struct ValidationPipeline {
    input: Vec<Stage>,
    tool: Vec<Stage>,
    output: Vec<Stage>,
}

impl ValidationPipeline {
    pub fn new(input: Vec<Stage>, tool: Vec<Stage>, output: Vec<Stage>) -> Self {
        Self {
            input,
            tool,
            output,
        }
    }

    /// Input: relevance, safety filter, PII. Tool: risk table. Output: brand,
    /// content safety, quality.
    pub fn standard() -> Self {
        Self {
            input: vec![
                Stage::relevance(["weather", "sports", "cooking", "random"]),
                Stage::safety_filter(),
                Stage::pii(),
            ],
            tool: vec![Stage::tool_risk(ToolRiskProfile::default())],
            output: vec![
                Stage::brand_alignment(["cheap", "sketchy", "unreliable"], 10),
                Stage::content_safety(),
                Stage::quality(20),
            ],
        }
    }

    pub fn with_stage(mut self, tier: Tier, stage: Stage) -> Self {
        match tier {
            Tier::Input => self.input.push(stage),
            Tier::Tool => self.tool.push(stage),
            Tier::Output => self.output.push(stage),
        }
        self
    }

    pub fn stages(&self, tier: Tier) -> &[Stage] {
        match tier {
            Tier::Input => &self.input,
            Tier::Tool => &self.tool,
            Tier::Output => &self.output,
        }
    }

    /// Run all three tiers over one request.
    pub fn run(&self, request: &Request) -> PipelineDecision {
        let run = Run::new(Uuid::new_v4(), None, request.fingerprint());
        self.run_tiers(run, &Tier::ALL, request)
    }

    /// Resolve an escalated run with an external decision.
    ///
    /// `Granted` resumes at the output tier; `Denied` finalizes as Blocked.
    /// The returned decision carries the earlier verdicts plus the reviewer's.
    /// `request` must be the request the escalated run evaluated.
    pub fn resume(
        &self,
        escalated: &PipelineDecision,
        request: &Request,
        outcome: &ApprovalOutcome,
    ) -> Result<PipelineDecision> {
        if !escalated.is_escalated() {
            return Err(GuardError::InvalidState {
                description: format!(
                    "run {} is {}, only escalated runs can be resumed",
                    escalated.run_id, escalated.state
                ),
            });
        }
        let fingerprint = request.fingerprint();
        if fingerprint != escalated.request {
            warn!(run_id = %escalated.run_id, "resume attempted with a different request");
            return Err(GuardError::InvalidState {
                description: format!(
                    "run {} evaluated request {}, not {}",
                    escalated.run_id, escalated.request, fingerprint
                ),
            });
        }

        let mut run = Run::new(Uuid::new_v4(), Some(escalated.run_id), fingerprint);
        for recorded in &escalated.verdicts {
            run.push(recorded.tier, recorded.verdict.clone());
        }
        let tier = escalated.final_tier();

        match outcome {
            ApprovalOutcome::Granted => {
                run.push(tier, StageVerdict::approved(REVIEW_STAGE, "Approved by reviewer"));
                Ok(self.run_tiers(run, &[Tier::Output], request))
            }
            ApprovalOutcome::Denied { reason } => {
                let reason = reason.as_deref().unwrap_or("Denied by reviewer");
                let denial = StageVerdict::blocked(REVIEW_STAGE, escalated.risk(), reason);
                run.push(tier, denial.clone());
                Ok(run.finish(PipelineState::Blocked, Some(tier), &denial))
            }
        }
    }

    /// Run one tier in isolation.
    pub fn run_tier(&self, tier: Tier, request: &Request) -> TierOutcome {
        let stages = self.stages(tier);
        let inputs: Vec<StageInput<'_>> = match tier {
            Tier::Input => vec![StageInput::Text(&request.input)],
            Tier::Tool => request.tool_calls.iter().map(StageInput::Tool).collect(),
            Tier::Output => vec![StageInput::Text(request.output.as_deref().unwrap_or(""))],
        };

        let mut verdicts = Vec::new();
        let mut escalation = None;
        for input in &inputs {
            for stage in stages {
                let verdict = stage.evaluate(input);
                debug!(
                    %tier,
                    stage = verdict.stage(),
                    verdict = %verdict.verdict(),
                    risk = %verdict.risk(),
                    "stage evaluated"
                );
                let idx = verdicts.len();
                let blocked = verdict.is_blocked();
                if verdict.is_escalated() && escalation.is_none() {
                    escalation = Some(idx);
                }
                verdicts.push(verdict);
                if blocked {
                    return TierOutcome {
                        tier,
                        verdicts,
                        winner: Some(idx),
                    };
                }
            }
        }

        TierOutcome {
            tier,
            verdicts,
            winner: escalation,
        }
    }

    fn run_tiers(&self, mut run: Run, tiers: &[Tier], request: &Request) -> PipelineDecision {
        for &tier in tiers {
            run.enter(PipelineState::running(tier));
            let outcome = self.run_tier(tier, request);
            let winner = outcome.result().cloned();
            for verdict in outcome.verdicts {
                run.push(tier, verdict);
            }

            match winner {
                Some(verdict) if verdict.is_blocked() => {
                    return run.finish(PipelineState::Blocked, Some(tier), &verdict);
                }
                // Only the tool tier waits for a human; elsewhere the escalation is kept
                // in the trail and raises the run's risk.
                Some(verdict) if tier == Tier::Tool => {
                    return run.finish(PipelineState::Escalated, Some(tier), &verdict);
                }
                _ => {}
            }
        }

        let approved = StageVerdict::approved(PIPELINE_STAGE, "All safety checks passed");
        run.finish(PipelineState::Approved, None, &approved)
    }
}

/// In-flight state of one run
struct Run {
    run_id: Uuid,
    resumed_from: Option<Uuid>,
    request: String,
    state: PipelineState,
    verdicts: Vec<RecordedVerdict>,
    max_risk: RiskLevel,
}

impl Run {
    fn new(run_id: Uuid, resumed_from: Option<Uuid>, request: String) -> Self {
        Self {
            run_id,
            resumed_from,
            request,
            state: PipelineState::Pending,
            verdicts: Vec::new(),
            max_risk: RiskLevel::Low,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug!(run_id = %self.run_id, from = %self.state, to = %next, "pipeline transition");
        self.state = next;
    }

    fn push(&mut self, tier: Tier, verdict: StageVerdict) {
        self.max_risk = self.max_risk.max(verdict.risk());
        self.verdicts.push(RecordedVerdict { tier, verdict });
    }

    fn finish(
        mut self,
        state: PipelineState,
        halted_at: Option<Tier>,
        terminal: &StageVerdict,
    ) -> PipelineDecision {
        self.enter(state);
        let terminal = terminal.with_risk_floor(self.max_risk);
        info!(
            run_id = %self.run_id,
            state = %state,
            risk = %terminal.risk(),
            stage = terminal.stage(),
            verdicts = self.verdicts.len(),
            "pipeline decision"
        );
        PipelineDecision {
            run_id: self.run_id,
            resumed_from: self.resumed_from,
            request: self.request,
            state,
            halted_at,
            terminal,
            verdicts: self.verdicts,
        }
    }
}
