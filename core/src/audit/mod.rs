//! Append-only audit trail of pipeline decisions
//!
//! Every terminal decision is recorded exactly once. Records hold a digest of
//! the request (sizes, counts, tool names and a fingerprint), never the raw
//! text, so the trail can be retained without leaking user content.

pub mod journal;
pub mod memory;

pub use journal::JournalAuditSink;
pub use memory::MemoryAuditSink;

use crate::error::Result;
use crate::guard::{PipelineDecision, PipelineState, Request, RiskLevel, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Content-free summary of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDigest {
    pub input_chars: usize,
    pub tool_calls: usize,
    pub tool_names: Vec<String>,
    pub output_chars: Option<usize>,
    /// Truncated SHA-256 of the full request, for correlating retries
    pub fingerprint: String,
}

impl InputDigest {
    pub fn of(request: &Request) -> Self {
        Self {
            input_chars: request.input.chars().count(),
            tool_calls: request.tool_calls.len(),
            tool_names: request.tool_calls.iter().map(|c| c.name.clone()).collect(),
            output_chars: request.output.as_ref().map(|o| o.chars().count()),
            fingerprint: request.fingerprint(),
        }
    }
}

/// One audited decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    id: Uuid,
    timestamp: DateTime<Utc>,
    tier: Tier,
    digest: InputDigest,
    decision: PipelineDecision,
    elapsed: Duration,
}

impl AuditRecord {
    pub fn new(decision: PipelineDecision, request: &Request, elapsed: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            tier: decision.final_tier(),
            digest: InputDigest::of(request),
            decision,
            elapsed,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Tier the decision was made in
    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn digest(&self) -> &InputDigest {
        &self.digest
    }

    pub fn decision(&self) -> &PipelineDecision {
        &self.decision
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Selects records from a sink. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub tier: Option<Tier>,
    pub state: Option<PipelineState>,
    pub min_risk: Option<RiskLevel>,
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn state(mut self, state: PipelineState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn min_risk(mut self, risk: RiskLevel) -> Self {
        self.min_risk = Some(risk);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.tier.map_or(true, |t| record.tier == t)
            && self.state.map_or(true, |s| record.decision.state() == s)
            && self.min_risk.map_or(true, |r| record.decision.risk() >= r)
            && self.since.map_or(true, |since| record.timestamp >= since)
    }
}

/// Snapshot of a sink, filtered as it is consumed
pub struct AuditIter {
    records: std::vec::IntoIter<AuditRecord>,
    filter: AuditFilter,
}

impl AuditIter {
    pub(crate) fn new(records: Vec<AuditRecord>, filter: AuditFilter) -> Self {
        Self {
            records: records.into_iter(),
            filter,
        }
    }
}

impl Iterator for AuditIter {
    type Item = AuditRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = &self.filter;
        self.records.find(|record| filter.matches(record))
    }
}

/// Append-only store of audit records, shared by concurrent pipelines.
pub trait AuditSink: Send + Sync {
    /// Append one record. Fails with `AuditUnavailable` if it cannot be stored.
    fn record(&self, record: AuditRecord) -> Result<()>;

    /// Records in insertion order, as of the time of the call
    fn iterate(&self, filter: &AuditFilter) -> Result<AuditIter>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::pipeline::FINGERPRINT_LEN;
    use crate::guard::{ToolCall, ValidationPipeline};

    #[test]
    fn test_digest_has_no_raw_content() {
        let request = Request::new("My SSN is 123-45-6789")
            .with_tool(ToolCall::new("web_search"))
            .with_output("Noted.");
        let digest = InputDigest::of(&request);
        let json = serde_json::to_string(&digest).unwrap();

        assert!(!json.contains("123-45-6789"));
        assert_eq!(digest.input_chars, 21);
        assert_eq!(digest.tool_names, vec!["web_search".to_string()]);
        assert_eq!(digest.output_chars, Some(6));
        assert_eq!(digest.fingerprint.len(), FINGERPRINT_LEN);
        assert_eq!(InputDigest::of(&request).fingerprint, digest.fingerprint);
        assert_ne!(InputDigest::of(&Request::new("other")).fingerprint, digest.fingerprint);
    }

    #[test]
    fn test_filter_matching() {
        let pipeline = ValidationPipeline::standard();
        let blocked_req = Request::new("x").with_tool(ToolCall::new("system_command"));
        let blocked = AuditRecord::new(pipeline.run(&blocked_req), &blocked_req, Duration::ZERO);
        let ok_req = Request::new("Summarize the report");
        let approved = AuditRecord::new(pipeline.run(&ok_req), &ok_req, Duration::ZERO);

        assert!(AuditFilter::all().matches(&blocked));
        assert!(AuditFilter::all().tier(Tier::Tool).matches(&blocked));
        assert!(!AuditFilter::all().tier(Tier::Tool).matches(&approved));
        assert!(AuditFilter::all().state(PipelineState::Approved).matches(&approved));
        assert!(AuditFilter::all().min_risk(RiskLevel::High).matches(&blocked));
        assert!(!AuditFilter::all().min_risk(RiskLevel::Medium).matches(&approved));
        let later = Utc::now() + chrono::Duration::hours(1);
        assert!(!AuditFilter::all().since(later).matches(&approved));
    }
}
