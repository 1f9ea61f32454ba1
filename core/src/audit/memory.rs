//! In-process audit sink

use super::{AuditFilter, AuditIter, AuditRecord, AuditSink};
use crate::error::Result;
use parking_lot::Mutex;

/// Audit records held in memory, lost on exit
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    fn iterate(&self, filter: &AuditFilter) -> Result<AuditIter> {
        let snapshot = self.records.lock().clone();
        Ok(AuditIter::new(snapshot, filter.clone()))
    }
}
