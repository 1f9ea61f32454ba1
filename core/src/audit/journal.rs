//! JSON-lines audit journal
//!
//! One record per line, appended under a lock and flushed before `record`
//! returns. `iterate` re-reads the file so it also sees records written by
//! earlier processes.

use super::{AuditFilter, AuditIter, AuditRecord, AuditSink};
use crate::error::{GuardError, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct JournalAuditSink {
    path: PathBuf,
    file: Mutex<File>,
    sync: bool,
}

impl JournalAuditSink {
    /// Open (or create) the journal at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(GuardError::audit_unavailable)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                GuardError::audit_unavailable(format!("cannot open {}: {}", path.display(), e))
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            sync: false,
        })
    }

    /// `data_dir/guardlab/audit.jsonl`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("guardlab").join("audit.jsonl"))
    }

    /// fsync after every append
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JournalAuditSink {
    fn record(&self, record: AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = self.file.lock();
        append(&mut *file, line.as_bytes(), self.sync).map_err(|e| {
            GuardError::audit_unavailable(format!("write to {} failed: {}", self.path.display(), e))
        })
    }

    fn iterate(&self, filter: &AuditFilter) -> Result<AuditIter> {
        // Hold the write lock so no half-written line is read
        let _guard = self.file.lock();
        let file = File::open(&self.path).map_err(GuardError::audit_unavailable)?;

        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(GuardError::audit_unavailable)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = number + 1,
                    error = %e,
                    "skipping unreadable audit line"
                ),
            }
        }
        Ok(AuditIter::new(records, filter.clone()))
    }
}

/// Append target that can be cut back to an earlier length
trait Truncate: Write {
    fn len(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl Truncate for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Write one whole line or nothing: a failed append is cut back off the file.
fn append<F: Truncate>(file: &mut F, bytes: &[u8], sync: bool) -> io::Result<()> {
    let len = file.len()?;
    let written = file
        .write_all(bytes)
        .and_then(|()| file.flush())
        .and_then(|()| if sync { file.sync() } else { Ok(()) });
    if let Err(e) = written {
        if let Err(rollback) = file.truncate(len) {
            warn!(error = %rollback, len, "could not roll back partial audit line");
        }
        return Err(e);
    }
    Ok(())
}

impl std::fmt::Debug for JournalAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalAuditSink")
            .field("path", &self.path)
            .field("sync", &self.sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{PipelineState, Request, ToolCall, ValidationPipeline};
    use std::time::Duration;
    use tempfile::tempdir;

    fn record_for(request: &Request) -> AuditRecord {
        let decision = ValidationPipeline::standard().run(request);
        AuditRecord::new(decision, request, Duration::from_micros(250))
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        let blocked = record_for(&Request::new("drop it").with_tool(ToolCall::new("database_drop")));
        let approved = record_for(&Request::new("Summarize the quarterly report"));
        {
            let sink = JournalAuditSink::open(&path).unwrap().with_sync(true);
            sink.record(blocked.clone()).unwrap();
            sink.record(approved.clone()).unwrap();
        }

        let sink = JournalAuditSink::open(&path).unwrap();
        let all: Vec<_> = sink.iterate(&AuditFilter::all()).unwrap().collect();
        assert_eq!(all, vec![blocked.clone(), approved]);

        let only_blocked: Vec<_> = sink
            .iterate(&AuditFilter::all().state(PipelineState::Blocked))
            .unwrap()
            .collect();
        assert_eq!(only_blocked, vec![blocked]);
    }

    #[test]
    fn test_skips_corrupt_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JournalAuditSink::open(&path).unwrap();
        sink.record(record_for(&Request::new("first entry"))).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n\n")
            .unwrap();
        sink.record(record_for(&Request::new("second entry"))).unwrap();

        assert_eq!(sink.iterate(&AuditFilter::all()).unwrap().count(), 2);
    }

    /// Accepts `budget` bytes, then fails every write
    struct ShortWriter {
        data: Vec<u8>,
        budget: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            let n = buf.len().min(self.budget);
            self.data.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Truncate for ShortWriter {
        fn len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_partial_append_is_rolled_back() {
        let mut writer = ShortWriter {
            data: b"{\"first\":1}\n".to_vec(),
            budget: 4,
        };
        let err = append(&mut writer, b"{\"second\":2}\n", false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(writer.data, b"{\"first\":1}\n".to_vec());

        writer.budget = usize::MAX;
        append(&mut writer, b"{\"third\":3}\n", false).unwrap();
        assert_eq!(writer.data, b"{\"first\":1}\n{\"third\":3}\n".to_vec());
    }

    #[test]
    fn test_truncate_keeps_appending_at_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JournalAuditSink::open(&path).unwrap();
        let kept = record_for(&Request::new("kept entry"));
        sink.record(kept.clone()).unwrap();
        {
            let mut file = sink.file.lock();
            let len = Truncate::len(&*file).unwrap();
            file.write_all(b"{\"id\":\"half").unwrap();
            file.truncate(len).unwrap();
        }
        let next = record_for(&Request::new("next entry"));
        sink.record(next.clone()).unwrap();

        let all: Vec<_> = sink.iterate(&AuditFilter::all()).unwrap().collect();
        assert_eq!(all, vec![kept, next]);
    }

    #[test]
    fn test_unwritable_location_is_unavailable() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as the journal file
        let err = JournalAuditSink::open(dir.path()).unwrap_err();
        assert!(matches!(err, GuardError::AuditUnavailable { .. }));
        assert!(err.is_fatal());
    }
}
