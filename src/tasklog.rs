//! Append-only JSONL task log
//!
//! One file per run, one JSON record per line. The log is only ever
//! appended to while a run is live: an iteration record after every cycle
//! and exactly one final record at the terminal transition. Readers
//! tolerate a truncated last line so a crash mid-write never poisons the
//! history.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::domain::{IterationSignal, LoopStatus};
use crate::error::Result;
use crate::id::now_ms;
use crate::state::StateSnapshot;
use crate::stop::StopKind;

/// One line of the task log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskLogRecord {
    /// Outcome of one completed iteration
    Iteration {
        run_id: String,
        signal: IterationSignal,
        snapshot: StateSnapshot,
        at: u64,
    },
    /// Terminal record, written exactly once per run
    Final {
        run_id: String,
        status: LoopStatus,
        stop_kind: StopKind,
        reason: String,
        snapshot: StateSnapshot,
        at: u64,
    },
}

impl TaskLogRecord {
    /// Build an iteration record stamped with the current time
    pub fn iteration(run_id: &str, signal: &IterationSignal, snapshot: StateSnapshot) -> Self {
        Self::Iteration {
            run_id: run_id.to_string(),
            signal: signal.clone(),
            snapshot,
            at: now_ms(),
        }
    }

    /// Build the terminal record stamped with the current time
    pub fn terminal(
        run_id: &str,
        status: LoopStatus,
        stop_kind: StopKind,
        reason: &str,
        snapshot: StateSnapshot,
    ) -> Self {
        Self::Final {
            run_id: run_id.to_string(),
            status,
            stop_kind,
            reason: reason.to_string(),
            snapshot,
            at: now_ms(),
        }
    }
}

/// Handle on one run's task log file
#[derive(Debug)]
pub struct TaskLog {
    path: PathBuf,
}

impl TaskLog {
    /// Open (or create the parent of) the log at `path`. The file itself
    /// is created on first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line
    pub fn append(&self, record: &TaskLogRecord) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        debug!("appended task log record to {}", self.path.display());
        Ok(())
    }

    /// Read every parseable record. Blank and malformed lines are skipped
    /// with a warning rather than failing the whole read.
    pub fn read_all(&self) -> Result<Vec<TaskLogRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping malformed task log line {} in {}: {}", idx + 1, self.path.display(), e),
            }
        }
        Ok(records)
    }

    /// The final record, if the run has reached a terminal status
    pub fn final_record(&self) -> Result<Option<TaskLogRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .rev()
            .find(|r| matches!(r, TaskLogRecord::Final { .. })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LoopState;
    use tempfile::TempDir;

    fn log_in(temp: &TempDir) -> TaskLog {
        TaskLog::open(temp.path().join("tasks").join("run-1.jsonl")).unwrap()
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let temp = TempDir::new().unwrap();
        let log = log_in(&temp);
        assert!(log.path().parent().unwrap().is_dir());
        // File appears only on first append
        assert!(!log.path().exists());
    }

    #[test]
    fn test_append_and_read_iterations() {
        let temp = TempDir::new().unwrap();
        let log = log_in(&temp);

        let mut state = LoopState::new();
        for i in 0..3 {
            let signal = IterationSignal::success().with_cost(0.1 * (i + 1) as f64);
            state.apply(&signal);
            log.append(&TaskLogRecord::iteration("run-1", &signal, state.snapshot()))
                .unwrap();
        }

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 3);
        match &records[2] {
            TaskLogRecord::Iteration { run_id, snapshot, .. } => {
                assert_eq!(run_id, "run-1");
                assert_eq!(snapshot.iteration, 3);
            }
            other => panic!("expected iteration record, got {:?}", other),
        }
    }

    #[test]
    fn test_final_record_found() {
        let temp = TempDir::new().unwrap();
        let log = log_in(&temp);
        let state = LoopState::new();

        log.append(&TaskLogRecord::iteration(
            "run-1",
            &IterationSignal::success(),
            state.snapshot(),
        ))
        .unwrap();
        log.append(&TaskLogRecord::terminal(
            "run-1",
            LoopStatus::Completed,
            StopKind::Completion,
            "completion confirmed 1 time(s) (required 1)",
            state.snapshot(),
        ))
        .unwrap();

        let last = log.final_record().unwrap().unwrap();
        match last {
            TaskLogRecord::Final { status, stop_kind, .. } => {
                assert_eq!(status, LoopStatus::Completed);
                assert_eq!(stop_kind, StopKind::Completion);
            }
            other => panic!("expected final record, got {:?}", other),
        }
    }

    #[test]
    fn test_final_record_none_while_live() {
        let temp = TempDir::new().unwrap();
        let log = log_in(&temp);
        log.append(&TaskLogRecord::iteration(
            "run-1",
            &IterationSignal::success(),
            LoopState::new().snapshot(),
        ))
        .unwrap();
        assert!(log.final_record().unwrap().is_none());
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let log = log_in(&temp);
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp = TempDir::new().unwrap();
        let log = log_in(&temp);

        log.append(&TaskLogRecord::iteration(
            "run-1",
            &IterationSignal::success(),
            LoopState::new().snapshot(),
        ))
        .unwrap();
        // Simulate a crash mid-write
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "{{\"kind\":\"iter").unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasks").join("run-2.jsonl");

        {
            let log = TaskLog::open(&path).unwrap();
            log.append(&TaskLogRecord::iteration(
                "run-2",
                &IterationSignal::failure("flaky"),
                LoopState::new().snapshot(),
            ))
            .unwrap();
        }

        let log = TaskLog::open(&path).unwrap();
        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        match &records[0] {
            TaskLogRecord::Iteration { signal, .. } => {
                assert_eq!(signal.failure_reason.as_deref(), Some("flaky"));
            }
            other => panic!("expected iteration record, got {:?}", other),
        }
    }
}
