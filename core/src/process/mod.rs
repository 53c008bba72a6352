//! Managed process records and the shared process table

#[cfg(unix)]
pub mod unix;

use sitter_schema::ProcessInfo;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// One managed child process
///
/// Created by the launcher immediately after a successful spawn and
/// destroyed only by the reaper (or the shutdown sequencer) once the OS
/// has confirmed the pid exited. All mutation happens under the
/// supervisor's table lock.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    /// OS process id; unique among live records
    pub pid: u32,
    /// Program path
    pub program: String,
    /// Argument vector, excluding the program name; immutable after creation
    pub args: Vec<String>,
    /// Stdout redirection target the process was launched with
    pub stdout_file: Option<PathBuf>,
    /// Remaining automatic-restart count; 0 means "do not restart"
    pub retries_left: u32,
    /// Launch time, seconds since the Unix epoch
    pub started_at: u64,
}

impl ProcessRecord {
    /// Build a record for a process spawned just now
    pub fn new(
        pid: u32,
        program: String,
        args: Vec<String>,
        stdout_file: Option<PathBuf>,
        retries_left: u32,
    ) -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            pid,
            program,
            args,
            stdout_file,
            retries_left,
            started_at,
        }
    }

    /// Snapshot view of this record for list responses
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            program: self.program.clone(),
            args: self.args.clone(),
            started_at: self.started_at,
            retries_left: self.retries_left,
        }
    }
}

/// Insertion-ordered registry of currently managed processes
///
/// The table itself is not synchronized; the supervisor wraps it in a
/// mutex and every read or write happens with that lock held. Insertion
/// order is preserved so shutdown walks processes deterministically.
#[derive(Debug, Default)]
pub struct ProcessTable {
    records: Vec<ProcessRecord>,
}

impl ProcessTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the end of the table
    ///
    /// A pid can only reappear once its previous record has been
    /// reaped, so two live records never share one.
    pub fn insert(&mut self, record: ProcessRecord) {
        debug_assert!(
            self.find_by_pid(record.pid).is_none(),
            "duplicate live pid {}",
            record.pid
        );
        self.records.push(record);
    }

    /// Find the live record with the given pid
    pub fn find_by_pid(&self, pid: u32) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.pid == pid)
    }

    /// Find the live record with the given pid, mutably
    pub fn find_by_pid_mut(&mut self, pid: u32) -> Option<&mut ProcessRecord> {
        self.records.iter_mut().find(|r| r.pid == pid)
    }

    /// Unlink and return the record with the given pid
    ///
    /// Preserves the relative order of the remaining records whether
    /// the removed element was at the head, the tail, or the interior.
    pub fn remove(&mut self, pid: u32) -> Option<ProcessRecord> {
        let index = self.records.iter().position(|r| r.pid == pid)?;
        Some(self.records.remove(index))
    }

    /// Ordered traversal of the live records
    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.iter()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every record for a list response
    pub fn snapshot(&self) -> Vec<ProcessInfo> {
        self.records.iter().map(ProcessRecord::info).collect()
    }

    /// Drop every record; used by the shutdown sequencer after all
    /// children have been waited on
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
