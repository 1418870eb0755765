// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event log
//!
//! One JSON object per line, written by exactly one writer (the engine) and
//! read by many (state replay, `status`, `monitor`, `report`). Every append
//! is fsynced before returning; there is no group commit, so the last
//! acknowledged event is always durable.
//!
//! Crash semantics: a torn trailing record (truncated or otherwise
//! unparseable line) is detected on scan and dropped. Everything before it
//! is authoritative.

use aurelia_core::{CandidateId, Event, EventKind};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from event log operations
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of scanning an event log file.
#[derive(Debug, Default)]
pub struct LogScan {
    /// Events in `seq` order, up to the first unparseable line.
    pub events: Vec<Event>,
    /// Number of non-empty lines dropped at the tail.
    pub dropped: usize,
}

impl LogScan {
    /// Highest sequence number seen, or 0 for an empty log.
    pub fn max_seq(&self) -> u64 {
        self.events.last().map(|e| e.seq).unwrap_or(0)
    }
}

/// Read all events from a log file.
///
/// Missing file reads as an empty log. Scanning stops at the first line
/// that fails to parse; the remainder is reported as dropped.
pub fn read_events(path: &Path) -> Result<LogScan, LogError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogScan::default()),
        Err(e) => return Err(e.into()),
    };

    let mut scan = LogScan::default();
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut torn = false;

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                torn = true;
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if torn {
            scan.dropped += 1;
            continue;
        }

        match serde_json::from_str::<Event>(trimmed) {
            Ok(event) => scan.events.push(event),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    seq_before = scan.max_seq(),
                    error = %e,
                    "torn or corrupt event record, dropping tail",
                );
                torn = true;
                scan.dropped += 1;
            }
        }
    }

    if torn && scan.dropped == 0 {
        // Undecodable bytes with no full line behind them still count as
        // one dropped record.
        scan.dropped = 1;
    }

    Ok(scan)
}

/// Single-writer append handle for the event log.
pub struct EventLog {
    file: File,
    path: PathBuf,
    next_seq: u64,
}

impl EventLog {
    /// Open (or create) the log at `path` for appending.
    ///
    /// Scans existing content to find the next sequence number. A torn
    /// trailing record is ignored; new appends continue after the last
    /// intact one.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let scan = read_events(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file,
            path: path.to_owned(),
            next_seq: scan.max_seq() + 1,
        })
    }

    /// Sequence number the next append will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Highest sequence number already written, or 0 for an empty log.
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event and force it to disk.
    ///
    /// Assigns the next sequence number and returns the full record. When
    /// this returns `Ok`, the record is durable.
    pub fn append(
        &mut self,
        candidate_id: Option<CandidateId>,
        kind: EventKind,
        ts: DateTime<Utc>,
    ) -> Result<Event, LogError> {
        let event = Event {
            seq: self.next_seq,
            ts,
            candidate_id,
            kind,
        };

        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_data()?;

        self.next_seq += 1;
        Ok(event)
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
