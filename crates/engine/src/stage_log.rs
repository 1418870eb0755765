// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-candidate stage output capture

use aurelia_core::{CandidateId, Stage};
use std::path::PathBuf;
use tracing::warn;

/// Writes captured stage output under `logs/<candidate_id>/`.
///
/// Capture is best-effort: a failed write is logged and the candidate
/// proceeds, since the event log remains the authoritative record.
#[derive(Debug, Clone)]
pub struct StageLogger {
    logs_dir: PathBuf,
}

impl StageLogger {
    pub fn new(logs_dir: PathBuf) -> Self {
        Self { logs_dir }
    }

    pub fn write(&self, id: CandidateId, stage: Stage, stdout: &str, stderr: &str) {
        let dir = self.logs_dir.join(id.to_string());
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(candidate = %id, error = %e, "cannot create stage log dir");
            return;
        }

        let base = stage.log_name();
        for (suffix, content) in [("stdout", stdout), ("stderr", stderr)] {
            let path = dir.join(format!("{base}.{suffix}"));
            if let Err(e) = std::fs::write(&path, content) {
                warn!(candidate = %id, path = %path.display(), error = %e, "cannot write stage log");
            }
        }
    }
}

#[cfg(test)]
#[path = "stage_log_tests.rs"]
mod tests;
