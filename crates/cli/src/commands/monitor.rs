// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia monitor`: follow the event log
//!
//! Prints every event as it appears, then exits once the runtime writes
//! `runtime_stopped`. A read-only consumer: it never touches the log.

use aurelia_core::EventKind;
use aurelia_engine::ProjectLayout;
use aurelia_storage::read_events;
use std::path::Path;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn run(root: &Path) -> i32 {
    let layout = ProjectLayout::new(root.to_owned());
    let path = layout.events_path();
    let mut last_seq = 0u64;

    loop {
        let scan = match read_events(&path) {
            Ok(scan) => scan,
            Err(e) => {
                eprintln!("error: cannot read event log: {e}");
                return 1;
            }
        };

        let mut stopped = false;
        for event in &scan.events {
            if event.seq <= last_seq {
                continue;
            }
            last_seq = event.seq;
            println!(
                "{} {}",
                event.ts.format("%H:%M:%S%.3f"),
                event.log_summary()
            );
            if event.kind == EventKind::RuntimeStopped {
                stopped = true;
            }
        }
        if stopped {
            return 0;
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}
