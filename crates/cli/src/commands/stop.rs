// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia stop`: signal the running engine to drain

use aurelia_engine::ProjectLayout;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::Path;

pub fn run(root: &Path) -> i32 {
    let layout = ProjectLayout::new(root.to_owned());

    let Some(pid) = layout.read_pid() else {
        eprintln!("not running (no pid file)");
        return 2;
    };

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => {
            println!("sent SIGTERM to {pid}");
            0
        }
        Err(Errno::ESRCH) => {
            // Engine died without cleaning up; clear the stale pid file.
            layout.remove_pid();
            eprintln!("not running (stale pid {pid})");
            2
        }
        Err(e) => {
            eprintln!("error: failed to signal {pid}: {e}");
            1
        }
    }
}

#[cfg(test)]
#[path = "stop_tests.rs"]
mod tests;
