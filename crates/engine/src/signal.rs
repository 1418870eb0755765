// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator signal handling
//!
//! `SIGTERM` and `SIGINT` request graceful drain by cancelling the
//! engine's shutdown token. A second signal of the same kind terminates
//! the process immediately, without waiting for drain.

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawn the signal listener task.
pub fn spawn_signal_handler(shutdown: CancellationToken) -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        let mut term_seen = false;
        let mut int_seen = false;
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    if term_seen {
                        warn!("second SIGTERM, terminating immediately");
                        std::process::exit(1);
                    }
                    term_seen = true;
                    info!("SIGTERM received, draining");
                    shutdown.cancel();
                }
                _ = sigint.recv() => {
                    if int_seen {
                        warn!("second SIGINT, terminating immediately");
                        std::process::exit(1);
                    }
                    int_seen = true;
                    info!("SIGINT received, draining");
                    shutdown.cancel();
                }
            }
        }
    });
    Ok(())
}
