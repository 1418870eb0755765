// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aurelia_engine::ProjectLayout;

#[test]
fn no_pid_file_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path().to_owned());
    layout.init().unwrap();

    assert_eq!(run(dir.path()), 2);
}

#[test]
fn stale_pid_exits_2_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path().to_owned());
    layout.init().unwrap();
    // A pid that cannot exist keeps the test from signalling anything real.
    std::fs::write(layout.pid_path(), "999999999\n").unwrap();

    assert_eq!(run(dir.path()), 2);
    assert_eq!(layout.read_pid(), None);
}

#[test]
fn unparseable_pid_file_reads_as_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::new(dir.path().to_owned());
    layout.init().unwrap();
    std::fs::write(layout.pid_path(), "not-a-pid\n").unwrap();

    assert_eq!(run(dir.path()), 2);
}
