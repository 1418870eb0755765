// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia init`: create the project skeleton

use aurelia_engine::{InitError, ProjectLayout};
use std::path::Path;

pub fn run(root: &Path) -> i32 {
    let layout = ProjectLayout::new(root.to_owned());
    match layout.init() {
        Ok(()) => {
            println!("initialized {}", layout.aurelia_dir().display());
            println!("edit {} and run `aurelia start`", layout.config_path().display());
            0
        }
        Err(InitError::AlreadyInitialized(path)) => {
            eprintln!("already initialized: {} exists", path.display());
            2
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
