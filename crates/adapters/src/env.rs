// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable forwarding

/// Collect allowlisted variables from the host environment.
///
/// Only names on the allowlist are forwarded into sandboxes; everything
/// else of the host environment stays behind. Unset names are skipped.
pub fn forwarded_env(allowlist: &[String]) -> Vec<(String, String)> {
    allowlist
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
        .collect()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
