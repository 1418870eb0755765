// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Evaluator output parsing

use crate::event::Metrics;
use serde_json::Value;

/// Extract the metrics map from evaluator stdout.
///
/// The *last* line that parses as a non-empty JSON object with all-numeric
/// values is taken as the metrics map. Everything the evaluator prints
/// before it (progress, warnings) is ignored.
pub fn parse_metrics(stdout: &str) -> Option<Metrics> {
    stdout.lines().rev().find_map(metrics_from_line)
}

fn metrics_from_line(line: &str) -> Option<Metrics> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    let object = value.as_object()?;
    if object.is_empty() {
        return None;
    }

    let mut metrics = Metrics::new();
    for (key, value) in object {
        let number = value.as_f64()?;
        if !number.is_finite() {
            return None;
        }
        metrics.insert(key.clone(), number);
    }
    Some(metrics)
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
