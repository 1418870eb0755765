// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn takes_last_json_object_line() {
    let stdout = "\
running 12 cases
{\"accuracy\": 0.1}
progress 50%
{\"accuracy\": 0.75, \"loss\": 0.2}
";
    let metrics = parse_metrics(stdout).unwrap();
    assert_eq!(metrics.get("accuracy"), Some(&0.75));
    assert_eq!(metrics.get("loss"), Some(&0.2));
}

#[test]
fn ignores_trailing_noise_after_metrics() {
    let stdout = "{\"score\": 3}\ndone in 4.2s\n";
    let metrics = parse_metrics(stdout).unwrap();
    assert_eq!(metrics.get("score"), Some(&3.0));
}

#[test]
fn integer_values_are_numeric() {
    let metrics = parse_metrics("{\"passes\": 12}").unwrap();
    assert_eq!(metrics.get("passes"), Some(&12.0));
}

#[test]
fn no_metrics_line() {
    assert!(parse_metrics("").is_none());
    assert!(parse_metrics("all tests passed\n").is_none());
    assert!(parse_metrics("[1, 2, 3]\n").is_none());
    assert!(parse_metrics("not json {\n").is_none());
}

#[test]
fn empty_object_is_not_metrics() {
    assert!(parse_metrics("{}\n").is_none());
}

#[test]
fn non_numeric_leaf_disqualifies_line() {
    // The bad line is skipped; an earlier valid line still counts.
    let stdout = "{\"accuracy\": 0.5}\n{\"accuracy\": \"high\"}\n";
    let metrics = parse_metrics(stdout).unwrap();
    assert_eq!(metrics.get("accuracy"), Some(&0.5));

    assert!(parse_metrics("{\"accuracy\": \"high\"}\n").is_none());
    assert!(parse_metrics("{\"nested\": {\"a\": 1}}\n").is_none());
    assert!(parse_metrics("{\"x\": null}\n").is_none());
}

#[test]
fn whitespace_around_object_is_tolerated() {
    let metrics = parse_metrics("   {\"accuracy\": 1.0}   \n").unwrap();
    assert_eq!(metrics.get("accuracy"), Some(&1.0));
}
