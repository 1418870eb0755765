// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Termination condition DSL: `<metric><op><number>`
//!
//! The grammar is deliberately tiny. `op` is one of `>=`, `<=`, `=`, `>`,
//! `<` (two-character operators matched first). The metric name is any
//! non-empty string without an operator character.

use crate::event::Metrics;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Comparison operator of a termination condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Ge,
    Le,
    Eq,
    Gt,
    Lt,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        }
    }

    /// Whether larger metric values rank a candidate better under this
    /// operator. Used for best-so-far selection, not for the threshold test.
    pub fn prefers_higher(&self) -> bool {
        match self {
            CompareOp::Ge | CompareOp::Gt | CompareOp::Eq => true,
            CompareOp::Le | CompareOp::Lt => false,
        }
    }

    /// Apply the operator to `value <op> threshold`.
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            CompareOp::Ge => value >= threshold,
            CompareOp::Le => value <= threshold,
            CompareOp::Eq => value == threshold,
            CompareOp::Gt => value > threshold,
            CompareOp::Lt => value < threshold,
        }
    }
}

/// Errors parsing a termination condition expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerminationParseError {
    #[error("no comparison operator in {0:?} (expected <metric><op><number>)")]
    MissingOperator(String),
    #[error("empty metric name in {0:?}")]
    EmptyMetric(String),
    #[error("invalid threshold in {0:?}")]
    InvalidThreshold(String),
}

/// A metric comparison that, once satisfied by a succeeded candidate,
/// initiates graceful drain.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminationCondition {
    pub metric: String,
    pub op: CompareOp,
    pub threshold: f64,
}

impl TerminationCondition {
    pub fn new(metric: impl Into<String>, op: CompareOp, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            op,
            threshold,
        }
    }

    /// A condition that never matches and never ranks candidates.
    ///
    /// Used by read-only consumers when no configuration is available.
    pub fn never() -> Self {
        Self::new("", CompareOp::Ge, f64::INFINITY)
    }

    /// True when `metrics` contains the primary metric and its value
    /// satisfies the comparison. Absent metric means false.
    pub fn satisfied_by(&self, metrics: &Metrics) -> bool {
        match metrics.get(&self.metric) {
            Some(value) => self.op.compare(*value, self.threshold),
            None => false,
        }
    }

    /// Whether `a` is strictly better than `b` under the primary metric's
    /// direction. Ties rank equal, so earlier candidates keep their spot.
    pub fn ranks_above(&self, a: f64, b: f64) -> bool {
        if self.op.prefers_higher() {
            a > b
        } else {
            a < b
        }
    }
}

impl std::fmt::Display for TerminationCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.metric, self.op.symbol(), self.threshold)
    }
}

impl std::str::FromStr for TerminationCondition {
    type Err = TerminationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Two-character operators first so "a>=1" doesn't parse as `>` "=1".
        const OPS: [(&str, CompareOp); 5] = [
            (">=", CompareOp::Ge),
            ("<=", CompareOp::Le),
            (">", CompareOp::Gt),
            ("<", CompareOp::Lt),
            ("=", CompareOp::Eq),
        ];
        for (symbol, op) in OPS {
            if let Some(pos) = s.find(symbol) {
                let metric = s[..pos].trim();
                let rest = s[pos + symbol.len()..].trim();
                if metric.is_empty() {
                    return Err(TerminationParseError::EmptyMetric(s.to_string()));
                }
                let threshold: f64 = rest
                    .parse()
                    .map_err(|_| TerminationParseError::InvalidThreshold(s.to_string()))?;
                if !threshold.is_finite() {
                    return Err(TerminationParseError::InvalidThreshold(s.to_string()));
                }
                return Ok(Self::new(metric, op, threshold));
            }
        }
        Err(TerminationParseError::MissingOperator(s.to_string()))
    }
}

impl Serialize for TerminationCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TerminationCondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "termination_tests.rs"]
mod tests;
