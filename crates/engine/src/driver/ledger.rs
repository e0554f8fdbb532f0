//! Pass/fail bookkeeping for driver checks.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

/// Whether a check expects the command to succeed (positive) or to be
/// refused (negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Positive,
    Negative,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => f.write_str("positive"),
            Self::Negative => f.write_str("negative"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcomes {
    pub pass: Vec<String>,
    pub fail: Vec<String>,
}

/// Results of one driver run, entries formatted as `"{action} - {message}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ledger {
    pub positive: Outcomes,
    pub negative: Outcomes,
}

/// Counts plus every entry, as reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub positive_passed: usize,
    pub positive_failed: usize,
    pub negative_passed: usize,
    pub negative_failed: usize,
    pub positive: Outcomes,
    pub negative: Outcomes,
}

impl LedgerSummary {
    pub fn total(&self) -> usize {
        self.positive_passed + self.positive_failed + self.negative_passed + self.negative_failed
    }

    pub fn failed(&self) -> usize {
        self.positive_failed + self.negative_failed
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&mut self, kind: TestKind) -> &mut Outcomes {
        match kind {
            TestKind::Positive => &mut self.positive,
            TestKind::Negative => &mut self.negative,
        }
    }

    /// Classify an observed state. Positive checks pass when `actual` equals
    /// `desired`; negative checks pass when it does not. Returns whether the
    /// check passed.
    pub fn record(
        &mut self,
        desired: &str,
        actual: &str,
        kind: TestKind,
        action: &str,
        message: &str,
    ) -> bool {
        let passed = (desired == actual) == (kind == TestKind::Positive);
        let entry = format!("{action} - {message}");
        let bucket = self.bucket(kind);
        if passed {
            info!(action, kind = %kind, "passed: {message}");
            bucket.pass.push(entry);
        } else {
            info!(action, kind = %kind, "failed: {message}");
            bucket.fail.push(entry);
        }
        passed
    }

    /// Record a check that could not be evaluated at all.
    pub fn record_failure(&mut self, kind: TestKind, action: &str, message: &str) {
        warn!(action, kind = %kind, "failed: {message}");
        self.bucket(kind).fail.push(format!("{action} - {message}"));
    }

    pub fn has_failures(&self) -> bool {
        !self.positive.fail.is_empty() || !self.negative.fail.is_empty()
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            positive_passed: self.positive.pass.len(),
            positive_failed: self.positive.fail.len(),
            negative_passed: self.negative.pass.len(),
            negative_failed: self.negative.fail.len(),
            positive: self.positive.clone(),
            negative: self.negative.clone(),
        }
    }

    /// Write the summary to the log.
    pub fn log_summary(&self) {
        let sections = [
            ("Positive Tests Passed", &self.positive.pass),
            ("Positive Tests Failed", &self.positive.fail),
            ("Negative Tests Passed", &self.negative.pass),
            ("Negative Tests Failed", &self.negative.fail),
        ];
        info!("test summary");
        for (title, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            info!("{title}");
            for entry in entries {
                info!("\t{entry}");
            }
        }
        let summary = self.summary();
        info!(
            positive_passed = summary.positive_passed,
            positive_failed = summary.positive_failed,
            negative_passed = summary.negative_passed,
            negative_failed = summary.negative_failed,
            "driver totals"
        );
    }
}
