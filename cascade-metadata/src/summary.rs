// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::{fmt, ops::AddAssign, time::Duration};

/// The terminal status of a single test.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// The test ran and no errors were recorded.
    Passed,

    /// At least one error was recorded while running the test.
    Failed,

    /// The test was skipped, either statically or because it asked to be skipped while running.
    Skipped,

    /// The test was deliberately not run, either because of the explicit-run policy or because
    /// the run was cancelled before it was invoked.
    NotRun,
}

impl TestStatus {
    /// Returns a human-readable name for this status.
    pub fn to_static_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::NotRun => "not run",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_static_str())
    }
}

/// Counts and timing for a set of tests.
///
/// A single-test runner produces a summary with `total == 1`; every runner above it sums the
/// summaries of its children.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct RunSummary {
    /// The total number of tests.
    #[cfg_attr(test, strategy(0usize..10_000))]
    pub total: usize,

    /// The number of tests that failed.
    #[cfg_attr(test, strategy(0usize..10_000))]
    pub failed: usize,

    /// The number of tests that were skipped.
    #[cfg_attr(test, strategy(0usize..10_000))]
    pub skipped: usize,

    /// The number of tests that were not run.
    #[cfg_attr(test, strategy(0usize..10_000))]
    pub not_run: usize,

    /// The total execution time of the tests.
    #[serde(with = "humantime_serde")]
    #[cfg_attr(
        test,
        strategy(proptest::prelude::Strategy::prop_map(0u64..1_000_000, Duration::from_millis))
    )]
    pub time: Duration,
}

impl RunSummary {
    /// Returns the summary for a single test with the given status.
    pub fn single(status: TestStatus, time: Duration) -> Self {
        let mut summary = Self {
            total: 1,
            time,
            ..Self::default()
        };
        match status {
            TestStatus::Passed => {}
            TestStatus::Failed => summary.failed = 1,
            TestStatus::Skipped => summary.skipped = 1,
            TestStatus::NotRun => summary.not_run = 1,
        }
        summary
    }

    /// Adds the counts and time from another summary into this one.
    pub fn aggregate(&mut self, other: &RunSummary) {
        self.total += other.total;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.not_run += other.not_run;
        self.time += other.time;
    }

    /// Returns the number of tests that passed.
    pub fn passed(&self) -> usize {
        self.total
            .saturating_sub(self.failed)
            .saturating_sub(self.skipped)
            .saturating_sub(self.not_run)
    }

    /// Returns true if no tests failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl AddAssign<&RunSummary> for RunSummary {
    fn add_assign(&mut self, rhs: &RunSummary) {
        self.aggregate(rhs);
    }
}

impl<'a> std::iter::Sum<&'a RunSummary> for RunSummary {
    fn sum<I: Iterator<Item = &'a RunSummary>>(iter: I) -> Self {
        let mut total = Self::default();
        for summary in iter {
            total += summary;
        }
        total
    }
}
