// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{EventSink, ExecutionEvent, ExecutionEventKind};
use crate::cancellation::{CancelReason, CancellationContext};
use cascade_metadata::{ErrorMetadata, FailureCause, IdentityChain, RunSummary, ScopeLevel};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tokio::{sync::Notify, time::Instant};
use tracing::{debug, info};

/// A callback that returns true if the run should be cancelled.
pub type CancelThunk = Box<dyn Fn() -> bool + Send + Sync>;

/// A callback invoked with the final summary once the assembly finishes.
pub type FinishedCallback = Box<dyn Fn(&ExecutionSummary) + Send + Sync>;

/// A callback invoked with the tests found running longer than the configured time.
pub type LongRunningTestCallback = Box<dyn Fn(&LongRunningTestsSummary) + Send + Sync>;

/// Policies applied by an [`ExecutionSink`].
#[derive(Debug, Default)]
pub struct ExecutionSinkOptions {
    /// Report skipped tests as failed.
    pub fail_skips: bool,

    /// Report passing tests that added warnings as failed.
    pub fail_warn: bool,

    /// Cancel the run after the first failed test.
    pub stop_on_fail: bool,

    /// Polled on every event; the run is cancelled once it returns true.
    pub cancel_thunk: Option<DebugIgnore<CancelThunk>>,

    /// Invoked when the assembly finishes.
    pub finished_callback: Option<DebugIgnore<FinishedCallback>>,

    /// Tests running for at least this long are reported by
    /// [`ExecutionSink::watch_long_running_tests`]. `None` or zero disables detection.
    pub long_running_test_time: Option<Duration>,

    /// Invoked each time long-running tests are detected.
    pub long_running_test_callback: Option<DebugIgnore<LongRunningTestCallback>>,
}

/// A test that has been running for at least the configured long-running time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LongRunningTest {
    /// The test's identity chain.
    pub chain: IdentityChain,

    /// The test's display name.
    pub name: String,

    /// How long the test had been running when it was detected.
    pub elapsed: Duration,
}

/// The long-running tests found by one check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LongRunningTestsSummary {
    /// The configured long-running time.
    pub configured_time: Duration,

    /// The tests found, in the order they started.
    pub tests: Vec<LongRunningTest>,
}

/// The final outcome of a run, as seen by an [`ExecutionSink`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExecutionSummary {
    /// Counts and timing, after any conversions applied by the sink.
    pub summary: RunSummary,

    /// The reason the run was cancelled, if it was.
    pub cancel_reason: Option<CancelReason>,
}

/// A sink that applies run policies to events before forwarding them to another sink.
#[derive(Debug)]
pub struct ExecutionSink<S> {
    inner: S,
    options: ExecutionSinkOptions,
    cancellation: CancellationContext,
    state: Mutex<SinkState>,
    assembly_finished: Notify,
}

#[derive(Debug, Default)]
struct SinkState {
    // Passing tests converted to failures by fail-warn, counted against each enclosing scope
    // until that scope finishes.
    warn_failures: HashMap<IdentityChain, usize>,
    // Tests between their starting and finished events. Only tracked when long-running test
    // detection is enabled.
    running: IndexMap<IdentityChain, RunningTest>,
    assembly_finished: bool,
    summary: Option<ExecutionSummary>,
}

#[derive(Debug)]
struct RunningTest {
    name: String,
    started: Instant,
}

impl<S: EventSink> ExecutionSink<S> {
    /// The type name reported for skipped tests converted to failures.
    pub const FAIL_SKIP_TYPE: &'static str = "FAIL_SKIP";

    /// The type name reported for passing tests with warnings converted to failures.
    pub const FAIL_WARN_TYPE: &'static str = "FAIL_WARN";

    /// Creates a new sink forwarding to `inner`.
    pub fn new(inner: S, options: ExecutionSinkOptions, cancellation: CancellationContext) -> Self {
        Self {
            inner,
            options,
            cancellation,
            state: Mutex::new(SinkState::default()),
            assembly_finished: Notify::new(),
        }
    }

    /// Returns the final summary, once the assembly has finished.
    pub fn summary(&self) -> Option<ExecutionSummary> {
        self.lock().summary
    }

    /// Reports long-running tests until the assembly finishes.
    ///
    /// Once per configured long-running time, every test that has been running for at least that
    /// long is logged and passed to the long-running test callback. This future is meant to be
    /// polled alongside the run, for example with [`futures::join!`]. It returns immediately if
    /// detection is disabled.
    pub async fn watch_long_running_tests(&self) {
        let Some(threshold) = self.long_running_test_time() else {
            return;
        };

        loop {
            let finished = self.assembly_finished.notified();
            tokio::pin!(finished);
            finished.as_mut().enable();
            if self.lock().assembly_finished {
                return;
            }

            tokio::select! {
                _ = finished.as_mut() => return,
                _ = tokio::time::sleep(threshold) => self.report_long_running_tests(threshold),
            }
        }
    }

    fn long_running_test_time(&self) -> Option<Duration> {
        self.options
            .long_running_test_time
            .filter(|time| !time.is_zero())
    }

    fn report_long_running_tests(&self, threshold: Duration) {
        let now = Instant::now();
        let tests: Vec<_> = self
            .lock()
            .running
            .iter()
            .filter_map(|(chain, test)| {
                let elapsed = now.saturating_duration_since(test.started);
                (elapsed >= threshold).then(|| LongRunningTest {
                    chain: chain.clone(),
                    name: test.name.clone(),
                    elapsed,
                })
            })
            .collect();
        if tests.is_empty() {
            return;
        }

        for test in &tests {
            info!(test = %test.chain, elapsed = ?test.elapsed, "long running test: {}", test.name);
        }
        if let Some(callback) = &self.options.long_running_test_callback {
            (callback.0)(&LongRunningTestsSummary {
                configured_time: threshold,
                tests,
            });
        }
    }

    fn track_running(&self, kind: &ExecutionEventKind, state: &mut SinkState) {
        match kind {
            ExecutionEventKind::TestAssemblyStarting { .. } => state.assembly_finished = false,
            ExecutionEventKind::TestStarting { chain, name, .. }
                if self.long_running_test_time().is_some() =>
            {
                state.running.insert(
                    chain.clone(),
                    RunningTest {
                        name: name.clone(),
                        started: Instant::now(),
                    },
                );
            }
            ExecutionEventKind::TestFinished { chain, .. } => {
                state.running.shift_remove(chain);
            }
            _ => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn convert(&self, kind: ExecutionEventKind, state: &mut SinkState) -> ExecutionEventKind {
        match kind {
            ExecutionEventKind::TestSkipped {
                chain,
                info,
                reason,
            } if self.options.fail_skips => ExecutionEventKind::TestFailed {
                chain,
                info,
                error: ErrorMetadata::single(FailureCause::Other, Self::FAIL_SKIP_TYPE, reason),
            },
            ExecutionEventKind::TestPassed { chain, info }
                if self.options.fail_warn && !info.warnings.is_empty() =>
            {
                let mut scopes: Vec<_> = [
                    ScopeLevel::Assembly,
                    ScopeLevel::Collection,
                    ScopeLevel::Class,
                    ScopeLevel::Method,
                ]
                .into_iter()
                .map(|level| chain.truncate(level))
                .chain(std::iter::once(chain.test_case_chain()))
                .collect();
                // Levels missing from the chain truncate to the same scope.
                scopes.dedup();
                for scope in scopes {
                    *state.warn_failures.entry(scope).or_default() += 1;
                }
                let message = format!(
                    "this test passed, but fail-warn is set and it added warnings:\n{}",
                    info.warnings.join("\n")
                );
                ExecutionEventKind::TestFailed {
                    chain,
                    info,
                    error: ErrorMetadata::single(
                        FailureCause::Other,
                        Self::FAIL_WARN_TYPE,
                        message,
                    ),
                }
            }
            mut other => {
                let warn_failures = if other.summary().is_some() {
                    state.warn_failures.remove(other.chain()).unwrap_or(0)
                } else {
                    0
                };
                if let Some(summary) = other.summary_mut() {
                    if self.options.fail_skips {
                        summary.failed += summary.skipped;
                        summary.skipped = 0;
                    }
                    summary.failed += warn_failures;
                }
                other
            }
        }
    }
}

impl<S: EventSink> EventSink for ExecutionSink<S> {
    fn publish(&self, event: ExecutionEvent) -> bool {
        let ExecutionEvent {
            timestamp,
            elapsed,
            kind,
        } = event;

        let (kind, finished) = {
            let mut state = self.lock();
            self.track_running(&kind, &mut state);
            let kind = self.convert(kind, &mut state);
            let finished = match &kind {
                ExecutionEventKind::TestAssemblyFinished { summary, .. } => {
                    let summary = ExecutionSummary {
                        summary: *summary,
                        cancel_reason: self.cancellation.reason(),
                    };
                    state.summary = Some(summary);
                    state.assembly_finished = true;
                    Some(summary)
                }
                _ => None,
            };
            (kind, finished)
        };
        if finished.is_some() {
            self.assembly_finished.notify_waiters();
        }

        let failed = matches!(kind, ExecutionEventKind::TestFailed { .. });
        let keep_going = self.inner.publish(ExecutionEvent {
            timestamp,
            elapsed,
            kind,
        });

        if failed && self.options.stop_on_fail {
            debug!("test failed and stop-on-fail is set, cancelling run");
            self.cancellation.cancel(CancelReason::TestFailure);
        }

        if let (Some(summary), Some(callback)) = (finished, &self.options.finished_callback) {
            (callback.0)(&summary);
        }

        let cancel_requested = self
            .options
            .cancel_thunk
            .as_ref()
            .is_some_and(|thunk| (thunk.0)());
        if cancel_requested {
            self.cancellation.cancel(CancelReason::External);
        }

        keep_going && !cancel_requested
    }
}
