// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RunOptions, TestContext, TestPacket};
use crate::{
    aggregator::ExceptionAggregator,
    errors::{DisplayErrorChain, TestError},
    list::InvocationOutcome,
    reporter::{ExecutionEventKind, MessageBus, TestRunInfo},
    time::{StopwatchSnapshot, stopwatch},
};
use cascade_metadata::{IdentityChain, RunSummary, TestStatus, Traits};
use std::time::Duration;
use tracing::{debug, instrument};

/// Runs a single test through its lifecycle.
///
/// The stages are, in order: starting, the skip and explicit-run checks, construction,
/// before-hooks, invocation, after-hooks, disposal and the terminal result. Every stage is guarded
/// so that a failure is recorded and cleanup for work already started still happens. Exactly one
/// terminal event (passed, failed, skipped or not run) is published for each test, followed by
/// a finished event.
#[derive(Clone, Copy, Debug)]
pub struct TestRunner<'a> {
    bus: &'a MessageBus,
    options: &'a RunOptions,
}

enum TestResult {
    Passed,
    Failed(TestError),
    Skipped(String),
    NotRun,
}

impl TestResult {
    fn status(&self) -> TestStatus {
        match self {
            Self::Passed => TestStatus::Passed,
            Self::Failed(_) => TestStatus::Failed,
            Self::Skipped(_) => TestStatus::Skipped,
            Self::NotRun => TestStatus::NotRun,
        }
    }
}

impl<'a> TestRunner<'a> {
    /// Creates a new runner publishing to `bus`.
    pub fn new(bus: &'a MessageBus, options: &'a RunOptions) -> Self {
        Self { bus, options }
    }

    /// Runs the test in `packet`.
    ///
    /// `aggregator` holds any errors inherited from enclosing scopes. If it is not empty, the test
    /// fails without being constructed.
    #[instrument(level = "debug", skip_all, fields(test = %packet.test.descriptor.chain))]
    pub async fn run(&self, packet: TestPacket, mut aggregator: ExceptionAggregator) -> RunSummary {
        let stopwatch = stopwatch();
        let TestPacket {
            test,
            hooks,
            traits,
            skip_reason,
        } = packet;
        let descriptor = &test.descriptor;
        let chain = descriptor.chain.clone();
        let cancellation = self.bus.cancellation();
        let cx = TestContext::new(
            descriptor.clone(),
            test.method_arguments.clone(),
            cancellation.clone(),
        );

        let timeout = descriptor
            .timeout
            .filter(|timeout| !timeout.is_zero())
            .or(self.options.default_timeout)
            .filter(|timeout| !timeout.is_zero());

        self.bus.publish(ExecutionEventKind::TestStarting {
            chain: chain.clone(),
            name: descriptor.name.clone(),
            explicit: descriptor.explicit,
            timeout,
            traits: Traits::merged([&traits, &descriptor.traits]),
        });

        // The test's own skip reason is innermost, so it wins over any enclosing scope's.
        if let Some(reason) = descriptor.skip_reason.clone().or(skip_reason) {
            return self.finish(
                chain,
                &cx,
                stopwatch.snapshot(),
                TestResult::Skipped(reason),
                false,
            );
        }

        if !self.options.explicit.should_run(descriptor.explicit) {
            debug!(
                explicit = descriptor.explicit,
                option = %self.options.explicit,
                "test not selected by explicit option"
            );
            return self.finish(chain, &cx, stopwatch.snapshot(), TestResult::NotRun, false);
        }

        if let Some(condition) = &test.skip_condition
            && let Some(Some(reason)) = aggregator.record(|| condition.evaluate())
        {
            return self.finish(
                chain,
                &cx,
                stopwatch.snapshot(),
                TestResult::Skipped(reason),
                false,
            );
        }

        // Construction.
        let mut instance = None;
        if !cancellation.is_cancelled()
            && !aggregator.has_error()
            && let Some(class) = &test.class
        {
            self.bus
                .publish(ExecutionEventKind::TestClassConstructionStarting {
                    chain: chain.clone(),
                });
            instance = aggregator.record(|| class.construct(&test.constructor_arguments));
            self.bus
                .publish(ExecutionEventKind::TestClassConstructionFinished {
                    chain: chain.clone(),
                });
        }

        // Hooks use their own aggregator so that their errors follow any error from the body.
        let mut hook_aggregator = ExceptionAggregator::new();
        let mut started_hooks = Vec::new();
        let mut invoked = false;
        let mut skip_requested = None;

        if !aggregator.has_error() {
            for hook in hooks.iter() {
                if cancellation.is_cancelled() {
                    break;
                }

                let name = hook.name();
                self.bus.publish(ExecutionEventKind::BeforeTestStarting {
                    chain: chain.clone(),
                    hook: name.clone(),
                });
                // Hooks and bodies are called inside the guarded future so that a panic raised
                // before their future is first polled is recorded too.
                let succeeded = hook_aggregator
                    .record_async(async { hook.before(descriptor, &cx).await })
                    .await
                    .is_some();
                self.bus.publish(ExecutionEventKind::BeforeTestFinished {
                    chain: chain.clone(),
                    hook: name.clone(),
                });

                if !succeeded {
                    break;
                }
                started_hooks.push((hook, name));
            }

            if !hook_aggregator.has_error() && !cancellation.is_cancelled() {
                invoked = true;
                let invocation = async { test.body.invoke(instance.as_mut(), &cx).await };
                let outcome = match timeout {
                    Some(timeout) => {
                        aggregator
                            .record_async(async move {
                                match tokio::time::timeout(timeout, invocation).await {
                                    Ok(result) => result,
                                    Err(_) => Err(TestError::timeout(timeout)),
                                }
                            })
                            .await
                    }
                    None => aggregator.record_async(invocation).await,
                };
                if let Some(InvocationOutcome::SkipRequested(reason)) = outcome {
                    skip_requested = Some(reason);
                }
            }

            for (hook, name) in started_hooks.iter().rev() {
                self.bus.publish(ExecutionEventKind::AfterTestStarting {
                    chain: chain.clone(),
                    hook: name.clone(),
                });
                hook_aggregator
                    .record_async(async { hook.after(descriptor, &cx).await })
                    .await;
                self.bus.publish(ExecutionEventKind::AfterTestFinished {
                    chain: chain.clone(),
                    hook: name.clone(),
                });
            }
        }

        aggregator.aggregate(hook_aggregator);

        if let Some(mut instance) = instance
            && instance.is_disposable()
        {
            self.bus
                .publish(ExecutionEventKind::TestClassDisposeStarting {
                    chain: chain.clone(),
                });
            aggregator
                .record_async(async { instance.dispose().await })
                .await;
            self.bus
                .publish(ExecutionEventKind::TestClassDisposeFinished {
                    chain: chain.clone(),
                });
        }

        let result = if let Some(error) = aggregator.to_error() {
            TestResult::Failed(error)
        } else if let Some(reason) = skip_requested {
            TestResult::Skipped(reason)
        } else if !invoked {
            debug!("run cancelled before the test was invoked");
            TestResult::NotRun
        } else {
            TestResult::Passed
        };

        self.finish(chain, &cx, stopwatch.snapshot(), result, true)
    }

    fn finish(
        &self,
        chain: IdentityChain,
        cx: &TestContext,
        snapshot: StopwatchSnapshot,
        result: TestResult,
        executed: bool,
    ) -> RunSummary {
        let status = result.status();
        let time = if executed {
            snapshot.duration
        } else {
            Duration::ZERO
        };
        let info = TestRunInfo {
            start_time: snapshot.start_time.fixed_offset(),
            time,
            output: cx.output(),
            warnings: cx.warnings(),
        };

        let kind = match result {
            TestResult::Passed => ExecutionEventKind::TestPassed {
                chain: chain.clone(),
                info: info.clone(),
            },
            TestResult::Failed(error) => {
                debug!(error = %DisplayErrorChain::new(&error), "test failed");
                ExecutionEventKind::TestFailed {
                    chain: chain.clone(),
                    info: info.clone(),
                    error: error.to_metadata(),
                }
            }
            TestResult::Skipped(reason) => ExecutionEventKind::TestSkipped {
                chain: chain.clone(),
                info: info.clone(),
                reason,
            },
            TestResult::NotRun => ExecutionEventKind::TestNotRun {
                chain: chain.clone(),
                info: info.clone(),
            },
        };
        self.bus.publish(kind);
        self.bus
            .publish(ExecutionEventKind::TestFinished { chain, info });

        debug!(%status, ?time, "test finished");
        RunSummary::single(status, time)
    }
}
