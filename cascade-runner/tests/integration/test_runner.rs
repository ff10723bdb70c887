// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use cascade_metadata::{ErrorMetadata, FailureCause, RunSummary};
use cascade_runner::{
    aggregator::ExceptionAggregator,
    cancellation::CancelReason,
    errors::TestError,
    list::{
        Arguments, AsyncDispose, BeforeAfterTestHook, InheritedScope, InvocationOutcome,
        RunnableTest, ScopeInfo, SkipCondition, TestDescriptor, TestInstance, instance_fn,
    },
    reporter::{ExecutionEvent, ExecutionEventKind, RecordingSink, TestRunInfo},
    runner::{RunOptions, TestContext, TestPacket, TestRunner},
};
use futures::future::BoxFuture;
use pretty_assertions::assert_eq;
use std::time::Duration;

async fn run(harness: &Harness, packet: TestPacket) -> RunSummary {
    TestRunner::new(&harness.bus, &harness.options)
        .run(packet, ExceptionAggregator::new())
        .await
}

fn with_hooks(test: RunnableTest, hooks: Vec<LoggingHook>) -> TestPacket {
    let info = hooks
        .into_iter()
        .fold(ScopeInfo::new(class_chain("class"), "class"), |info, hook| {
            info.with_hook(hook)
        });
    TestPacket::with_scope(test, &InheritedScope::new().extend(&info))
}

fn failure(events: &[ExecutionEvent]) -> ErrorMetadata {
    events
        .iter()
        .find_map(|event| match &event.kind {
            ExecutionEventKind::TestFailed { error, .. } => Some(error.clone()),
            _ => None,
        })
        .expect("a test-failed event was published")
}

fn run_info(events: &[ExecutionEvent]) -> TestRunInfo {
    events
        .iter()
        .find_map(|event| match &event.kind {
            ExecutionEventKind::TestFinished { info, .. } => Some(info.clone()),
            _ => None,
        })
        .expect("a test-finished event was published")
}

#[tokio::test]
async fn full_lifecycle_with_class_and_hooks() {
    let harness = Harness::new();
    let log = CallLog::default();
    let test = database_test(test_chain("class", "method", "test"), &log);
    let packet = with_hooks(
        test,
        vec![LoggingHook::new("outer", &log), LoggingHook::new("inner", &log)],
    );

    let summary = run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "test-class-construction-starting",
            "test-class-construction-finished",
            "before-test-starting",
            "before-test-finished",
            "before-test-starting",
            "before-test-finished",
            "after-test-starting",
            "after-test-finished",
            "after-test-starting",
            "after-test-finished",
            "test-class-dispose-starting",
            "test-class-dispose-finished",
            "test-passed",
            "test-finished",
        ]
    );
    assert_eq!(
        log.entries(),
        vec![
            "construct",
            "before:outer",
            "before:inner",
            "body",
            "after:inner",
            "after:outer",
            "dispose",
        ]
    );

    let hooks: Vec<_> = harness
        .events()
        .into_iter()
        .filter_map(|event| match event.kind {
            ExecutionEventKind::BeforeTestStarting { hook, .. } => Some(format!("before:{hook}")),
            ExecutionEventKind::AfterTestStarting { hook, .. } => Some(format!("after:{hook}")),
            _ => None,
        })
        .collect();
    assert_eq!(
        hooks,
        vec!["before:outer", "before:inner", "after:inner", "after:outer"]
    );

    assert_eq!(summary.total, 1);
    assert!(summary.is_success());
    assert_eq!(run_info(&harness.events()).output, "queried the database\n");
}

#[tokio::test]
async fn static_test_publishes_only_result_events() {
    let harness = Harness::new();
    let summary = run(
        &harness,
        TestPacket::new(passing_test(test_chain("class", "method", "test"))),
    )
    .await;

    assert_eq!(
        harness.names(),
        vec!["test-starting", "test-passed", "test-finished"]
    );
    assert_eq!(summary.passed(), 1);
}

#[tokio::test]
async fn plain_instance_is_not_disposed() {
    let harness = Harness::new();
    let test = RunnableTest::from_fn(descriptor(test_chain("class", "method", "test")), |_cx| {
        async { Ok(InvocationOutcome::Completed) }
    })
    .with_class(|_args: &Arguments| -> Result<TestInstance, TestError> {
        Ok(TestInstance::new(42_u32))
    });

    run(&harness, TestPacket::new(test)).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "test-class-construction-starting",
            "test-class-construction-finished",
            "test-passed",
            "test-finished",
        ]
    );
}

#[tokio::test]
async fn failing_before_hook_prevents_invocation() {
    let harness = Harness::new();
    let log = CallLog::default();
    let packet = with_hooks(
        database_test(test_chain("class", "method", "test"), &log),
        vec![LoggingHook::new("setup", &log).failing_before()],
    );

    let summary = run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "test-class-construction-starting",
            "test-class-construction-finished",
            "before-test-starting",
            "before-test-finished",
            "test-class-dispose-starting",
            "test-class-dispose-finished",
            "test-failed",
            "test-finished",
        ]
    );
    assert_eq!(log.entries(), vec!["construct", "before:setup", "dispose"]);

    let error = failure(&harness.events());
    assert_eq!(error.cause, FailureCause::Error);
    assert_eq!(error.types, vec!["HookFailure"]);
    assert_eq!(error.messages, vec!["before hook setup failed"]);
    assert_eq!(error.parent_indices, vec![-1]);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn after_hooks_run_only_for_successful_before_hooks() {
    let harness = Harness::new();
    let log = CallLog::default();
    let packet = with_hooks(
        passing_test(test_chain("class", "method", "test")),
        vec![
            LoggingHook::new("outer", &log),
            LoggingHook::new("inner", &log).failing_before(),
            LoggingHook::new("never", &log),
        ],
    );

    run(&harness, packet).await;

    assert_eq!(
        log.entries(),
        vec!["before:outer", "before:inner", "after:outer"]
    );
    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "before-test-starting",
            "before-test-finished",
            "before-test-starting",
            "before-test-finished",
            "after-test-starting",
            "after-test-finished",
            "test-failed",
            "test-finished",
        ]
    );
}

#[tokio::test]
async fn failing_body_and_after_hook_are_aggregated() {
    let harness = Harness::new();
    let log = CallLog::default();
    let packet = with_hooks(
        failing_test(test_chain("class", "method", "test"), "expected 1, found 2"),
        vec![LoggingHook::new("cleanup", &log).failing_after()],
    );

    let summary = run(&harness, packet).await;

    let error = failure(&harness.events());
    assert_eq!(error.cause, FailureCause::Error);
    assert_eq!(
        error.types,
        vec![
            TestError::AGGREGATE_TYPE_NAME,
            "AssertionFailure",
            "HookFailure"
        ]
    );
    assert_eq!(error.parent_indices, vec![-1, 0, 0]);
    assert_eq!(
        &error.messages[1..],
        &["expected 1, found 2", "after hook cleanup failed"]
    );
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn construction_failure_skips_hooks_and_body() {
    let harness = Harness::new();
    let log = CallLog::default();
    let test = passing_test(test_chain("class", "method", "test")).with_class(
        |_args: &Arguments| -> Result<TestInstance, TestError> {
            Err(TestError::new("ConnectionRefused", "database is down"))
        },
    );
    let packet = with_hooks(test, vec![LoggingHook::new("hook", &log)]);

    run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "test-class-construction-starting",
            "test-class-construction-finished",
            "test-failed",
            "test-finished",
        ]
    );
    assert!(log.entries().is_empty());
    assert_eq!(failure(&harness.events()).types, vec!["ConnectionRefused"]);
}

#[tokio::test(start_paused = true)]
async fn body_exceeding_timeout_fails() {
    let harness = Harness::new();
    let test = RunnableTest::from_fn(
        descriptor(test_chain("class", "method", "slow")).with_timeout(Duration::from_millis(50)),
        |_cx| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(InvocationOutcome::Completed)
        },
    );

    let summary = run(&harness, TestPacket::new(test)).await;

    let error = failure(&harness.events());
    assert_eq!(error.cause, FailureCause::Timeout);
    assert_eq!(error.types, vec![TestError::TIMEOUT_TYPE_NAME]);
    assert_eq!(error.messages, vec!["test timed out after 50ms"]);
    assert_eq!(summary.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn default_timeout_applies_without_test_timeout() {
    let harness = Harness::new().with_options(RunOptions {
        default_timeout: Some(Duration::from_secs(1)),
        ..Default::default()
    });
    let test = RunnableTest::from_fn(descriptor(test_chain("class", "method", "slow")), |_cx| {
        async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(InvocationOutcome::Completed)
        }
    });

    run(&harness, TestPacket::new(test)).await;

    assert_eq!(failure(&harness.events()).cause, FailureCause::Timeout);
}

#[tokio::test]
async fn panicking_body_fails() {
    let harness = Harness::new();
    let test = RunnableTest::from_fn(descriptor(test_chain("class", "method", "test")), |_cx| {
        async {
            let rows: Vec<u32> = Vec::new();
            assert!(!rows.is_empty(), "no rows were returned");
            Ok(InvocationOutcome::Completed)
        }
    });

    let summary = run(&harness, TestPacket::new(test)).await;

    let error = failure(&harness.events());
    assert_eq!(error.cause, FailureCause::Panic);
    assert_eq!(error.types, vec![TestError::PANIC_TYPE_NAME]);
    assert_eq!(error.messages, vec!["no rows were returned"]);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn body_panicking_before_its_future_is_polled_fails() {
    let harness = Harness::new();
    let test = RunnableTest::from_fn(descriptor(test_chain("class", "method", "test")), |_cx| {
        let rows: Vec<u32> = Vec::new();
        let first = rows[0];
        async move {
            assert_eq!(first, 1);
            Ok(InvocationOutcome::Completed)
        }
    });

    let summary = run(&harness, TestPacket::new(test)).await;

    assert_eq!(
        harness.names(),
        vec!["test-starting", "test-failed", "test-finished"]
    );
    let error = failure(&harness.events());
    assert_eq!(error.cause, FailureCause::Panic);
    assert!(
        error.messages[0].starts_with("index out of bounds"),
        "unexpected message: {}",
        error.messages[0]
    );
    assert_eq!(summary.failed, 1);
}

/// A hook that panics while building its `before` future.
struct UnconfiguredHook;

impl BeforeAfterTestHook for UnconfiguredHook {
    fn before<'a>(
        &'a self,
        _test: &'a TestDescriptor,
        _cx: &'a TestContext,
    ) -> BoxFuture<'a, Result<(), TestError>> {
        let config: Option<&str> = None;
        let config = config.expect("hook configuration is loaded");
        Box::pin(async move {
            assert!(!config.is_empty());
            Ok(())
        })
    }
}

#[tokio::test]
async fn hook_panicking_before_its_future_is_polled_is_paired() {
    let harness = Harness::new();
    let log = CallLog::default();
    let info = ScopeInfo::new(class_chain("class"), "class")
        .with_hook(LoggingHook::new("outer", &log))
        .with_hook(UnconfiguredHook);
    let packet = TestPacket::with_scope(
        database_test(test_chain("class", "method", "test"), &log),
        &InheritedScope::new().extend(&info),
    );

    let summary = run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "test-class-construction-starting",
            "test-class-construction-finished",
            "before-test-starting",
            "before-test-finished",
            "before-test-starting",
            "before-test-finished",
            "after-test-starting",
            "after-test-finished",
            "test-class-dispose-starting",
            "test-class-dispose-finished",
            "test-failed",
            "test-finished",
        ]
    );
    assert_eq!(
        log.entries(),
        vec!["construct", "before:outer", "after:outer", "dispose"]
    );
    let error = failure(&harness.events());
    assert_eq!(error.types, vec![TestError::PANIC_TYPE_NAME]);
    assert_eq!(error.messages, vec!["hook configuration is loaded"]);
    assert_eq!(summary.failed, 1);
}

/// A test class instance whose disposer panics while building its future.
struct ClosedPool;

impl AsyncDispose for ClosedPool {
    fn dispose(&mut self) -> BoxFuture<'_, Result<(), TestError>> {
        panic!("pool was already closed")
    }
}

#[tokio::test]
async fn disposer_panicking_before_its_future_is_polled_fails() {
    let harness = Harness::new();
    let test = RunnableTest::new(
        descriptor(test_chain("class", "method", "test")),
        instance_fn::<ClosedPool, _>(|_pool, _cx| {
            Box::pin(async { Ok(InvocationOutcome::Completed) })
        }),
    )
    .with_class(|_args: &Arguments| -> Result<TestInstance, TestError> {
        Ok(TestInstance::disposable(ClosedPool))
    });

    let summary = run(&harness, TestPacket::new(test)).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "test-class-construction-starting",
            "test-class-construction-finished",
            "test-class-dispose-starting",
            "test-class-dispose-finished",
            "test-failed",
            "test-finished",
        ]
    );
    assert_eq!(
        failure(&harness.events()).messages,
        vec!["pool was already closed"]
    );
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn body_can_request_skip() {
    let harness = Harness::new();
    let log = CallLog::default();
    let test = RunnableTest::from_fn(descriptor(test_chain("class", "method", "test")), |_cx| {
        async { Ok(InvocationOutcome::SkipRequested("no GPU available".to_owned())) }
    });
    let packet = with_hooks(test, vec![LoggingHook::new("hook", &log)]);

    let summary = run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "before-test-starting",
            "before-test-finished",
            "after-test-starting",
            "after-test-finished",
            "test-skipped",
            "test-finished",
        ]
    );
    match &harness.events()[5].kind {
        ExecutionEventKind::TestSkipped { reason, .. } => assert_eq!(reason, "no GPU available"),
        other => panic!("expected test-skipped, found {other:?}"),
    }
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn body_skip_keeps_construction_hook_and_dispose_brackets() {
    let harness = Harness::new();
    let log = CallLog::default();
    let test = database_test_with_outcome(
        test_chain("class", "method", "test"),
        &log,
        InvocationOutcome::SkipRequested("replica is read-only".to_owned()),
    );
    let packet = with_hooks(test, vec![LoggingHook::new("hook", &log)]);

    let summary = run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "test-class-construction-starting",
            "test-class-construction-finished",
            "before-test-starting",
            "before-test-finished",
            "after-test-starting",
            "after-test-finished",
            "test-class-dispose-starting",
            "test-class-dispose-finished",
            "test-skipped",
            "test-finished",
        ]
    );
    assert_eq!(
        log.entries(),
        vec!["construct", "before:hook", "body", "after:hook", "dispose"]
    );
    match &harness.events()[9].kind {
        ExecutionEventKind::TestSkipped { reason, .. } => {
            assert_eq!(reason, "replica is read-only");
        }
        other => panic!("expected test-skipped, found {other:?}"),
    }
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn body_skip_with_failing_after_hook_fails_with_hook_error() {
    let harness = Harness::new();
    let log = CallLog::default();
    let test = database_test_with_outcome(
        test_chain("class", "method", "test"),
        &log,
        InvocationOutcome::SkipRequested("replica is read-only".to_owned()),
    );
    let packet = with_hooks(test, vec![LoggingHook::new("hook", &log).failing_after()]);

    let summary = run(&harness, packet).await;

    assert_eq!(
        log.entries(),
        vec!["construct", "before:hook", "body", "after:hook", "dispose"]
    );
    let error = failure(&harness.events());
    assert_eq!(error.types, vec!["HookFailure"]);
    assert_eq!(error.parent_indices, vec![-1]);
    assert_eq!(error.messages, vec!["after hook hook failed"]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
}

#[tokio::test]
async fn static_skip_reason_skips_without_running() {
    let harness = Harness::new();
    let log = CallLog::default();
    let test = RunnableTest::from_fn(
        descriptor(test_chain("class", "method", "test")).with_skip_reason("flaky on CI"),
        |_cx| async { Ok(InvocationOutcome::Completed) },
    );
    let packet = with_hooks(test, vec![LoggingHook::new("hook", &log)]);

    let summary = run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec!["test-starting", "test-skipped", "test-finished"]
    );
    assert!(log.entries().is_empty());
    assert_eq!(run_info(&harness.events()).time, Duration::ZERO);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_skip_reason_wins_over_enclosing_scope() {
    let harness = Harness::new();
    let test = RunnableTest::from_fn(
        descriptor(test_chain("class", "method", "test")).with_skip_reason("flaky on CI"),
        |_cx| async { Ok(InvocationOutcome::Completed) },
    );
    let class = ScopeInfo::new(class_chain("class"), "class").with_skip_reason("class disabled");
    let packet = TestPacket::with_scope(test, &InheritedScope::new().extend(&class));

    let summary = run(&harness, packet).await;

    match &harness.events()[1].kind {
        ExecutionEventKind::TestSkipped { reason, .. } => assert_eq!(reason, "flaky on CI"),
        other => panic!("expected test-skipped, found {other:?}"),
    }
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn skip_condition_is_evaluated_before_construction() {
    let harness = Harness::new();
    let log = CallLog::default();
    let test = database_test(test_chain("class", "method", "test"), &log).with_skip_condition(
        SkipCondition::unless("requires a database", || Ok(false)),
    );

    let summary = run(&harness, TestPacket::new(test)).await;

    assert_eq!(
        harness.names(),
        vec!["test-starting", "test-skipped", "test-finished"]
    );
    assert!(log.entries().is_empty());
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn skip_condition_that_fails_fails_the_test() {
    let harness = Harness::new();
    let log = CallLog::default();
    let test = database_test(test_chain("class", "method", "test"), &log).with_skip_condition(
        SkipCondition::when("running on CI", || {
            Err(TestError::new("EnvironmentError", "CI is not set"))
        }),
    );

    let summary = run(&harness, TestPacket::new(test)).await;

    assert_eq!(
        harness.names(),
        vec!["test-starting", "test-failed", "test-finished"]
    );
    assert!(log.entries().is_empty());
    assert_eq!(failure(&harness.events()).types, vec!["EnvironmentError"]);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn inherited_errors_fail_without_construction() {
    let harness = Harness::new();
    let log = CallLog::default();
    let mut aggregator = ExceptionAggregator::new();
    aggregator.add(TestError::new("FixtureFailure", "collection fixture failed"));

    let summary = TestRunner::new(&harness.bus, &harness.options)
        .run(
            TestPacket::new(database_test(test_chain("class", "method", "test"), &log)),
            aggregator,
        )
        .await;

    assert_eq!(
        harness.names(),
        vec!["test-starting", "test-failed", "test-finished"]
    );
    assert!(log.entries().is_empty());
    assert_eq!(failure(&harness.events()).types, vec!["FixtureFailure"]);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn sink_cancellation_reports_not_run() {
    let harness = Harness::with_sink(RecordingSink::cancel_after(1));
    let log = CallLog::default();
    let packet = with_hooks(
        database_test(test_chain("class", "method", "test"), &log),
        vec![LoggingHook::new("hook", &log)],
    );

    let summary = run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec!["test-starting", "test-not-run", "test-finished"]
    );
    assert!(log.entries().is_empty());
    assert_eq!(
        harness.bus.cancellation().reason(),
        Some(CancelReason::SinkRequested)
    );
    assert_eq!(summary.not_run, 1);
}

#[tokio::test]
async fn cancellation_between_before_hooks_cleans_up_started_work() {
    // The sink refuses the fifth event, the first hook's before-test-finished.
    let harness = Harness::with_sink(RecordingSink::cancel_after(5));
    let log = CallLog::default();
    let packet = with_hooks(
        database_test(test_chain("class", "method", "test"), &log),
        vec![LoggingHook::new("a", &log), LoggingHook::new("b", &log)],
    );

    let summary = run(&harness, packet).await;

    assert_eq!(
        harness.names(),
        vec![
            "test-starting",
            "test-class-construction-starting",
            "test-class-construction-finished",
            "before-test-starting",
            "before-test-finished",
            "after-test-starting",
            "after-test-finished",
            "test-class-dispose-starting",
            "test-class-dispose-finished",
            "test-not-run",
            "test-finished",
        ]
    );
    assert_eq!(
        log.entries(),
        vec!["construct", "before:a", "after:a", "dispose"]
    );
    assert_eq!(summary.not_run, 1);
}

#[tokio::test]
async fn output_and_warnings_are_reported() {
    let harness = Harness::new();
    let test = RunnableTest::from_fn(descriptor(test_chain("class", "method", "test")), |cx| {
        async move {
            cx.write_line("connecting");
            cx.add_warning("connection pool is nearly exhausted");
            Ok(InvocationOutcome::Completed)
        }
    });

    run(&harness, TestPacket::new(test)).await;

    let events = harness.events();
    match &events[1].kind {
        ExecutionEventKind::TestPassed { info, .. } => {
            assert_eq!(info.output, "connecting\n");
            assert_eq!(info.warnings, vec!["connection pool is nearly exhausted"]);
        }
        other => panic!("expected test-passed, found {other:?}"),
    }
}
