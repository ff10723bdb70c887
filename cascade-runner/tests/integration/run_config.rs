// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use cascade_metadata::{IdentityChain, TestStatus};
use cascade_runner::{
    cancellation::CancellationContext,
    config::RunnerConfig,
    list::{
        InvocationOutcome, RunnableTest, ScopeInfo, TestAssembly, TestClassGroup,
        TestCollectionGroup, TestMethodGroup,
    },
    reporter::{
        ExecutionEventKind, ExecutionSink, LongRunningTestsSummary, MessageBus, RecordingSink,
    },
    runner::TestAssemblyRunner,
};
use camino_tempfile::Utf8TempDir;
use color_eyre::Result;
use debug_ignore::DebugIgnore;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

fn write_config(dir: &Utf8TempDir, contents: &str) -> Result<()> {
    let config_dir = dir.path().join(".config");
    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(config_dir.join("cascade.toml"), contents)?;
    Ok(())
}

fn warning_test(chain: IdentityChain) -> RunnableTest {
    RunnableTest::from_fn(descriptor(chain), |cx| async move {
        cx.add_warning("deprecated API used");
        Ok(InvocationOutcome::Completed)
    })
}

fn assembly() -> TestAssembly {
    single_method_assembly(vec![
        passing_test(test_chain("alpha", "reads", "regular")),
        RunnableTest::from_fn(
            descriptor(test_chain("alpha", "reads", "manual")).with_explicit(true),
            |_cx| async { Ok(InvocationOutcome::Completed) },
        ),
        warning_test(test_chain("alpha", "reads", "noisy")),
    ])
}

fn single_method_assembly(tests: Vec<RunnableTest>) -> TestAssembly {
    TestAssembly {
        info: ScopeInfo::new(IdentityChain::for_assembly(ASSEMBLY), ASSEMBLY),
        collections: vec![TestCollectionGroup {
            info: ScopeInfo::new(
                IdentityChain::for_assembly(ASSEMBLY).with_collection(COLLECTION),
                COLLECTION,
            ),
            classes: vec![TestClassGroup {
                info: ScopeInfo::new(class_chain("alpha"), "alpha"),
                methods: vec![TestMethodGroup::new(
                    ScopeInfo::new(method_chain("alpha", "reads"), "reads"),
                    tests,
                )],
            }],
        }],
    }
}

async fn run_profile(config: &RunnerConfig, profile: &str) -> Result<Vec<(String, TestStatus)>> {
    let profile = config.profile(profile)?;
    let cancellation = CancellationContext::new();
    let recording = Arc::new(RecordingSink::new());
    let sink = ExecutionSink::new(
        recording.clone(),
        profile.execution_sink_options(),
        cancellation.clone(),
    );
    let bus = MessageBus::new(Arc::new(sink), cancellation);
    let options = profile.run_options();

    TestAssemblyRunner::new(&bus, &options)
        .run(&assembly())
        .await?;

    Ok(recording
        .events()
        .into_iter()
        .filter_map(|event| {
            let status = event.kind.test_status()?;
            Some((event.chain().leaf_id().to_string(), status))
        })
        .collect())
}

#[tokio::test]
async fn profiles_control_the_run() -> Result<()> {
    let dir = camino_tempfile::tempdir()?;
    write_config(
        &dir,
        indoc! {r#"
            [profile.default]
            default-timeout = "30s"

            [profile.ci]
            explicit = "on"
            fail-warn = true
        "#},
    )?;
    let config = RunnerConfig::from_sources(dir.path(), None)?;

    assert_eq!(
        config.profile("default")?.run_options().default_timeout,
        Some(Duration::from_secs(30))
    );
    assert_eq!(
        run_profile(&config, "default").await?,
        vec![
            ("regular".to_owned(), TestStatus::Passed),
            ("manual".to_owned(), TestStatus::NotRun),
            ("noisy".to_owned(), TestStatus::Passed),
        ]
    );
    assert_eq!(
        run_profile(&config, "ci").await?,
        vec![
            ("regular".to_owned(), TestStatus::Passed),
            ("manual".to_owned(), TestStatus::Passed),
            ("noisy".to_owned(), TestStatus::Failed),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn fail_warn_counts_against_enclosing_scopes() -> Result<()> {
    let dir = camino_tempfile::tempdir()?;
    write_config(
        &dir,
        indoc! {r#"
            [profile.default]
            fail-warn = true
        "#},
    )?;
    let config = RunnerConfig::from_sources(dir.path(), None)?;
    let profile = config.profile(RunnerConfig::DEFAULT_PROFILE)?;

    let cancellation = CancellationContext::new();
    let recording = Arc::new(RecordingSink::new());
    let sink = Arc::new(ExecutionSink::new(
        recording.clone(),
        profile.execution_sink_options(),
        cancellation.clone(),
    ));
    let bus = MessageBus::new(sink.clone(), cancellation);
    let options = profile.run_options();

    let summary = TestAssemblyRunner::new(&bus, &options)
        .run(&assembly())
        .await?;
    assert_eq!(summary.failed, 0, "runner summaries are unconverted");

    let failed_by_level: Vec<_> = recording
        .events()
        .into_iter()
        .filter_map(|event| match event.kind {
            ExecutionEventKind::TestMethodFinished { summary, .. } => Some(("method", summary)),
            ExecutionEventKind::TestClassFinished { summary, .. } => Some(("class", summary)),
            ExecutionEventKind::TestAssemblyFinished { summary, .. } => {
                Some(("assembly", summary))
            }
            _ => None,
        })
        .map(|(level, summary)| (level, summary.failed))
        .collect();
    assert_eq!(
        failed_by_level,
        vec![("method", 1), ("class", 1), ("assembly", 1)]
    );
    assert_eq!(
        sink.summary().map(|summary| summary.summary.failed),
        Some(1)
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn long_running_tests_are_reported_during_the_run() -> Result<()> {
    let dir = camino_tempfile::tempdir()?;
    write_config(
        &dir,
        indoc! {r#"
            [profile.default]
            long-running-test-time = "10s"
        "#},
    )?;
    let config = RunnerConfig::from_sources(dir.path(), None)?;
    let profile = config.profile(RunnerConfig::DEFAULT_PROFILE)?;

    let detected = Arc::new(Mutex::new(Vec::new()));
    let mut sink_options = profile.execution_sink_options();
    sink_options.long_running_test_callback = Some(DebugIgnore(Box::new({
        let detected = detected.clone();
        move |summary: &LongRunningTestsSummary| {
            let mut detected = detected.lock().unwrap();
            detected.extend(summary.tests.iter().map(|test| test.name.clone()));
        }
    })));

    let cancellation = CancellationContext::new();
    let sink = Arc::new(ExecutionSink::new(
        Arc::new(RecordingSink::new()),
        sink_options,
        cancellation.clone(),
    ));
    let bus = MessageBus::new(sink.clone(), cancellation);
    let options = profile.run_options();

    let assembly = single_method_assembly(vec![
        passing_test(test_chain("alpha", "reads", "quick")),
        RunnableTest::from_fn(
            descriptor(test_chain("alpha", "reads", "slow")),
            |_cx| async {
                tokio::time::sleep(Duration::from_secs(15)).await;
                Ok(InvocationOutcome::Completed)
            },
        ),
    ]);
    let runner = TestAssemblyRunner::new(&bus, &options);
    let (summary, ()) = futures::join!(
        runner.run(&assembly),
        sink.watch_long_running_tests(),
    );

    assert_eq!(summary?.total, 2);
    assert_eq!(*detected.lock().unwrap(), vec!["slow".to_owned()]);

    Ok(())
}
