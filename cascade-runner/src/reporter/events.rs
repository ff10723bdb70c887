// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use cascade_metadata::{ErrorMetadata, IdentityChain, RunSummary, TestStatus, Traits};
use chrono::{DateTime, FixedOffset};
use std::time::Duration;

/// An execution event.
///
/// Events are produced by the runners in [`runner`](crate::runner) and published to an
/// [`EventSink`](super::EventSink) through a [`MessageBus`](super::MessageBus).
#[derive(Clone, Debug)]
pub struct ExecutionEvent {
    /// The time at which the event was generated, including the offset from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since the message bus was created.
    pub elapsed: Duration,

    /// The kind of event this is.
    pub kind: ExecutionEventKind,
}

impl ExecutionEvent {
    /// Returns the identity chain of the element this event describes.
    pub fn chain(&self) -> &IdentityChain {
        self.kind.chain()
    }

    /// Returns the name of this event's kind.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Timing and captured output for a test that reached a terminal state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestRunInfo {
    /// The time the test started running.
    pub start_time: DateTime<FixedOffset>,

    /// How long the test took. Zero for tests that were skipped or not run before anything was
    /// executed.
    pub time: Duration,

    /// Output written by the test through its context.
    pub output: String,

    /// Warnings added by the test through its context.
    pub warnings: Vec<String>,
}

/// The kind of execution event this is.
///
/// Forms part of [`ExecutionEvent`].
#[derive(Clone, Debug)]
pub enum ExecutionEventKind {
    /// An assembly started.
    TestAssemblyStarting {
        /// The assembly's identity chain.
        chain: IdentityChain,

        /// The assembly's display name.
        name: String,

        /// Traits attached to the assembly.
        traits: Traits,
    },

    /// An assembly finished.
    TestAssemblyFinished {
        /// The assembly's identity chain.
        chain: IdentityChain,

        /// The summary of every test in the assembly.
        summary: RunSummary,
    },

    /// A collection started.
    TestCollectionStarting {
        /// The collection's identity chain.
        chain: IdentityChain,

        /// The collection's display name.
        name: String,

        /// Traits merged from the assembly and the collection.
        traits: Traits,
    },

    /// A collection finished.
    TestCollectionFinished {
        /// The collection's identity chain.
        chain: IdentityChain,

        /// The summary of every test in the collection.
        summary: RunSummary,
    },

    /// A class started.
    TestClassStarting {
        /// The class's identity chain.
        chain: IdentityChain,

        /// The class's display name.
        name: String,

        /// Traits merged from enclosing scopes and the class.
        traits: Traits,
    },

    /// A class finished.
    TestClassFinished {
        /// The class's identity chain.
        chain: IdentityChain,

        /// The summary of every test in the class.
        summary: RunSummary,
    },

    /// A method started.
    TestMethodStarting {
        /// The method's identity chain.
        chain: IdentityChain,

        /// The method's display name.
        name: String,

        /// Traits merged from enclosing scopes and the method.
        traits: Traits,
    },

    /// A method finished.
    TestMethodFinished {
        /// The method's identity chain.
        chain: IdentityChain,

        /// The summary of every test in the method.
        summary: RunSummary,
    },

    /// A test case started.
    TestCaseStarting {
        /// The test case's identity chain.
        chain: IdentityChain,

        /// The test case's display name.
        name: String,
    },

    /// A test case finished.
    TestCaseFinished {
        /// The test case's identity chain.
        chain: IdentityChain,

        /// The summary of every test in the test case.
        summary: RunSummary,
    },

    /// A test started.
    TestStarting {
        /// The test's identity chain.
        chain: IdentityChain,

        /// The test's display name.
        name: String,

        /// Whether the test is explicit.
        explicit: bool,

        /// The effective timeout for the test, if any.
        timeout: Option<Duration>,

        /// Traits merged from enclosing scopes and the test.
        traits: Traits,
    },

    /// Construction of the test class instance started.
    TestClassConstructionStarting {
        /// The test's identity chain.
        chain: IdentityChain,
    },

    /// Construction of the test class instance finished, successfully or not.
    TestClassConstructionFinished {
        /// The test's identity chain.
        chain: IdentityChain,
    },

    /// A before-hook started.
    BeforeTestStarting {
        /// The test's identity chain.
        chain: IdentityChain,

        /// The hook's name.
        hook: String,
    },

    /// A before-hook finished, successfully or not.
    BeforeTestFinished {
        /// The test's identity chain.
        chain: IdentityChain,

        /// The hook's name.
        hook: String,
    },

    /// An after-hook started.
    AfterTestStarting {
        /// The test's identity chain.
        chain: IdentityChain,

        /// The hook's name.
        hook: String,
    },

    /// An after-hook finished, successfully or not.
    AfterTestFinished {
        /// The test's identity chain.
        chain: IdentityChain,

        /// The hook's name.
        hook: String,
    },

    /// Disposal of the test class instance started.
    TestClassDisposeStarting {
        /// The test's identity chain.
        chain: IdentityChain,
    },

    /// Disposal of the test class instance finished, successfully or not.
    TestClassDisposeFinished {
        /// The test's identity chain.
        chain: IdentityChain,
    },

    /// A test passed.
    TestPassed {
        /// The test's identity chain.
        chain: IdentityChain,

        /// Timing and output.
        info: TestRunInfo,
    },

    /// A test failed.
    TestFailed {
        /// The test's identity chain.
        chain: IdentityChain,

        /// Timing and output.
        info: TestRunInfo,

        /// The flattened tree of errors that caused the failure.
        error: ErrorMetadata,
    },

    /// A test was skipped.
    TestSkipped {
        /// The test's identity chain.
        chain: IdentityChain,

        /// Timing and output.
        info: TestRunInfo,

        /// The reason the test was skipped.
        reason: String,
    },

    /// A test was not run.
    TestNotRun {
        /// The test's identity chain.
        chain: IdentityChain,

        /// Timing and output.
        info: TestRunInfo,
    },

    /// A test finished. Always the last event for a test.
    TestFinished {
        /// The test's identity chain.
        chain: IdentityChain,

        /// Timing and output.
        info: TestRunInfo,
    },
}

impl ExecutionEventKind {
    /// Returns the identity chain of the element this event describes.
    pub fn chain(&self) -> &IdentityChain {
        match self {
            Self::TestAssemblyStarting { chain, .. }
            | Self::TestAssemblyFinished { chain, .. }
            | Self::TestCollectionStarting { chain, .. }
            | Self::TestCollectionFinished { chain, .. }
            | Self::TestClassStarting { chain, .. }
            | Self::TestClassFinished { chain, .. }
            | Self::TestMethodStarting { chain, .. }
            | Self::TestMethodFinished { chain, .. }
            | Self::TestCaseStarting { chain, .. }
            | Self::TestCaseFinished { chain, .. }
            | Self::TestStarting { chain, .. }
            | Self::TestClassConstructionStarting { chain }
            | Self::TestClassConstructionFinished { chain }
            | Self::BeforeTestStarting { chain, .. }
            | Self::BeforeTestFinished { chain, .. }
            | Self::AfterTestStarting { chain, .. }
            | Self::AfterTestFinished { chain, .. }
            | Self::TestClassDisposeStarting { chain }
            | Self::TestClassDisposeFinished { chain }
            | Self::TestPassed { chain, .. }
            | Self::TestFailed { chain, .. }
            | Self::TestSkipped { chain, .. }
            | Self::TestNotRun { chain, .. }
            | Self::TestFinished { chain, .. } => chain,
        }
    }

    /// Returns the name of this kind, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TestAssemblyStarting { .. } => "test-assembly-starting",
            Self::TestAssemblyFinished { .. } => "test-assembly-finished",
            Self::TestCollectionStarting { .. } => "test-collection-starting",
            Self::TestCollectionFinished { .. } => "test-collection-finished",
            Self::TestClassStarting { .. } => "test-class-starting",
            Self::TestClassFinished { .. } => "test-class-finished",
            Self::TestMethodStarting { .. } => "test-method-starting",
            Self::TestMethodFinished { .. } => "test-method-finished",
            Self::TestCaseStarting { .. } => "test-case-starting",
            Self::TestCaseFinished { .. } => "test-case-finished",
            Self::TestStarting { .. } => "test-starting",
            Self::TestClassConstructionStarting { .. } => "test-class-construction-starting",
            Self::TestClassConstructionFinished { .. } => "test-class-construction-finished",
            Self::BeforeTestStarting { .. } => "before-test-starting",
            Self::BeforeTestFinished { .. } => "before-test-finished",
            Self::AfterTestStarting { .. } => "after-test-starting",
            Self::AfterTestFinished { .. } => "after-test-finished",
            Self::TestClassDisposeStarting { .. } => "test-class-dispose-starting",
            Self::TestClassDisposeFinished { .. } => "test-class-dispose-finished",
            Self::TestPassed { .. } => "test-passed",
            Self::TestFailed { .. } => "test-failed",
            Self::TestSkipped { .. } => "test-skipped",
            Self::TestNotRun { .. } => "test-not-run",
            Self::TestFinished { .. } => "test-finished",
        }
    }

    /// If this is a terminal test result, returns the status it reports.
    pub fn test_status(&self) -> Option<TestStatus> {
        match self {
            Self::TestPassed { .. } => Some(TestStatus::Passed),
            Self::TestFailed { .. } => Some(TestStatus::Failed),
            Self::TestSkipped { .. } => Some(TestStatus::Skipped),
            Self::TestNotRun { .. } => Some(TestStatus::NotRun),
            _ => None,
        }
    }

    /// If this event finishes a group, returns the group's summary.
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::TestAssemblyFinished { summary, .. }
            | Self::TestCollectionFinished { summary, .. }
            | Self::TestClassFinished { summary, .. }
            | Self::TestMethodFinished { summary, .. }
            | Self::TestCaseFinished { summary, .. } => Some(summary),
            _ => None,
        }
    }

    pub(crate) fn summary_mut(&mut self) -> Option<&mut RunSummary> {
        match self {
            Self::TestAssemblyFinished { summary, .. }
            | Self::TestCollectionFinished { summary, .. }
            | Self::TestClassFinished { summary, .. }
            | Self::TestMethodFinished { summary, .. }
            | Self::TestCaseFinished { summary, .. } => Some(summary),
            _ => None,
        }
    }
}
