// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{cancellation::CancellationContext, list::Arguments, list::TestDescriptor};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// The context a test body and its hooks run with.
///
/// Cloning a context is cheap: clones share the same output and warnings.
#[derive(Clone)]
pub struct TestContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    descriptor: TestDescriptor,
    arguments: Arguments,
    cancellation: CancellationContext,
    captured: Mutex<Captured>,
}

#[derive(Default)]
struct Captured {
    output: String,
    warnings: Vec<String>,
}

impl TestContext {
    pub(crate) fn new(
        descriptor: TestDescriptor,
        arguments: Arguments,
        cancellation: CancellationContext,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                descriptor,
                arguments,
                cancellation,
                captured: Mutex::new(Captured::default()),
            }),
        }
    }

    /// Returns the descriptor of the running test.
    pub fn descriptor(&self) -> &TestDescriptor {
        &self.inner.descriptor
    }

    /// Returns the arguments for the test body.
    pub fn arguments(&self) -> &Arguments {
        &self.inner.arguments
    }

    /// Returns the cancellation context for the run.
    pub fn cancellation(&self) -> &CancellationContext {
        &self.inner.cancellation
    }

    /// Returns true if the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Appends a line to the test's output.
    pub fn write_line(&self, line: impl AsRef<str>) {
        let mut captured = self.lock();
        captured.output.push_str(line.as_ref());
        captured.output.push('\n');
    }

    /// Adds a warning. Warnings are reported with the test's result.
    pub fn add_warning(&self, warning: impl Into<String>) {
        self.lock().warnings.push(warning.into());
    }

    /// Returns the output written so far.
    pub fn output(&self) -> String {
        self.lock().output.clone()
    }

    /// Returns the warnings added so far.
    pub fn warnings(&self) -> Vec<String> {
        self.lock().warnings.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Captured> {
        self.inner
            .captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("test", &self.inner.descriptor.chain)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
