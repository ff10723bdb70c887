// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collects errors raised while running a scope, so that cleanup can carry on after a failure.

use crate::errors::TestError;
use futures::FutureExt;
use std::{future::Future, panic::AssertUnwindSafe};

/// Accumulates the errors recorded in one execution scope.
///
/// Errors are kept in arrival order. Operations run through [`record`](Self::record) or
/// [`record_async`](Self::record_async) never propagate a failure to the caller: an error or a
/// panic is appended here, and the caller moves on to its next stage.
#[derive(Clone, Debug, Default)]
pub struct ExceptionAggregator {
    errors: Vec<TestError>,
}

impl ExceptionAggregator {
    /// Creates a new, empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation`, recording any error or panic it produces.
    ///
    /// Returns `Some` with the operation's value on success, `None` otherwise.
    pub fn record<T>(&mut self, operation: impl FnOnce() -> Result<T, TestError>) -> Option<T> {
        match std::panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                self.add(error);
                None
            }
            Err(payload) => {
                self.add(TestError::panic(payload));
                None
            }
        }
    }

    /// Awaits `future`, recording any error or panic it produces.
    ///
    /// Returns `Some` with the future's value on success, `None` otherwise.
    pub async fn record_async<T>(
        &mut self,
        future: impl Future<Output = Result<T, TestError>>,
    ) -> Option<T> {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                self.add(error);
                None
            }
            Err(payload) => {
                self.add(TestError::panic(payload));
                None
            }
        }
    }

    /// Appends an error.
    pub fn add(&mut self, error: TestError) {
        self.errors.push(error);
    }

    /// Appends every error recorded by `other`, in order.
    pub fn aggregate(&mut self, other: ExceptionAggregator) {
        self.errors.extend(other.errors);
    }

    /// Returns true if at least one error was recorded.
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the errors recorded so far.
    pub fn errors(&self) -> &[TestError] {
        &self.errors
    }

    /// Returns the recorded errors as a single error.
    ///
    /// This is `None` if nothing was recorded, the error itself if exactly one was recorded, and a
    /// [`TestError::Aggregate`] otherwise.
    pub fn to_error(&self) -> Option<TestError> {
        match self.errors.as_slice() {
            [] => None,
            [error] => Some(error.clone()),
            errors => Some(TestError::Aggregate(errors.to_vec())),
        }
    }

    /// Removes every recorded error.
    pub fn clear(&mut self) {
        self.errors.clear();
    }
}
