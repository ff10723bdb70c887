// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cooperative cancellation of a run.
//!
//! Runners check the [`CancellationContext`] at stage boundaries only: once a stage has started
//! it runs to completion, and cleanup for started work always happens.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Notify;
use tracing::debug;

/// The reason a run was cancelled.
///
/// Variants are ordered by severity: if cancellation is requested more than once, the most severe
/// reason is kept.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum CancelReason {
    /// A test failed and the run is configured to stop on the first failure.
    TestFailure,

    /// An event sink asked for the run to stop.
    SinkRequested,

    /// Cancellation was requested from outside the run.
    External,
}

impl CancelReason {
    /// Returns a short description of this reason.
    pub fn to_static_str(self) -> &'static str {
        match self {
            CancelReason::TestFailure => "test failure",
            CancelReason::SinkRequested => "sink request",
            CancelReason::External => "external request",
        }
    }
}

/// A cloneable handle to the cancellation state of a run.
///
/// Cancellation is monotonic: once cancelled, a context stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancellationContext {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
    notify: Notify,
}

impl CancellationContext {
    /// Creates a new context that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    ///
    /// Returns true if this call escalated the recorded reason.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let escalated = {
            let mut current = self
                .inner
                .reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match *current {
                Some(existing) if existing >= reason => false,
                _ => {
                    *current = Some(reason);
                    true
                }
            }
        };

        if escalated {
            debug!(reason = reason.to_static_str(), "cancellation requested");
        }
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
        escalated
    }

    /// Returns true if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the most severe reason recorded, if cancellation has been requested.
    pub fn reason(&self) -> Option<CancelReason> {
        *self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until cancellation is requested.
    ///
    /// Test bodies can race their work against this future to react to cancellation.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
