// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The runners.
//!
//! Runners form a hierarchy: a [`TestAssemblyRunner`] runs collections through a
//! [`TestCollectionRunner`], which runs classes through a [`TestClassRunner`], which runs methods
//! through a [`TestMethodRunner`], which runs each test through a [`TestRunner`]. Every runner
//! returns the [`RunSummary`](cascade_metadata::RunSummary) of the tests it ran.

mod context;
mod group_runner;
mod method_runner;
mod test_runner;

pub use context::*;
pub use group_runner::*;
pub use method_runner::*;
pub use test_runner::*;

use crate::list::{HookRef, InheritedScope, RunnableTest};
use cascade_metadata::{ExplicitOption, Traits};
use debug_ignore::DebugIgnore;
use std::time::Duration;

/// Runner-side options for a run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunOptions {
    /// Which tests run with respect to their explicit flag.
    pub explicit: ExplicitOption,

    /// The timeout for tests that don't set one. `None` means no timeout.
    pub default_timeout: Option<Duration>,
}

/// A test along with the state inherited from its enclosing scopes.
#[derive(Clone, Debug)]
pub struct TestPacket {
    /// The test to run.
    pub test: RunnableTest,

    /// The hooks that apply to the test, outermost first.
    pub hooks: DebugIgnore<Vec<HookRef>>,

    /// Traits merged from the test's enclosing scopes.
    pub traits: Traits,

    /// The innermost skip reason set by an enclosing scope. The test's own skip reason, if any,
    /// takes precedence over it.
    pub skip_reason: Option<String>,
}

impl TestPacket {
    /// Creates a packet with no inherited state.
    pub fn new(test: RunnableTest) -> Self {
        Self {
            test,
            hooks: DebugIgnore(Vec::new()),
            traits: Traits::new(),
            skip_reason: None,
        }
    }

    /// Creates a packet inheriting hooks, traits and skip reason from `scope`.
    pub fn with_scope(test: RunnableTest, scope: &InheritedScope) -> Self {
        Self {
            test,
            hooks: scope.hooks.clone(),
            traits: scope.traits.clone(),
            skip_reason: scope.skip_reason.clone(),
        }
    }
}
