// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RunOptions, TestMethodRunner};
use crate::{
    errors::SetupError,
    list::{InheritedScope, ScopeInfo, TestAssembly, TestClassGroup, TestCollectionGroup},
    reporter::{ExecutionEventKind, MessageBus},
};
use cascade_metadata::{IdentityChain, RunSummary, ScopeLevel, Traits};
use std::future::Future;
use tracing::{debug, instrument};

/// Runs the methods of a test class.
#[derive(Clone, Copy, Debug)]
pub struct TestClassRunner<'a> {
    bus: &'a MessageBus,
    options: &'a RunOptions,
}

impl<'a> TestClassRunner<'a> {
    /// Creates a new runner publishing to `bus`.
    pub fn new(bus: &'a MessageBus, options: &'a RunOptions) -> Self {
        Self { bus, options }
    }

    /// Runs `class` with the state inherited from its enclosing scopes.
    #[instrument(level = "debug", skip_all, fields(class = %class.info.chain))]
    pub async fn run(
        &self,
        class: &TestClassGroup,
        scope: &InheritedScope,
    ) -> Result<RunSummary, SetupError> {
        let runner = TestMethodRunner::new(self.bus, self.options);
        run_group(
            self.bus,
            GroupLevel::Class,
            &class.info,
            scope,
            &class.methods,
            |method, scope| async move { runner.run(method, &scope).await },
        )
        .await
    }
}

/// Runs the classes of a test collection.
#[derive(Clone, Copy, Debug)]
pub struct TestCollectionRunner<'a> {
    bus: &'a MessageBus,
    options: &'a RunOptions,
}

impl<'a> TestCollectionRunner<'a> {
    /// Creates a new runner publishing to `bus`.
    pub fn new(bus: &'a MessageBus, options: &'a RunOptions) -> Self {
        Self { bus, options }
    }

    /// Runs `collection` with the state inherited from the assembly.
    #[instrument(level = "debug", skip_all, fields(collection = %collection.info.chain))]
    pub async fn run(
        &self,
        collection: &TestCollectionGroup,
        scope: &InheritedScope,
    ) -> Result<RunSummary, SetupError> {
        let runner = TestClassRunner::new(self.bus, self.options);
        run_group(
            self.bus,
            GroupLevel::Collection,
            &collection.info,
            scope,
            &collection.classes,
            |class, scope| async move { runner.run(class, &scope).await },
        )
        .await
    }
}

/// Runs the collections of a test assembly.
///
/// This is the entry point for a complete run.
#[derive(Clone, Copy, Debug)]
pub struct TestAssemblyRunner<'a> {
    bus: &'a MessageBus,
    options: &'a RunOptions,
}

impl<'a> TestAssemblyRunner<'a> {
    /// Creates a new runner publishing to `bus`.
    pub fn new(bus: &'a MessageBus, options: &'a RunOptions) -> Self {
        Self { bus, options }
    }

    /// Runs `assembly`.
    pub async fn run(&self, assembly: &TestAssembly) -> Result<RunSummary, SetupError> {
        self.run_with_scope(assembly, &InheritedScope::new()).await
    }

    /// Runs `assembly`, starting from the given scope.
    ///
    /// Errors recorded in `scope` are inherited by every test, which then fails without being
    /// constructed.
    #[instrument(level = "debug", skip_all, fields(assembly = %assembly.info.chain))]
    pub async fn run_with_scope(
        &self,
        assembly: &TestAssembly,
        scope: &InheritedScope,
    ) -> Result<RunSummary, SetupError> {
        let runner = TestCollectionRunner::new(self.bus, self.options);
        run_group(
            self.bus,
            GroupLevel::Assembly,
            &assembly.info,
            scope,
            &assembly.collections,
            |collection, scope| async move { runner.run(collection, &scope).await },
        )
        .await
    }
}

#[derive(Clone, Copy, Debug)]
enum GroupLevel {
    Assembly,
    Collection,
    Class,
}

impl GroupLevel {
    fn scope_level(self) -> ScopeLevel {
        match self {
            Self::Assembly => ScopeLevel::Assembly,
            Self::Collection => ScopeLevel::Collection,
            Self::Class => ScopeLevel::Class,
        }
    }

    fn starting(self, chain: IdentityChain, name: String, traits: Traits) -> ExecutionEventKind {
        match self {
            Self::Assembly => ExecutionEventKind::TestAssemblyStarting {
                chain,
                name,
                traits,
            },
            Self::Collection => ExecutionEventKind::TestCollectionStarting {
                chain,
                name,
                traits,
            },
            Self::Class => ExecutionEventKind::TestClassStarting {
                chain,
                name,
                traits,
            },
        }
    }

    fn finished(self, chain: IdentityChain, summary: RunSummary) -> ExecutionEventKind {
        match self {
            Self::Assembly => ExecutionEventKind::TestAssemblyFinished { chain, summary },
            Self::Collection => ExecutionEventKind::TestCollectionFinished { chain, summary },
            Self::Class => ExecutionEventKind::TestClassFinished { chain, summary },
        }
    }
}

/// Brackets the children of a group with its starting and finished events.
///
/// Children are run in order until the run is cancelled or a child fails setup. The finished
/// event is published in either case; a setup error is then returned to the caller.
async fn run_group<'c, C, F, Fut>(
    bus: &MessageBus,
    level: GroupLevel,
    info: &ScopeInfo,
    scope: &InheritedScope,
    children: &'c [C],
    mut run_child: F,
) -> Result<RunSummary, SetupError>
where
    F: FnMut(&'c C, InheritedScope) -> Fut,
    Fut: Future<Output = Result<RunSummary, SetupError>>,
{
    let scope = scope.extend(info);
    bus.publish(level.starting(
        info.chain.clone(),
        info.name.clone(),
        scope.traits.clone(),
    ));

    let mut summary = RunSummary::default();
    let mut setup_error = None;
    for child in children {
        if bus.cancellation().is_cancelled() {
            debug!(
                level = %level.scope_level(),
                "run cancelled, not starting further children"
            );
            break;
        }

        match run_child(child, scope.clone()).await {
            Ok(child_summary) => summary += &child_summary,
            Err(error) => {
                debug!(level = %level.scope_level(), %error, "child failed setup");
                setup_error = Some(error);
                break;
            }
        }
    }

    bus.publish(level.finished(info.chain.clone(), summary));
    match setup_error {
        Some(error) => Err(error),
        None => Ok(summary),
    }
}
