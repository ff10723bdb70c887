// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ArgumentResolver, BeforeAfterTestHook, RunnableTest};
use crate::aggregator::ExceptionAggregator;
use cascade_metadata::{IdentityChain, Traits};
use debug_ignore::DebugIgnore;
use std::sync::Arc;

/// A shared handle to a hook.
pub type HookRef = Arc<dyn BeforeAfterTestHook>;

/// What a group in the hierarchy knows about itself.
#[derive(Clone, Debug)]
pub struct ScopeInfo {
    /// The identity chain of the group, down to its own level.
    pub chain: IdentityChain,

    /// The display name of the group.
    pub name: String,

    /// Traits attached at this level.
    pub traits: Traits,

    /// Hooks attached at this level, in declaration order.
    pub hooks: DebugIgnore<Vec<HookRef>>,

    /// If set, every test below this level is skipped with this reason.
    pub skip_reason: Option<String>,
}

impl ScopeInfo {
    /// Creates a new scope with no traits or hooks.
    pub fn new(chain: IdentityChain, name: impl Into<String>) -> Self {
        Self {
            chain,
            name: name.into(),
            traits: Traits::new(),
            hooks: DebugIgnore(Vec::new()),
            skip_reason: None,
        }
    }

    /// Adds a trait at this level.
    pub fn with_trait(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.traits.add(key, value);
        self
    }

    /// Adds a hook at this level.
    pub fn with_hook(mut self, hook: impl BeforeAfterTestHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Skips every test below this level.
    pub fn with_skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }
}

/// The state accumulated from enclosing scopes and handed down to inner runners.
#[derive(Clone, Debug, Default)]
pub struct InheritedScope {
    /// Traits merged across enclosing scopes, outermost first.
    pub traits: Traits,

    /// Hooks from enclosing scopes, outermost first.
    pub hooks: DebugIgnore<Vec<HookRef>>,

    /// The innermost skip reason set by an enclosing scope.
    pub skip_reason: Option<String>,

    /// Errors recorded by enclosing scopes. Every test below starts with a copy of these, and
    /// fails without being constructed if any are present.
    pub errors: ExceptionAggregator,
}

impl InheritedScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scope seen by the children of `info`.
    pub fn extend(&self, info: &ScopeInfo) -> Self {
        let mut hooks = self.hooks.0.clone();
        hooks.extend(info.hooks.iter().cloned());
        Self {
            traits: Traits::merged([&self.traits, &info.traits]),
            hooks: DebugIgnore(hooks),
            skip_reason: info
                .skip_reason
                .clone()
                .or_else(|| self.skip_reason.clone()),
            errors: self.errors.clone(),
        }
    }
}

/// A test method and the tests produced for it.
#[derive(Clone, Debug)]
pub struct TestMethodGroup {
    /// The method's scope. Its chain must identify the method.
    pub info: ScopeInfo,

    /// The tests to run, in order.
    pub tests: Vec<RunnableTest>,

    /// Resolves the arguments for each test before any of them runs.
    pub resolver: Option<DebugIgnore<Arc<dyn ArgumentResolver>>>,
}

impl TestMethodGroup {
    /// Creates a new method group.
    pub fn new(info: ScopeInfo, tests: Vec<RunnableTest>) -> Self {
        Self {
            info,
            tests,
            resolver: None,
        }
    }

    /// Sets the argument resolver.
    pub fn with_resolver(mut self, resolver: impl ArgumentResolver + 'static) -> Self {
        self.resolver = Some(DebugIgnore(Arc::new(resolver)));
        self
    }
}

/// A test class and its methods.
#[derive(Clone, Debug)]
pub struct TestClassGroup {
    /// The class's scope.
    pub info: ScopeInfo,

    /// The methods to run, in order.
    pub methods: Vec<TestMethodGroup>,
}

/// A test collection and its classes.
#[derive(Clone, Debug)]
pub struct TestCollectionGroup {
    /// The collection's scope.
    pub info: ScopeInfo,

    /// The classes to run, in order.
    pub classes: Vec<TestClassGroup>,
}

/// A test assembly and its collections.
#[derive(Clone, Debug)]
pub struct TestAssembly {
    /// The assembly's scope.
    pub info: ScopeInfo,

    /// The collections to run, in order.
    pub collections: Vec<TestCollectionGroup>,
}
