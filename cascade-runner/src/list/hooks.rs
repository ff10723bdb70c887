// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestDescriptor;
use crate::{errors::TestError, runner::TestContext};
use futures::future::BoxFuture;

/// A hook that runs before and after each test it applies to.
///
/// Hooks can be attached at any level of the hierarchy. A test runs the hooks from every enclosing
/// scope, outermost first; `after` runs in reverse order, and only for hooks whose `before`
/// succeeded.
pub trait BeforeAfterTestHook: Send + Sync {
    /// The name reported in hook events. Defaults to the hook's type name, without its path.
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>()).to_owned()
    }

    /// Runs before the test body.
    fn before<'a>(
        &'a self,
        test: &'a TestDescriptor,
        cx: &'a TestContext,
    ) -> BoxFuture<'a, Result<(), TestError>> {
        let _ = (test, cx);
        Box::pin(futures::future::ok::<(), TestError>(()))
    }

    /// Runs after the test body.
    fn after<'a>(
        &'a self,
        test: &'a TestDescriptor,
        cx: &'a TestContext,
    ) -> BoxFuture<'a, Result<(), TestError>> {
        let _ = (test, cx);
        Box::pin(futures::future::ok::<(), TestError>(()))
    }
}

/// Strips the module path from a type name, keeping any generic arguments as they are.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base_end = full.find('<').unwrap_or(full.len());
    let start = full[..base_end].rfind("::").map_or(0, |index| index + 2);
    &full[start..]
}
