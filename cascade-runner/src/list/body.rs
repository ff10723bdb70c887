// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::RunnableTest;
use crate::{errors::TestError, runner::TestContext};
use futures::future::BoxFuture;
use std::{any::Any, fmt, future::Future, marker::PhantomData, sync::Arc};

/// The outcome of a test body that completed without an error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InvocationOutcome {
    /// The body ran to completion.
    Completed,

    /// The body asked for the test to be reported as skipped, with the given reason.
    SkipRequested(String),
}

/// The body of a test.
pub trait TestBody: Send + Sync {
    /// Invokes the test body.
    ///
    /// `instance` is the test class instance, or `None` for static tests.
    fn invoke<'a>(
        &'a self,
        instance: Option<&'a mut TestInstance>,
        cx: &'a TestContext,
    ) -> BoxFuture<'a, Result<InvocationOutcome, TestError>>;
}

/// A [`TestBody`] for a static test, backed by an async function.
///
/// Created by [`RunnableTest::from_fn`].
pub struct AsyncTestBody<F>(pub(crate) F);

impl<F, Fut> TestBody for AsyncTestBody<F>
where
    F: Fn(TestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<InvocationOutcome, TestError>> + Send + 'static,
{
    fn invoke<'a>(
        &'a self,
        _instance: Option<&'a mut TestInstance>,
        cx: &'a TestContext,
    ) -> BoxFuture<'a, Result<InvocationOutcome, TestError>> {
        Box::pin((self.0)(cx.clone()))
    }
}

/// A [`TestBody`] that runs against a test class instance of type `T`.
///
/// Created by [`instance_fn`].
pub struct InstanceTestBody<T, F> {
    f: F,
    _marker: PhantomData<fn(&mut T)>,
}

/// Creates a test body that runs against a test class instance of type `T`.
///
/// The body fails if the test has no instance, or if the instance is not a `T`.
pub fn instance_fn<T, F>(f: F) -> InstanceTestBody<T, F>
where
    T: Any + Send,
    F: for<'a> Fn(&'a mut T, &'a TestContext) -> BoxFuture<'a, Result<InvocationOutcome, TestError>>
        + Send
        + Sync,
{
    InstanceTestBody {
        f,
        _marker: PhantomData,
    }
}

impl<T, F> TestBody for InstanceTestBody<T, F>
where
    T: Any + Send,
    F: for<'a> Fn(&'a mut T, &'a TestContext) -> BoxFuture<'a, Result<InvocationOutcome, TestError>>
        + Send
        + Sync,
{
    fn invoke<'a>(
        &'a self,
        instance: Option<&'a mut TestInstance>,
        cx: &'a TestContext,
    ) -> BoxFuture<'a, Result<InvocationOutcome, TestError>> {
        match instance.and_then(TestInstance::downcast_mut::<T>) {
            Some(this) => (self.f)(this, cx),
            None => Box::pin(futures::future::err::<InvocationOutcome, _>(TestError::new(
                "InstanceMismatch",
                format!(
                    "test requires an instance of `{}`",
                    std::any::type_name::<T>()
                ),
            ))),
        }
    }
}

/// Constructs test class instances.
pub trait TestClass: Send + Sync {
    /// Creates a new instance using the resolved constructor arguments.
    fn construct(&self, arguments: &Arguments) -> Result<TestInstance, TestError>;
}

impl<F> TestClass for F
where
    F: Fn(&Arguments) -> Result<TestInstance, TestError> + Send + Sync,
{
    fn construct(&self, arguments: &Arguments) -> Result<TestInstance, TestError> {
        self(arguments)
    }
}

/// Asynchronous cleanup for a test class instance.
pub trait AsyncDispose: Any + Send {
    /// Disposes of the instance. Called at most once, after every after-hook has run.
    fn dispose(&mut self) -> BoxFuture<'_, Result<(), TestError>>;
}

trait DisposableAny: AsyncDispose {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: AsyncDispose> DisposableAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

enum InstanceValue {
    Plain(Box<dyn Any + Send>),
    Disposable(Box<dyn DisposableAny>),
}

/// An instance of a test class.
pub struct TestInstance {
    value: InstanceValue,
}

impl TestInstance {
    /// Wraps a value that needs no cleanup.
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: InstanceValue::Plain(Box::new(value)),
        }
    }

    /// Wraps a value that is disposed of once the test finishes.
    pub fn disposable<T: AsyncDispose>(value: T) -> Self {
        Self {
            value: InstanceValue::Disposable(Box::new(value)),
        }
    }

    /// Returns true if this instance is disposed of once the test finishes.
    pub fn is_disposable(&self) -> bool {
        matches!(self.value, InstanceValue::Disposable(_))
    }

    /// Returns a mutable reference to the value, if it is a `T`.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        match &mut self.value {
            InstanceValue::Plain(value) => value.downcast_mut(),
            InstanceValue::Disposable(value) => value.as_any_mut().downcast_mut(),
        }
    }

    pub(crate) async fn dispose(&mut self) -> Result<(), TestError> {
        match &mut self.value {
            InstanceValue::Plain(_) => Ok(()),
            InstanceValue::Disposable(value) => value.dispose().await,
        }
    }
}

impl fmt::Debug for TestInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestInstance")
            .field("disposable", &self.is_disposable())
            .finish_non_exhaustive()
    }
}

/// An ordered list of type-erased arguments, passed to constructors and test bodies.
#[derive(Clone, Default)]
pub struct Arguments(Vec<Arc<dyn Any + Send + Sync>>);

impl Arguments {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.0.push(Arc::new(value));
        self
    }

    /// Returns the argument at `index`, if it exists and is a `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.0.get(index)?.downcast_ref()
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Arguments produced by an [`ArgumentResolver`].
#[derive(Clone, Debug, Default)]
pub struct ResolvedArguments {
    /// Arguments for the class constructor.
    pub constructor: Arguments,

    /// Arguments for the test body.
    pub method: Arguments,
}

/// Resolves the arguments for each test of a method before any of them runs.
///
/// A failure is fatal for the whole method: no events are published for it.
pub trait ArgumentResolver: Send + Sync {
    /// Resolves the arguments for `test`.
    fn resolve(&self, test: &RunnableTest) -> Result<ResolvedArguments, TestError>;
}

impl<F> ArgumentResolver for F
where
    F: Fn(&RunnableTest) -> Result<ResolvedArguments, TestError> + Send + Sync,
{
    fn resolve(&self, test: &RunnableTest) -> Result<ResolvedArguments, TestError> {
        self(test)
    }
}
