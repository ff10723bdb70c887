// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by cascade.

use camino::Utf8PathBuf;
use cascade_metadata::{ErrorMetadata, FailureCause, UniqueId};
use config::ConfigError;
use std::{any::Any, fmt, time::Duration};
use thiserror::Error;

/// An error recorded while running a test.
///
/// Errors are collected by an [`ExceptionAggregator`](crate::aggregator::ExceptionAggregator) and
/// reported as a flattened tree (see [`TestError::to_metadata`]).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TestError {
    /// An error returned by a test body, hook, constructor or disposer.
    #[error("{message}")]
    Raised {
        /// The type name of the error.
        type_name: String,

        /// The error message.
        message: String,

        /// A stack trace, if one was captured.
        stack_trace: Option<String>,

        /// The error that caused this one, if any.
        #[source]
        source: Option<Box<TestError>>,
    },

    /// A panic was caught.
    #[error("{message}")]
    Panic {
        /// The panic message.
        message: String,
    },

    /// The test did not finish within its timeout.
    #[error("test timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// More than one error was recorded.
    #[error("{} errors occurred:{}", .0.len(), DisplayAggregate(.0))]
    Aggregate(Vec<TestError>),
}

impl TestError {
    /// The type name reported for panics.
    pub const PANIC_TYPE_NAME: &'static str = "panic";

    /// The type name reported for timeouts.
    pub const TIMEOUT_TYPE_NAME: &'static str = "timeout";

    /// The type name reported for aggregates.
    pub const AGGREGATE_TYPE_NAME: &'static str = "aggregate";

    /// The type name reported for sources of a converted error, whose concrete type is not known.
    pub const SOURCE_TYPE_NAME: &'static str = "source";

    /// Creates a new error with the given type name and message.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
            source: None,
        }
    }

    /// Converts a standard error, recording its type name and its chain of sources.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut sources = Vec::new();
        let mut next = error.source();
        while let Some(source) = next {
            sources.push(source.to_string());
            next = source.source();
        }

        // Build the chain from the innermost source outwards.
        let source = sources.into_iter().rev().fold(None, |inner, message| {
            Some(Box::new(TestError::Raised {
                type_name: Self::SOURCE_TYPE_NAME.to_owned(),
                message,
                stack_trace: None,
                source: inner,
            }))
        });

        Self::Raised {
            type_name: std::any::type_name::<E>().to_owned(),
            message: error.to_string(),
            stack_trace: None,
            source,
        }
    }

    /// Creates an error from a caught panic payload.
    pub fn panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };
        Self::Panic { message }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Attaches a stack trace to a raised error. Other kinds of errors are returned unchanged.
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        if let Self::Raised { stack_trace, .. } = &mut self {
            *stack_trace = Some(trace.into());
        }
        self
    }

    /// Attaches a source to a raised error. Other kinds of errors are returned unchanged.
    pub fn with_source(mut self, error: TestError) -> Self {
        if let Self::Raised { source, .. } = &mut self {
            *source = Some(Box::new(error));
        }
        self
    }

    /// Returns the type name reported for this error.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Raised { type_name, .. } => type_name,
            Self::Panic { .. } => Self::PANIC_TYPE_NAME,
            Self::Timeout { .. } => Self::TIMEOUT_TYPE_NAME,
            Self::Aggregate(_) => Self::AGGREGATE_TYPE_NAME,
        }
    }

    /// Returns the message for this error, without any nested errors.
    pub fn message(&self) -> String {
        match self {
            Self::Raised { message, .. } | Self::Panic { message } => message.clone(),
            Self::Timeout { .. } | Self::Aggregate(_) => self.to_string(),
        }
    }

    /// Returns the errors nested directly below this one.
    pub fn children(&self) -> Vec<&TestError> {
        match self {
            Self::Raised { source, .. } => source.iter().map(|s| &**s).collect(),
            Self::Aggregate(errors) => errors.iter().collect(),
            Self::Panic { .. } | Self::Timeout { .. } => Vec::new(),
        }
    }

    /// Returns the broad reason for the failure.
    ///
    /// For aggregates this is the cause of the first error recorded.
    pub fn failure_cause(&self) -> FailureCause {
        match self {
            Self::Raised { .. } => FailureCause::Error,
            Self::Panic { .. } => FailureCause::Panic,
            Self::Timeout { .. } => FailureCause::Timeout,
            Self::Aggregate(errors) => errors
                .first()
                .map_or(FailureCause::Error, TestError::failure_cause),
        }
    }

    /// Flattens this error into a tree suitable for reporting.
    ///
    /// Entries are listed in depth-first pre-order; this error is the root with parent index -1.
    pub fn to_metadata(&self) -> ErrorMetadata {
        fn flatten(error: &TestError, parent: Option<usize>, out: &mut ErrorMetadata) {
            let stack_trace = match error {
                TestError::Raised { stack_trace, .. } => stack_trace.clone(),
                _ => None,
            };
            let index = out.push(parent, error.type_name(), error.message(), stack_trace);
            for child in error.children() {
                flatten(child, Some(index), out);
            }
        }

        let mut metadata = ErrorMetadata::new(self.failure_cause());
        flatten(self, None, &mut metadata);
        metadata
    }
}

struct DisplayAggregate<'a>(&'a [TestError]);

impl fmt::Display for DisplayAggregate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in self.0 {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

/// A fatal error raised by a runner before any of its tests started.
///
/// Setup errors are returned to the caller instead of being folded into a test result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SetupError {
    /// A test was handed to the runner for a method it doesn't belong to.
    #[error("test `{test}` belongs to method {}, not `{expected}`", DisplayMethod(.actual.as_ref()))]
    ForeignTest {
        /// The test's ID.
        test: UniqueId,

        /// The ID of the method being run.
        expected: UniqueId,

        /// The method ID recorded in the test's identity chain.
        actual: Option<UniqueId>,
    },

    /// Resolving the arguments for a test failed.
    #[error("failed to resolve arguments for test `{test}`")]
    ArgumentResolution {
        /// The test's ID.
        test: UniqueId,

        /// The underlying error.
        #[source]
        error: TestError,
    },
}

struct DisplayMethod<'a>(Option<&'a UniqueId>);

impl fmt::Display for DisplayMethod<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "`{id}`"),
            None => f.write_str("(none)"),
        }
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse cascade config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The default profile is missing a key that must be set there.
    #[error("default profile is missing required key `{key}`")]
    MissingDefaultKey {
        /// The missing key.
        key: &'static str,
    },
}

/// An error which indicates that a profile was requested but is not defined.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// An error that occurred while setting up logging.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogInitError {
    /// The log environment variable wasn't valid UTF-8.
    #[error("{var} is not valid UTF-8")]
    NotUtf8 {
        /// The name of the environment variable.
        var: &'static str,
    },

    /// The log environment variable couldn't be parsed as a filter.
    #[error("unable to parse {var}")]
    Parse {
        /// The name of the environment variable.
        var: &'static str,

        /// The underlying error.
        #[source]
        error: tracing_subscriber::filter::ParseError,
    },
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: std::error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
