// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging setup.
//!
//! The runner logs through [`tracing`]. Programs embedding it may install their own subscriber;
//! [`init_logging`] is provided for those that don't.

use crate::errors::LogInitError;
use std::{ffi::OsString, sync::Once};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt};

/// The environment variable used to configure log levels, in `target=level` form.
pub const LOG_ENV: &str = "CASCADE_LOG";

static INIT_LOGGER: Once = Once::new();

/// Installs a global subscriber that logs to standard error.
///
/// Levels are read from [`LOG_ENV`]. If it is unset or empty, events at `info` and above are
/// logged. Only the first successful call installs the subscriber, and nothing is installed if
/// the program already set a global subscriber.
pub fn init_logging() -> Result<(), LogInitError> {
    let targets = parse_targets(std::env::var_os(LOG_ENV))?;

    INIT_LOGGER.call_once(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(targets);

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("a global subscriber is already set, not installing another");
        }
    });

    Ok(())
}

fn parse_targets(value: Option<OsString>) -> Result<Targets, LogInitError> {
    let value = value
        .unwrap_or_default()
        .into_string()
        .map_err(|_| LogInitError::NotUtf8 { var: LOG_ENV })?;

    // If the level string is empty, use the standard level filter instead.
    if value.is_empty() {
        Ok(Targets::new().with_default(LevelFilter::INFO))
    } else {
        value
            .parse()
            .map_err(|error| LogInitError::Parse { var: LOG_ENV, error })
    }
}
