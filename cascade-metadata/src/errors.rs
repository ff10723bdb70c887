// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::ExplicitOption;
use thiserror::Error;

/// An error that occurs while parsing an [`ExplicitOption`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for explicit: {input}\n(known values: {})",
    ExplicitOption::variants().join(", "),
)]
pub struct ExplicitOptionParseError {
    input: String,
}

impl ExplicitOptionParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}
