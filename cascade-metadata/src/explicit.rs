// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::ExplicitOptionParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Controls which tests run with respect to their explicit-run flag.
///
/// Explicit tests are excluded from default runs. A test that is not selected by this option is
/// reported as not run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExplicitOption {
    /// Run only tests that are not marked explicit. This is the default.
    #[default]
    Off,

    /// Run every test, explicit or not.
    On,

    /// Run only tests that are marked explicit.
    Only,
}

impl ExplicitOption {
    /// Returns the list of all known values.
    pub fn variants() -> [&'static str; 3] {
        ["off", "on", "only"]
    }

    /// Returns true if a test with the given explicit flag should run.
    pub fn should_run(self, explicit: bool) -> bool {
        match self {
            Self::Off => !explicit,
            Self::On => true,
            Self::Only => explicit,
        }
    }

    /// Returns the configuration name of this option.
    pub fn to_static_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Only => "only",
        }
    }
}

impl fmt::Display for ExplicitOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_static_str())
    }
}

impl FromStr for ExplicitOption {
    type Err = ExplicitOptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "on" => Ok(Self::On),
            "only" => Ok(Self::Only),
            other => Err(ExplicitOptionParseError::new(other)),
        }
    }
}
