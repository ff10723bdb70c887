// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for runs.
//!
//! Configuration is read from an embedded default, overlaid with `.config/cascade.toml` in the
//! project root if it exists. Settings are grouped into named profiles, and every profile falls
//! back to `default` for the keys it doesn't set.

mod imp;

pub use imp::*;
