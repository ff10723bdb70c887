// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured data produced by the cascade test execution engine.
//!
//! The types in this crate are plain data: identities, traits, run summaries and flattened error
//! trees. They are shared between the runner (`cascade-runner`) and whatever consumes its events,
//! and are all serializable so that reporters can persist or forward them.

mod error_tree;
mod errors;
mod explicit;
mod identity;
mod summary;
mod traits;

pub use error_tree::*;
pub use errors::*;
pub use explicit::*;
pub use identity::*;
pub use summary::*;
pub use traits::*;
