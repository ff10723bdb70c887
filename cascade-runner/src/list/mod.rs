// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Descriptions of the tests to run, and the collaborators they are run with.
//!
//! Discovery is out of scope for cascade: the types in this module are produced by the embedder
//! and handed to the runners in [`runner`](crate::runner).

mod body;
mod hooks;
mod scope;

pub use body::*;
pub use hooks::*;
pub use scope::*;
pub use test::*;
