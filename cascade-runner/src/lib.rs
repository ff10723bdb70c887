// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for the cascade test execution engine.
//!
//! Tests are organized as a hierarchy of scopes: an assembly contains collections, which contain
//! classes, which contain methods, which contain tests. The runners in [`runner`] walk this
//! hierarchy in order, publishing an [`ExecutionEvent`](reporter::ExecutionEvent) for each stage
//! of each test's lifecycle, and return a [`RunSummary`](cascade_metadata::RunSummary) at every
//! level.
//!
//! For the structured data produced by runs, see the
//! [`cascade-metadata`](https://crates.io/crates/cascade-metadata) crate.

pub mod aggregator;
pub mod cancellation;
pub mod config;
pub mod errors;
pub mod list;
pub mod output;
pub mod reporter;
pub mod runner;
mod time;
