// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution events, and the sinks they are published to.
//!
//! Runners publish through a [`MessageBus`], which stamps each [`ExecutionEventKind`] into an
//! [`ExecutionEvent`] and forwards it to an [`EventSink`].

mod events;
mod execution_sink;
mod sink;

pub use events::*;
pub use execution_sink::*;
pub use sink::*;
