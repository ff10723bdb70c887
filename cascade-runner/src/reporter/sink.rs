// Copyright (c) The cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ExecutionEvent, ExecutionEventKind};
use crate::{
    cancellation::{CancelReason, CancellationContext},
    time::{StopwatchStart, stopwatch},
};
use debug_ignore::DebugIgnore;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, trace};

/// Receives execution events.
///
/// Sinks may be shared between runners executing on different tasks.
pub trait EventSink: Send + Sync {
    /// Publishes an event.
    ///
    /// Returns false to ask for the run to be cancelled. The event itself is still considered
    /// delivered.
    fn publish(&self, event: ExecutionEvent) -> bool;
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, event: ExecutionEvent) -> bool {
        (**self).publish(event)
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn publish(&self, event: ExecutionEvent) -> bool {
        (**self).publish(event)
    }
}

/// Stamps events and forwards them to a sink, cancelling the run if the sink asks for it.
#[derive(Clone, Debug)]
pub struct MessageBus {
    sink: DebugIgnore<Arc<dyn EventSink>>,
    cancellation: CancellationContext,
    stopwatch: StopwatchStart,
}

impl MessageBus {
    /// Creates a new bus publishing to `sink`.
    pub fn new(sink: Arc<dyn EventSink>, cancellation: CancellationContext) -> Self {
        Self {
            sink: DebugIgnore(sink),
            cancellation,
            stopwatch: stopwatch(),
        }
    }

    /// Returns the cancellation context for the run.
    pub fn cancellation(&self) -> &CancellationContext {
        &self.cancellation
    }

    /// Publishes an event.
    ///
    /// Returns false if the sink asked for cancellation, in which case the run has been cancelled
    /// with [`CancelReason::SinkRequested`].
    pub fn publish(&self, kind: ExecutionEventKind) -> bool {
        let snapshot = self.stopwatch.snapshot();
        let event = ExecutionEvent {
            timestamp: (snapshot.start_time + snapshot.duration).fixed_offset(),
            elapsed: snapshot.duration,
            kind,
        };
        trace!(event = event.name(), chain = %event.chain(), "publishing event");

        if self.sink.publish(event) {
            true
        } else {
            debug!("sink requested cancellation");
            self.cancellation.cancel(CancelReason::SinkRequested);
            false
        }
    }
}

/// A sink that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ExecutionEvent>>,
    cancel_after: Option<usize>,
}

impl RecordingSink {
    /// Creates a new sink that never asks for cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new sink that asks for cancellation once it has received `count` events.
    pub fn cancel_after(count: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cancel_after: Some(count),
        }
    }

    /// Returns a copy of the events received so far.
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.lock().clone()
    }

    /// Returns the names of the events received so far.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.lock().iter().map(ExecutionEvent::name).collect()
    }

    /// Removes and returns the events received so far.
    pub fn take(&self) -> Vec<ExecutionEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ExecutionEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: ExecutionEvent) -> bool {
        let mut events = self.lock();
        events.push(event);
        self.cancel_after.is_none_or(|count| events.len() < count)
    }
}

/// A sink that forwards events to a channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: UnboundedSender<ExecutionEvent>,
}

impl ChannelSink {
    /// Creates a new sink, along with the receiver for its events.
    pub fn new() -> (Self, UnboundedReceiver<ExecutionEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: ExecutionEvent) -> bool {
        // The run is cancelled once nobody is listening.
        self.sender.send(event).is_ok()
    }
}
