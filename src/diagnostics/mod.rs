// SPDX-License-Identifier: MPL-2.0
//! Diagnostics module for collecting tracking observability events.
//!
//! The engine never interrupts playback over tracking problems; instead it
//! reports everything noteworthy here. Events flow through a bounded
//! channel with non-blocking sends (the event loop is never stalled by
//! observability) into a memory-bounded circular buffer the host drains
//! at its leisure.
//!
//! # Architecture
//!
//! - [`CircularBuffer`]: ring buffer with validated [`BufferCapacity`]
//! - [`TrackingEvent`]: typed taxonomy of tracking events
//! - [`DiagnosticsHandle`]: cheap-to-clone producer handle
//! - [`DiagnosticsCollector`]: consumer side owning the buffer

mod buffer;
mod events;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;

pub use buffer::{buffer_capacity_bounds, BufferCapacity, CircularBuffer};
pub use events::{DegradedReason, PushReason, TrackingEvent};

/// Channel depth between producers and the collector. Events beyond this
/// backlog are dropped rather than blocking the event loop.
const CHANNEL_DEPTH: usize = 512;

/// One captured event with its wall-clock timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub at: DateTime<Utc>,
    pub event: TrackingEvent,
}

/// Serializable form of a captured event for export.
#[derive(Debug, Serialize)]
pub struct SerializableEvent<'a> {
    /// RFC 3339 capture timestamp.
    pub at: String,
    #[serde(flatten)]
    pub event: &'a TrackingEvent,
}

impl CapturedEvent {
    /// Returns the exportable form of this event.
    #[must_use]
    pub fn to_serializable(&self) -> SerializableEvent<'_> {
        SerializableEvent {
            at: self.at.to_rfc3339(),
            event: &self.event,
        }
    }
}

/// Handle for sending tracking events to the collector.
///
/// Cheap to clone and shareable. Sends are non-blocking: if the channel
/// backlog is full the event is dropped.
#[derive(Clone, Debug)]
pub struct DiagnosticsHandle {
    event_tx: Sender<CapturedEvent>,
}

impl DiagnosticsHandle {
    /// Records one tracking event.
    pub fn record(&self, event: TrackingEvent) {
        let captured = CapturedEvent {
            at: Utc::now(),
            event,
        };
        // Non-blocking send - drop if channel is full
        let _ = self.event_tx.try_send(captured);
    }
}

/// Collector that drains recorded events into a bounded buffer.
#[derive(Debug)]
pub struct DiagnosticsCollector {
    event_rx: Receiver<CapturedEvent>,
    buffer: CircularBuffer<CapturedEvent>,
}

impl DiagnosticsCollector {
    /// Creates a collector and its producer handle.
    #[must_use]
    pub fn new(capacity: BufferCapacity) -> (Self, DiagnosticsHandle) {
        let (event_tx, event_rx) = bounded(CHANNEL_DEPTH);
        (
            Self {
                event_rx,
                buffer: CircularBuffer::new(capacity),
            },
            DiagnosticsHandle { event_tx },
        )
    }

    /// Moves all pending events into the buffer. Returns how many arrived.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.buffer.push(event);
            drained += 1;
        }
        drained
    }

    /// Returns the buffered events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &CapturedEvent> {
        self.buffer.iter()
    }

    /// Exports the buffered events as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if serialization fails.
    pub fn export_json(&self) -> crate::error::Result<String> {
        let serializable: Vec<SerializableEvent<'_>> = self
            .buffer
            .iter()
            .map(CapturedEvent::to_serializable)
            .collect();
        Ok(serde_json::to_string_pretty(&serializable)?)
    }
}
