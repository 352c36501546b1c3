//! Pluggable output sinks for pipeline events.
//!
//! The dispatcher and synthesizer emit [`SinkEvent`]s through the
//! [`AudioSink`] trait; the downstream protocol adapter decides what a sink
//! does with them.

use crate::error::{Result, VoxError};
use crate::pipeline::event::SinkEvent;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Ordered consumer of pipeline events.
///
/// Events for one request id arrive in AudioStart → AudioData* →
/// AudioEnd-or-Error order. Implementations must not block for long:
/// the dispatcher awaits every emit before producing the next event.
#[async_trait::async_trait]
pub trait AudioSink: Send + Sync {
    /// Delivers one event to the consumer.
    async fn emit(&self, event: SinkEvent) -> Result<()>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Sink that forwards events into an unbounded tokio channel.
///
/// The usual bridge to a protocol adapter task: the adapter owns the
/// receiver and drains it at its own pace.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver it feeds.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wraps an existing sender.
    pub fn from_sender(tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl AudioSink for ChannelSink {
    async fn emit(&self, event: SinkEvent) -> Result<()> {
        self.tx.send(event).map_err(|e| VoxError::SinkClosed {
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Sink that accumulates events in memory.
///
/// Useful for tests and for batch consumers that inspect a whole
/// exchange after the fact.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl CollectorSink {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all events emitted so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns all accumulated events.
    pub fn take(&self) -> Vec<SinkEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }
}

#[async_trait::async_trait]
impl AudioSink for CollectorSink {
    async fn emit(&self, event: SinkEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}
