//! User-facing status reporting
//!
//! Components never abort the detection loop or the caller on failure; they
//! report a [`StatusEvent`] to a [`StatusSink`] and carry on.
//!
//! Sinks:
//! - [`TracingStatusSink`] - logs each event at a level matching its severity
//! - [`ChannelStatusSink`] - broadcast channel for a display / UI task
//! - [`MultiStatusSink`] - fan-out to several sinks

use crate::playback::PlaybackCommand;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Conditions surfaced to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Detection loop started
    DetectionStarted,

    /// Detection loop stopped by the user
    DetectionStopped,

    /// Detection can never run this session (camera or model unavailable)
    DetectionDisabled { reason: String },

    /// A gesture turned into a command that the remote accepted
    CommandAcknowledged { command: String },

    /// An authenticated call was skipped because no credential is present
    CredentialMissing { operation: String },

    /// Dispatch or refresh failed on the wire; not retried
    TransportFailure { operation: String, message: String },
}

impl StatusEvent {
    /// Stable event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            StatusEvent::DetectionStarted => "detection_started",
            StatusEvent::DetectionStopped => "detection_stopped",
            StatusEvent::DetectionDisabled { .. } => "detection_disabled",
            StatusEvent::CommandAcknowledged { .. } => "command_acknowledged",
            StatusEvent::CredentialMissing { .. } => "credential_missing",
            StatusEvent::TransportFailure { .. } => "transport_failure",
        }
    }
}

/// Error type for status sink operations
#[derive(Debug, thiserror::Error)]
pub enum StatusSinkError {
    #[error("Channel send error: {0}")]
    Channel(String),
}

/// Trait for status delivery targets
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent) -> Result<(), StatusSinkError>;
}

/// Report through a sink, logging (not propagating) delivery failures
pub(crate) fn report(sink: &dyn StatusSink, event: StatusEvent) {
    let event_type = event.event_type();
    if let Err(e) = sink.emit(event) {
        tracing::debug!(event_type, "Status event not delivered: {}", e);
    }
}

/// Logs status events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn emit(&self, event: StatusEvent) -> Result<(), StatusSinkError> {
        match &event {
            StatusEvent::DetectionDisabled { reason } => {
                tracing::error!(reason = %reason, "Gesture detection disabled")
            }
            StatusEvent::CredentialMissing { operation } => {
                tracing::warn!(operation = %operation, "Not signed in; please re-authenticate")
            }
            StatusEvent::TransportFailure { operation, message } => {
                tracing::warn!(operation = %operation, "Remote call failed: {}", message)
            }
            StatusEvent::CommandAcknowledged { command } => {
                tracing::info!(command = %command, "Command acknowledged")
            }
            StatusEvent::DetectionStarted | StatusEvent::DetectionStopped => {
                tracing::info!(event = event.event_type(), "Detection state changed")
            }
        }
        Ok(())
    }
}

/// Broadcast channel sink for display tasks
///
/// Sends events to a tokio broadcast channel that can have multiple subscribers.
pub struct ChannelStatusSink {
    sender: broadcast::Sender<StatusEvent>,
}

impl ChannelStatusSink {
    /// Create a new channel sink with the specified capacity
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<StatusEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Create a new channel sink with default capacity (64)
    pub fn with_default_capacity() -> (Self, broadcast::Receiver<StatusEvent>) {
        Self::new(64)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }
}

impl StatusSink for ChannelStatusSink {
    fn emit(&self, event: StatusEvent) -> Result<(), StatusSinkError> {
        self.sender
            .send(event)
            .map_err(|e| StatusSinkError::Channel(e.to_string()))?;
        Ok(())
    }
}

/// Multi-sink that forwards events to every inner sink
#[derive(Default)]
pub struct MultiStatusSink {
    sinks: Vec<Box<dyn StatusSink>>,
}

impl MultiStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Box<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for MultiStatusSink {
    /// Every sink gets the event even if an earlier one fails; the first
    /// failure is returned.
    fn emit(&self, event: StatusEvent) -> Result<(), StatusSinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event.clone()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Short-lived "command sent" acknowledgement for display.
///
/// Showing a new acknowledgement replaces the previous one; each expires on
/// its own after the display duration.
pub struct Acknowledgements {
    display_for: Duration,
    current: Mutex<Option<(PlaybackCommand, Instant)>>,
}

impl Acknowledgements {
    pub fn new(display_for: Duration) -> Self {
        Self {
            display_for,
            current: Mutex::new(None),
        }
    }

    pub fn show(&self, command: PlaybackCommand) {
        *self.current.lock() = Some((command, Instant::now() + self.display_for));
    }

    /// Acknowledgement still on screen, if any
    pub fn visible(&self) -> Option<PlaybackCommand> {
        let mut current = self.current.lock();
        match *current {
            Some((command, expires_at)) if Instant::now() < expires_at => Some(command),
            Some(_) => {
                *current = None;
                None
            }
            None => None,
        }
    }
}

impl Default for Acknowledgements {
    /// Acknowledgements stay visible for 3 seconds
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}
