//! Wire protocol for the duplex progress channel.
//!
//! Every message is a JSON object `{"event": <name>, "data": {...}}`. Clients send phase
//! triggers; the server answers with progress, result, and failure events. Events are purely
//! observational and never feed back into session state.

use super::session::PhaseTrigger;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Server-to-client event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Connection-level status.
    #[serde(rename = "status")]
    Status,
    /// Preprocessing progress.
    #[serde(rename = "pr-status")]
    PrStatus,
    /// Chunking result.
    #[serde(rename = "chunking")]
    Chunking,
    /// Per-chunk summarization progress.
    #[serde(rename = "summ_chunk")]
    SummChunk,
    /// All chunks summarized.
    #[serde(rename = "chunk_done")]
    ChunkDone,
    /// Post-processing and scoring progress.
    #[serde(rename = "end_phase")]
    EndPhase,
    /// Final merged summary.
    #[serde(rename = "summary")]
    Summary,
    /// A phase or message failed.
    #[serde(rename = "failure")]
    Failure,
}

/// Payload of a server event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Human-readable message.
    pub text: String,
    /// Step number within the phase.
    pub num: u8,
    /// One-based chunk number for per-chunk events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// A progress, result, or failure notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Event name.
    pub event: EventKind,
    /// Event body.
    pub data: EventPayload,
}

impl ProgressEvent {
    /// Build an event without a chunk number.
    pub fn new(event: EventKind, num: u8, text: impl Into<String>) -> Self {
        Self {
            event,
            data: EventPayload {
                text: text.into(),
                num,
                count: None,
            },
        }
    }

    /// Attach a one-based chunk number.
    pub fn with_count(mut self, count: usize) -> Self {
        self.data.count = Some(count);
        self
    }

    /// Failure notification carrying an error message.
    pub fn failure(text: impl Into<String>) -> Self {
        Self::new(EventKind::Failure, 0, text)
    }
}

/// Body of a client trigger; the text is informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    /// Free-form note from the client.
    #[serde(default)]
    pub text: String,
}

/// A phase trigger sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Phase to run.
    pub event: PhaseTrigger,
    /// Trigger body.
    #[serde(default)]
    pub data: TriggerPayload,
}

impl ClientMessage {
    /// Parse a client frame.
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

/// Sending half of a session's progress stream.
///
/// Emitting never fails: a disconnected receiver only means nobody is watching.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    /// Create a reporter and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Forward an event to the channel.
    pub fn emit(&self, event: ProgressEvent) {
        tracing::trace!(event = ?event.event, text = %event.data.text, "Progress event");
        if self.sender.send(event).is_err() {
            tracing::debug!("Progress receiver dropped; event discarded");
        }
    }
}
