//! Document pipeline: extraction, chunking, model dispatch, merge, and session orchestration.

pub mod chunking;
pub mod dispatch;
pub mod events;
pub mod extract;
pub mod merge;
pub mod orchestrator;
mod service;
pub mod session;
pub mod types;

pub use events::{ClientMessage, EventKind, ProgressEvent, ProgressReporter};
pub use orchestrator::{Orchestrator, PipelineSettings};
pub use service::{PipelineApi, PipelineService, SessionSettings, spawn_session_reaper};
pub use session::{PhaseTrigger, Session, SessionRegistry, SessionState};
pub use types::{
    Artifact, AudioOutcome, Chunk, ChunkSummary, ChunkingError, ExtractedDocument,
    ExtractionError, PipelineError, ReadabilityScores, SessionStatus, SessionTicket,
    SummarizationError,
};
