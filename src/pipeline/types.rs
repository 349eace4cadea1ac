//! Core data types and error definitions for the summarization pipeline.

use crate::{
    pipeline::session::{PhaseTrigger, SessionState},
    speech::SpeechError,
    storage::PersistenceError,
    summarization::SummarizationClientError,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while turning PDF bytes into cleaned text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The PDF parser rejected the document.
    #[error("document could not be read as PDF: {0}")]
    Unreadable(String),
    /// The document parsed but declares no pages.
    #[error("document has no pages")]
    NoPages,
    /// Every page yielded empty text.
    #[error("document contains no extractable text")]
    EmptyDocument,
}

/// Errors produced while partitioning cleaned text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// The configured word budget cannot hold any sentence.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// There was no text left to chunk.
    #[error("no text available to chunk")]
    EmptyInput,
}

/// A model call failed; dispatch stopped at `chunk_index`.
#[derive(Debug, Error)]
#[error("failed to summarize chunk {} of {total}: {source}", .chunk_index + 1)]
pub struct SummarizationError {
    /// Zero-based index of the chunk whose call failed.
    pub chunk_index: usize,
    /// Number of chunks in the batch.
    pub total: usize,
    /// Underlying provider error.
    #[source]
    pub source: SummarizationClientError,
}

/// Errors emitted by the document pipeline and its HTTP/channel surfaces.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Extraction or cleaning failed.
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// Chunking failed.
    #[error("Chunking failed: {0}")]
    Chunking(#[from] ChunkingError),
    /// A model invocation failed and dispatch was aborted.
    #[error("Summarization failed: {0}")]
    Summarization(#[from] SummarizationError),
    /// Reading or writing an artifact failed.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
    /// Speech rendering failed.
    #[error("Audio generation failed: {0}")]
    Speech(#[from] SpeechError),
    /// Upload rejected because it is not a PDF.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    /// A phase trigger arrived while the session was in the wrong state.
    #[error("Cannot run '{trigger}' while session is {state}")]
    PhaseOrder {
        /// Trigger that was rejected.
        trigger: PhaseTrigger,
        /// State the session was in.
        state: SessionState,
    },
    /// No live session carries the requested identifier.
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
    /// A download was requested before its artifact exists.
    #[error("Artifact not available: {0}")]
    ArtifactMissing(String),
}

/// Text recovered from an uploaded PDF.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Pages declared by the document.
    pub page_count: usize,
    /// Pages kept after front-matter filtering.
    pub pages_kept: usize,
    /// Concatenated raw text of the kept pages.
    pub extracted: String,
    /// Normalized text handed to the chunker.
    pub cleaned: String,
}

/// Ordered, sentence-aligned segment of the cleaned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Zero-based position in document order.
    pub index: usize,
    /// Number of whitespace-separated words.
    pub word_count: usize,
    /// Space-joined words of the chunk's sentences.
    pub text: String,
}

/// Model output for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    /// Index of the chunk this summary was produced from.
    pub source_index: usize,
    /// Summary text returned by the model.
    pub text: String,
}

/// Flesch–Kincaid, Gunning Fog, and Coleman–Liau scores for a text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadabilityScores {
    /// Flesch–Kincaid grade level.
    pub flesch_kincaid_grade: f64,
    /// Gunning Fog index.
    pub gunning_fog: f64,
    /// Coleman–Liau index.
    pub coleman_liau: f64,
}

/// Identifier and derived name handed back after an upload.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTicket {
    /// Registry key for the new session.
    pub session_id: Uuid,
    /// Name derived from the uploaded filename, used for persisted artifacts.
    pub name: String,
}

/// Snapshot of a session for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// Registry key.
    pub session_id: Uuid,
    /// Derived artifact name.
    pub name: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Number of chunks produced, once chunked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    /// Readability scores, once post-processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ReadabilityScores>,
}

/// Result of a speech rendering request.
#[derive(Debug, Clone, Serialize)]
pub struct AudioOutcome {
    /// `"success"` when the file was rendered.
    pub status: String,
    /// Human-readable message.
    pub message: String,
    /// Location of the rendered file.
    pub file_path: String,
}

/// A downloadable artifact: attachment name and content.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Filename suggested to the client.
    pub file_name: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}
