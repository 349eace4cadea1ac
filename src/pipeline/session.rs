//! Session lifecycle: the phase state machine and the per-session registry.
//!
//! A session moves strictly through
//! `Created → Extracted → Chunked → Summarized → MergedAndScored → Persisted`. Each phase trigger
//! names the single state it may run from; anything else is a [`PipelineError::PhaseOrder`].
//! `post_process` is also accepted from `MergedAndScored` so a failed write can be retried
//! without recomputing the merge.

use super::types::{
    Chunk, ChunkSummary, ExtractedDocument, PipelineError, ReadabilityScores, SessionStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

/// Lifecycle states of a pipeline session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Upload stored, nothing extracted yet.
    Created,
    /// Text extracted and cleaned.
    Extracted,
    /// Cleaned text partitioned into chunks.
    Chunked,
    /// Every chunk has a summary.
    Summarized,
    /// Summaries merged and scored, not yet written.
    MergedAndScored,
    /// Merged summary written to storage.
    Persisted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Extracted => "extracted",
            Self::Chunked => "chunked",
            Self::Summarized => "summarized",
            Self::MergedAndScored => "merged_and_scored",
            Self::Persisted => "persisted",
        };
        f.write_str(label)
    }
}

/// Client events that advance a session by one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseTrigger {
    /// Extract and clean the uploaded PDF.
    Preprocess,
    /// Partition cleaned text into chunks.
    Chunk,
    /// Summarize every chunk in order.
    ChunkSummarize,
    /// Merge, score, and persist.
    PostProcess,
}

impl PhaseTrigger {
    /// Wire name of the trigger.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preprocess => "preprocess",
            Self::Chunk => "chunk",
            Self::ChunkSummarize => "chunk_summarize",
            Self::PostProcess => "post_process",
        }
    }

    /// Whether this trigger may run while the session is in `state`.
    pub fn accepts(self, state: SessionState) -> bool {
        matches!(
            (self, state),
            (Self::Preprocess, SessionState::Created)
                | (Self::Chunk, SessionState::Extracted)
                | (Self::ChunkSummarize, SessionState::Chunked)
                | (Self::PostProcess, SessionState::Summarized)
                | (Self::PostProcess, SessionState::MergedAndScored)
        )
    }
}

impl fmt::Display for PhaseTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full mutable state of one document's pipeline run.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    name: String,
    source_path: PathBuf,
    created_at: OffsetDateTime,
    last_active: Instant,
    state: SessionState,
    document: Option<ExtractedDocument>,
    chunks: Vec<Chunk>,
    summaries: Vec<ChunkSummary>,
    merged: Option<String>,
    scores: Option<ReadabilityScores>,
    summary_path: Option<PathBuf>,
    audio_path: Option<PathBuf>,
}

impl Session {
    /// Create a session for an upload stored at `source_path`.
    pub fn new(name: impl Into<String>, source_path: PathBuf) -> Self {
        Self::with_id(Uuid::new_v4(), name, source_path)
    }

    /// Create a session under an identifier allocated by the caller.
    pub fn with_id(id: Uuid, name: impl Into<String>, source_path: PathBuf) -> Self {
        Self {
            id,
            name: name.into(),
            source_path,
            created_at: OffsetDateTime::now_utc(),
            last_active: Instant::now(),
            state: SessionState::Created,
            document: None,
            chunks: Vec::new(),
            summaries: Vec::new(),
            merged: None,
            scores: None,
            summary_path: None,
            audio_path: None,
        }
    }

    /// Registry key.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name derived from the uploaded filename.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the uploaded PDF was stored.
    pub fn source_path(&self) -> &PathBuf {
        &self.source_path
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Extraction output, once available.
    pub fn document(&self) -> Option<&ExtractedDocument> {
        self.document.as_ref()
    }

    /// Chunks in document order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk summaries in chunk order.
    pub fn summaries(&self) -> &[ChunkSummary] {
        &self.summaries
    }

    /// Merged, post-processed summary text.
    pub fn merged(&self) -> Option<&str> {
        self.merged.as_deref()
    }

    /// Readability scores of the merged text.
    pub fn scores(&self) -> Option<ReadabilityScores> {
        self.scores
    }

    /// Location of the persisted summary.
    pub fn summary_path(&self) -> Option<&PathBuf> {
        self.summary_path.as_ref()
    }

    /// Location of the rendered audio.
    pub fn audio_path(&self) -> Option<&PathBuf> {
        self.audio_path.as_ref()
    }

    /// Reject `trigger` unless the session is in its predecessor state.
    pub fn ensure_accepts(&self, trigger: PhaseTrigger) -> Result<(), PipelineError> {
        if trigger.accepts(self.state) {
            Ok(())
        } else {
            Err(PipelineError::PhaseOrder {
                trigger,
                state: self.state,
            })
        }
    }

    pub(crate) fn record_extraction(&mut self, document: ExtractedDocument) {
        self.document = Some(document);
        self.state = SessionState::Extracted;
    }

    pub(crate) fn record_chunks(&mut self, chunks: Vec<Chunk>) {
        self.chunks = chunks;
        self.state = SessionState::Chunked;
    }

    pub(crate) fn record_summaries(&mut self, summaries: Vec<ChunkSummary>) {
        debug_assert_eq!(summaries.len(), self.chunks.len());
        self.summaries = summaries;
        self.state = SessionState::Summarized;
    }

    pub(crate) fn record_merge(&mut self, merged: String, scores: ReadabilityScores) {
        self.merged = Some(merged);
        self.scores = Some(scores);
        self.state = SessionState::MergedAndScored;
    }

    pub(crate) fn record_persisted(&mut self, path: PathBuf) {
        self.summary_path = Some(path);
        self.state = SessionState::Persisted;
    }

    pub(crate) fn record_audio(&mut self, path: PathBuf) {
        self.audio_path = Some(path);
    }

    pub(crate) fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_active) > ttl
    }

    /// Status snapshot for the HTTP surface.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id,
            name: self.name.clone(),
            state: self.state,
            created_at: self
                .created_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| self.created_at.unix_timestamp().to_string()),
            chunk_count: (!self.chunks.is_empty()).then_some(self.chunks.len()),
            scores: self.scores,
        }
    }
}

/// Shared handle to a single session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Live sessions keyed by identifier.
///
/// Each session sits behind its own mutex, so phases of one session serialize while different
/// sessions proceed independently.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    ttl: Duration,
}

impl SessionRegistry {
    /// Create an empty registry whose idle sessions expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a session and return its identifier.
    pub async fn insert(&self, session: Session) -> Uuid {
        let id = session.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    /// Look up a live session.
    pub async fn get(&self, id: Uuid) -> Result<SessionHandle, PipelineError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(PipelineError::SessionNotFound(id))
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every session.
    pub async fn clear(&self) -> usize {
        let mut guard = self.sessions.write().await;
        let count = guard.len();
        guard.clear();
        count
    }

    /// Dispose of sessions idle for longer than the TTL.
    ///
    /// Sessions currently running a phase hold their lock and are skipped.
    pub async fn sweep_expired(&self, now: Instant) -> usize {
        let mut guard = self.sessions.write().await;
        let before = guard.len();
        let ttl = self.ttl;
        guard.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session.expired(now, ttl),
            Err(_) => true,
        });
        before - guard.len()
    }
}
