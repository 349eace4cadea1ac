//! Phase orchestration over a single session.
//!
//! [`Orchestrator::advance`] validates a trigger against the session state, runs exactly one
//! component, commits its output, and emits progress events. Outputs are committed only after
//! the component succeeds, so a failed phase leaves the session where it was.

use super::chunking::chunk_text;
use super::dispatch::{DispatchSettings, dispatch};
use super::events::{EventKind, ProgressEvent, ProgressReporter};
use super::extract::extract_document;
use super::merge::merge_summaries;
use super::session::{PhaseTrigger, Session, SessionState};
use super::types::{ChunkingError, ExtractionError, PipelineError, ReadabilityScores};
use crate::config::Config;
use crate::metrics::PipelineMetrics;
use crate::readability;
use crate::storage::ArtifactStore;
use crate::summarization::{SummarizationClient, SummaryBounds};
use std::sync::Arc;
use std::time::Duration;

/// Tunables applied to every session.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Word budget per chunk.
    pub max_chunk_words: usize,
    /// Model dispatch behavior.
    pub dispatch: DispatchSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_chunk_words: super::chunking::DEFAULT_MAX_CHUNK_WORDS,
            dispatch: DispatchSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_chunk_words: config.max_chunk_words,
            dispatch: DispatchSettings {
                bounds: SummaryBounds {
                    min_words: config.summary_min_words,
                    max_words: config.summary_max_words,
                },
                delay: Duration::from_millis(config.dispatch_delay_ms),
                max_retries: config.summarization_max_retries,
                retry_backoff: Duration::from_millis(config.summarization_retry_backoff_ms),
            },
        }
    }
}

/// Runs pipeline phases against sessions.
pub struct Orchestrator {
    client: Arc<dyn SummarizationClient>,
    store: ArtifactStore,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

fn format_scores(scores: &ReadabilityScores) -> String {
    format!(
        "Flesch-Kincaid Grade: {} | Gunning Fog Index: {} | Coleman-Liau Index: {}",
        scores.flesch_kincaid_grade, scores.gunning_fog, scores.coleman_liau
    )
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborators.
    pub fn new(
        client: Arc<dyn SummarizationClient>,
        store: ArtifactStore,
        settings: PipelineSettings,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            client,
            store,
            settings,
            metrics,
        }
    }

    /// Run the phase named by `trigger` and return the session's new state.
    pub async fn advance(
        &self,
        session: &mut Session,
        trigger: PhaseTrigger,
        progress: &ProgressReporter,
    ) -> Result<SessionState, PipelineError> {
        session.ensure_accepts(trigger)?;
        session.touch();
        tracing::info!(session = %session.id(), %trigger, state = %session.state(), "Running phase");

        match trigger {
            PhaseTrigger::Preprocess => self.preprocess(session, progress).await?,
            PhaseTrigger::Chunk => self.chunk(session, progress)?,
            PhaseTrigger::ChunkSummarize => self.summarize(session, progress).await?,
            PhaseTrigger::PostProcess => self.post_process(session, progress).await?,
        }

        session.touch();
        tracing::info!(session = %session.id(), %trigger, state = %session.state(), "Phase complete");
        Ok(session.state())
    }

    async fn preprocess(
        &self,
        session: &mut Session,
        progress: &ProgressReporter,
    ) -> Result<(), PipelineError> {
        let bytes = self.store.read_bytes(session.source_path()).await?;
        let document = tokio::task::spawn_blocking(move || extract_document(&bytes))
            .await
            .map_err(|error| ExtractionError::Unreadable(error.to_string()))??;

        tracing::debug!(
            pages = document.page_count,
            kept = document.pages_kept,
            "Preprocessing finished"
        );
        session.record_extraction(document);
        progress.emit(ProgressEvent::new(
            EventKind::PrStatus,
            1,
            "Preprocessing complete.",
        ));
        progress.emit(ProgressEvent::new(EventKind::PrStatus, 2, "Chunking text."));
        Ok(())
    }

    fn chunk(&self, session: &mut Session, progress: &ProgressReporter) -> Result<(), PipelineError> {
        let cleaned = session
            .document()
            .map(|document| document.cleaned.as_str())
            .ok_or(ChunkingError::EmptyInput)?;
        let chunks = chunk_text(cleaned, self.settings.max_chunk_words)?;
        let count = chunks.len();
        session.record_chunks(chunks);
        progress.emit(
            ProgressEvent::new(
                EventKind::Chunking,
                1,
                format!("Total chunks of text are: {count}"),
            )
            .with_count(count),
        );
        Ok(())
    }

    async fn summarize(
        &self,
        session: &mut Session,
        progress: &ProgressReporter,
    ) -> Result<(), PipelineError> {
        progress.emit(ProgressEvent::new(
            EventKind::SummChunk,
            1,
            "Summarizing the text. Please wait...",
        ));
        let summaries = dispatch(
            session.chunks(),
            self.client.as_ref(),
            &self.settings.dispatch,
            progress,
        )
        .await?;

        self.metrics
            .record_chunks_summarized(summaries.len() as u64);
        session.record_summaries(summaries);
        progress.emit(ProgressEvent::new(
            EventKind::ChunkDone,
            3,
            "Each chunk summarized.",
        ));
        Ok(())
    }

    async fn post_process(
        &self,
        session: &mut Session,
        progress: &ProgressReporter,
    ) -> Result<(), PipelineError> {
        if session.state() == SessionState::Summarized {
            progress.emit(ProgressEvent::new(EventKind::EndPhase, 1, "Post processing"));
            let merged = merge_summaries(session.summaries());

            progress.emit(ProgressEvent::new(
                EventKind::EndPhase,
                2,
                "Calculating scores...",
            ));
            let scores = readability::score(&merged);
            progress.emit(ProgressEvent::new(
                EventKind::EndPhase,
                3,
                format_scores(&scores),
            ));
            session.record_merge(merged, scores);
        }

        let merged = session.merged().unwrap_or_default().to_string();
        let path = self.store.write_summary(session.name(), &merged).await?;
        session.record_persisted(path);
        self.metrics.record_persisted();
        progress.emit(ProgressEvent::new(EventKind::Summary, 4, merged));
        Ok(())
    }
}
