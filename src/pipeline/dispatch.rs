//! Sequential per-chunk summarization.
//!
//! Chunks are summarized strictly in index order with one model call in flight. A call that
//! still fails after the configured retries aborts the batch; nothing from a failed batch is
//! returned.

use super::events::{EventKind, ProgressEvent, ProgressReporter};
use super::types::{Chunk, ChunkSummary, SummarizationError};
use crate::summarization::{SummarizationClient, SummarizationClientError, SummaryBounds};
use std::time::Duration;

/// Knobs for a dispatch run.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Length bounds passed to every model call.
    pub bounds: SummaryBounds,
    /// Pacing delay before each call.
    pub delay: Duration,
    /// Extra attempts per chunk after a failure.
    pub max_retries: u32,
    /// Backoff before the first retry, doubled for each further retry.
    pub retry_backoff: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            bounds: SummaryBounds::default(),
            delay: Duration::from_millis(100),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Summarize `chunks` in order, reporting progress after each call.
pub async fn dispatch(
    chunks: &[Chunk],
    client: &dyn SummarizationClient,
    settings: &DispatchSettings,
    progress: &ProgressReporter,
) -> Result<Vec<ChunkSummary>, SummarizationError> {
    let total = chunks.len();
    let mut summaries = Vec::with_capacity(total);

    for chunk in chunks {
        if !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
        tracing::info!(chunk = chunk.index + 1, total, words = chunk.word_count, "Summarizing chunk");

        let text = summarize_with_retry(client, &chunk.text, settings)
            .await
            .map_err(|source| SummarizationError {
                chunk_index: chunk.index,
                total,
                source,
            })?;

        summaries.push(ChunkSummary {
            source_index: chunk.index,
            text,
        });
        progress.emit(
            ProgressEvent::new(
                EventKind::SummChunk,
                2,
                format!("Summarized chunk {} of {total}", chunk.index + 1),
            )
            .with_count(chunk.index + 1),
        );
    }

    Ok(summaries)
}

async fn summarize_with_retry(
    client: &dyn SummarizationClient,
    text: &str,
    settings: &DispatchSettings,
) -> Result<String, SummarizationClientError> {
    let mut attempt = 0u32;
    loop {
        match client.summarize(text, settings.bounds).await {
            Ok(summary) => return Ok(summary),
            Err(error) if attempt < settings.max_retries => {
                let backoff = settings.retry_backoff.saturating_mul(1 << attempt.min(16));
                tracing::warn!(
                    error = %error,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    "Model call failed; retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedClient {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
        failures_before_success: usize,
    }

    impl ScriptedClient {
        fn failing_on(call: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call: Some(call),
                failures_before_success: 0,
            }
        }

        fn flaky(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call: None,
                failures_before_success: failures,
            }
        }
    }

    #[async_trait]
    impl SummarizationClient for ScriptedClient {
        async fn summarize(
            &self,
            text: &str,
            _bounds: SummaryBounds,
        ) -> Result<String, SummarizationClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.fail_on_call || call <= self.failures_before_success {
                return Err(SummarizationClientError::GenerationFailed("model down".into()));
            }
            Ok(format!("summary of {text}"))
        }
    }

    fn chunks(count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|index| Chunk {
                index,
                word_count: 2,
                text: format!("chunk {index}."),
            })
            .collect()
    }

    fn fast() -> DispatchSettings {
        DispatchSettings {
            delay: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            ..DispatchSettings::default()
        }
    }

    #[tokio::test]
    async fn summaries_follow_chunk_order() {
        let client = ScriptedClient::flaky(0);
        let (reporter, mut events) = ProgressReporter::channel();
        let summaries = dispatch(&chunks(3), &client, &fast(), &reporter)
            .await
            .expect("summaries");

        assert_eq!(summaries.len(), 3);
        for (i, summary) in summaries.iter().enumerate() {
            assert_eq!(summary.source_index, i);
            assert_eq!(summary.text, format!("summary of chunk {i}."));
        }
        for expected in 1..=3 {
            let event = events.try_recv().expect("progress event");
            assert_eq!(event.event, EventKind::SummChunk);
            assert_eq!(event.data.count, Some(expected));
        }
    }

    #[tokio::test]
    async fn failure_on_second_chunk_aborts_remaining_dispatch() {
        let client = ScriptedClient::failing_on(2);
        let (reporter, mut events) = ProgressReporter::channel();
        let error = dispatch(&chunks(3), &client, &fast(), &reporter)
            .await
            .expect_err("dispatch aborted");

        assert_eq!(error.chunk_index, 1);
        assert_eq!(error.total, 3);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(events.try_recv().expect("first chunk").data.count, Some(1));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn bounded_retry_recovers_transient_failures() {
        let client = ScriptedClient::flaky(1);
        let (reporter, _events) = ProgressReporter::channel();
        let settings = DispatchSettings {
            max_retries: 1,
            ..fast()
        };
        let summaries = dispatch(&chunks(1), &client, &settings, &reporter)
            .await
            .expect("retried");
        assert_eq!(summaries.len(), 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let client = ScriptedClient::flaky(1);
        let (reporter, _events) = ProgressReporter::channel();
        assert!(dispatch(&chunks(1), &client, &fast(), &reporter).await.is_err());
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }
}
