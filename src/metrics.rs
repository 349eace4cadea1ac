use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_uploaded: AtomicU64,
    chunks_summarized: AtomicU64,
    summaries_persisted: AtomicU64,
    phase_failures: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted upload.
    pub fn record_upload(&self) {
        self.documents_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed summarization phase and the number of chunks it covered.
    pub fn record_chunks_summarized(&self, chunk_count: u64) {
        self.chunks_summarized
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a summary written to storage.
    pub fn record_persisted(&self) {
        self.summaries_persisted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a phase that ended in an error.
    pub fn record_failure(&self) {
        self.phase_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_uploaded: self.documents_uploaded.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            summaries_persisted: self.summaries_persisted.load(Ordering::Relaxed),
            phase_failures: self.phase_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents accepted by the upload endpoint since startup.
    pub documents_uploaded: u64,
    /// Total chunks sent through the summarization model.
    pub chunks_summarized: u64,
    /// Number of summaries written to storage.
    pub summaries_persisted: u64,
    /// Phases that ended in an error.
    pub phase_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_uploads_and_chunks() {
        let metrics = PipelineMetrics::new();
        metrics.record_upload();
        metrics.record_chunks_summarized(2);
        metrics.record_chunks_summarized(3);
        metrics.record_persisted();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_uploaded, 1);
        assert_eq!(snapshot.chunks_summarized, 5);
        assert_eq!(snapshot.summaries_persisted, 1);
        assert_eq!(snapshot.phase_failures, 0);
    }

    #[test]
    fn snapshot_is_consistent() {
        let metrics = PipelineMetrics::new();
        metrics.record_failure();
        assert_eq!(metrics.snapshot().phase_failures, 1);
        assert_eq!(metrics.snapshot().documents_uploaded, 0);
    }
}
