//! Pipeline service coordinating uploads, sessions, phases, and artifacts.

use crate::{
    config::Config,
    metrics::{MetricsSnapshot, PipelineMetrics},
    pipeline::{
        events::{ProgressEvent, ProgressReporter},
        orchestrator::{Orchestrator, PipelineSettings},
        session::{PhaseTrigger, Session, SessionRegistry, SessionState},
        types::{Artifact, AudioOutcome, PipelineError, SessionStatus, SessionTicket},
    },
    speech::{CommandSynthesizer, SpeechSynthesizer},
    storage::{ArtifactStore, is_pdf, sanitize_file_name, session_name},
    summarization::{SummarizationClient, SummarizationClientError, get_summarization_client},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Session lifetime settings.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Idle time after which a session is disposed.
    pub ttl: Duration,
    /// Interval between keepalive pings on the progress channel.
    pub keepalive_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            keepalive_interval: Duration::from_secs(1440),
        }
    }
}

/// Owns the session registry and every collaborator a phase needs.
///
/// The HTTP upload handler and the progress channel share one instance through an `Arc`, so the
/// session created by an upload is the one the channel later drives.
pub struct PipelineService {
    registry: SessionRegistry,
    orchestrator: Orchestrator,
    store: ArtifactStore,
    speech: Arc<dyn SpeechSynthesizer>,
    metrics: Arc<PipelineMetrics>,
    keepalive_interval: Duration,
}

/// Abstraction over the pipeline used by the HTTP and channel surfaces.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Store an uploaded PDF and open a session for it.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<SessionTicket, PipelineError>;

    /// Run one phase on a session, streaming progress to `progress`.
    async fn handle_phase(
        &self,
        session_id: Uuid,
        trigger: PhaseTrigger,
        progress: &ProgressReporter,
    ) -> Result<SessionState, PipelineError>;

    /// Current state of a session.
    async fn session_status(&self, session_id: Uuid) -> Result<SessionStatus, PipelineError>;

    /// Persisted summary of a session.
    async fn summary_artifact(&self, session_id: Uuid) -> Result<Artifact, PipelineError>;

    /// Render the persisted summary to audio.
    async fn generate_audio(&self, session_id: Uuid) -> Result<AudioOutcome, PipelineError>;

    /// Rendered audio of a session.
    async fn audio_artifact(&self, session_id: Uuid) -> Result<Artifact, PipelineError>;

    /// Drop every session and stored artifact; returns the number of files removed.
    async fn reset(&self) -> Result<usize, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Interval between keepalive pings on the progress channel.
    fn keepalive_interval(&self) -> Duration;
}

impl PipelineService {
    /// Build a service from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, SummarizationClientError> {
        let client: Arc<dyn SummarizationClient> = Arc::from(get_summarization_client(config)?);
        let speech = Arc::new(CommandSynthesizer::new(
            config.tts_command.clone(),
            config.tts_rate,
        ));
        let sessions = SessionSettings {
            ttl: Duration::from_secs(config.session_ttl_secs),
            keepalive_interval: Duration::from_secs(config.keepalive_interval_secs),
        };
        Ok(Self::with_components(
            client,
            speech,
            ArtifactStore::new(config.storage_dir.clone()),
            PipelineSettings::from_config(config),
            sessions,
        ))
    }

    /// Assemble a service from explicit collaborators.
    pub fn with_components(
        client: Arc<dyn SummarizationClient>,
        speech: Arc<dyn SpeechSynthesizer>,
        store: ArtifactStore,
        settings: PipelineSettings,
        sessions: SessionSettings,
    ) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let orchestrator = Orchestrator::new(client, store.clone(), settings, metrics.clone());
        Self {
            registry: SessionRegistry::new(sessions.ttl),
            orchestrator,
            store,
            speech,
            metrics,
            keepalive_interval: sessions.keepalive_interval,
        }
    }

    /// Store an uploaded PDF and register a fresh session for it.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<SessionTicket, PipelineError> {
        let sanitized = sanitize_file_name(file_name)
            .filter(|name| is_pdf(name))
            .ok_or_else(|| PipelineError::UnsupportedFileType(file_name.to_string()))?;
        let session_id = Uuid::new_v4();
        let path = self.store.save_upload(session_id, &sanitized, &bytes).await?;
        let name = session_name(&sanitized);
        self.registry
            .insert(Session::with_id(session_id, name.clone(), path))
            .await;
        self.metrics.record_upload();
        tracing::info!(%session_id, name = %name, bytes = bytes.len(), "Upload accepted");
        Ok(SessionTicket { session_id, name })
    }

    /// Run one phase, reporting any failure on the progress channel.
    pub async fn handle_phase(
        &self,
        session_id: Uuid,
        trigger: PhaseTrigger,
        progress: &ProgressReporter,
    ) -> Result<SessionState, PipelineError> {
        let result = async {
            let handle = self.registry.get(session_id).await?;
            let mut session = handle.lock().await;
            self.orchestrator
                .advance(&mut session, trigger, progress)
                .await
        }
        .await;

        if let Err(error) = &result {
            self.metrics.record_failure();
            tracing::warn!(%session_id, %trigger, error = %error, "Phase failed");
            progress.emit(ProgressEvent::failure(error.to_string()));
        }
        result
    }

    /// Status snapshot of a session.
    pub async fn session_status(&self, session_id: Uuid) -> Result<SessionStatus, PipelineError> {
        let handle = self.registry.get(session_id).await?;
        let session = handle.lock().await;
        Ok(session.status())
    }

    /// Read the persisted summary for download.
    pub async fn summary_artifact(&self, session_id: Uuid) -> Result<Artifact, PipelineError> {
        let handle = self.registry.get(session_id).await?;
        let session = handle.lock().await;
        let path = session
            .summary_path()
            .ok_or_else(|| PipelineError::ArtifactMissing("summary has not been persisted".into()))?;
        let bytes = self.store.read_bytes(path).await?;
        Ok(Artifact {
            file_name: format!("{}_summary.txt", session.name()),
            bytes,
        })
    }

    /// Render the persisted summary to audio.
    pub async fn generate_audio(&self, session_id: Uuid) -> Result<AudioOutcome, PipelineError> {
        let handle = self.registry.get(session_id).await?;
        let mut session = handle.lock().await;
        if session.state() != SessionState::Persisted {
            return Err(PipelineError::ArtifactMissing(
                "summary has not been persisted".into(),
            ));
        }
        let text = self.store.read_summary(session.name()).await?;
        let output = self.store.audio_path(session.name());
        self.speech.synthesize(&text, &output).await?;
        session.record_audio(output.clone());
        session.touch();
        Ok(AudioOutcome {
            status: "success".into(),
            message: "Audio generated".into(),
            file_path: output.display().to_string(),
        })
    }

    /// Read the rendered audio for download.
    pub async fn audio_artifact(&self, session_id: Uuid) -> Result<Artifact, PipelineError> {
        let handle = self.registry.get(session_id).await?;
        let session = handle.lock().await;
        let path = session
            .audio_path()
            .ok_or_else(|| PipelineError::ArtifactMissing("audio has not been generated".into()))?;
        let bytes = self.store.read_bytes(path).await?;
        Ok(Artifact {
            file_name: format!("{}_audiobook.mp3", session.name()),
            bytes,
        })
    }

    /// Drop every session and delete every stored artifact.
    pub async fn reset(&self) -> Result<usize, PipelineError> {
        let sessions = self.registry.clear().await;
        let removed = self.store.reset().await?;
        tracing::info!(sessions, removed, "Pipeline reset");
        Ok(removed)
    }

    /// Dispose of idle sessions.
    pub async fn sweep_expired(&self) -> usize {
        let removed = self
            .registry
            .sweep_expired(tokio::time::Instant::now())
            .await;
        if removed > 0 {
            let remaining = self.registry.len().await;
            tracing::info!(removed, remaining, "Expired sessions disposed");
        }
        removed
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Periodically dispose of idle sessions for as long as the returned task runs.
pub fn spawn_session_reaper(service: Arc<PipelineService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            service.sweep_expired().await;
        }
    })
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<SessionTicket, PipelineError> {
        PipelineService::upload(self, file_name, bytes).await
    }

    async fn handle_phase(
        &self,
        session_id: Uuid,
        trigger: PhaseTrigger,
        progress: &ProgressReporter,
    ) -> Result<SessionState, PipelineError> {
        PipelineService::handle_phase(self, session_id, trigger, progress).await
    }

    async fn session_status(&self, session_id: Uuid) -> Result<SessionStatus, PipelineError> {
        PipelineService::session_status(self, session_id).await
    }

    async fn summary_artifact(&self, session_id: Uuid) -> Result<Artifact, PipelineError> {
        PipelineService::summary_artifact(self, session_id).await
    }

    async fn generate_audio(&self, session_id: Uuid) -> Result<AudioOutcome, PipelineError> {
        PipelineService::generate_audio(self, session_id).await
    }

    async fn audio_artifact(&self, session_id: Uuid) -> Result<Artifact, PipelineError> {
        PipelineService::audio_artifact(self, session_id).await
    }

    async fn reset(&self) -> Result<usize, PipelineError> {
        PipelineService::reset(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        PipelineService::metrics_snapshot(self)
    }

    fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }
}
