//! HTTP surface for booksum.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /upload` – Multipart upload of a PDF (`file` field). Opens a session and returns its
//!   identifier together with the name used for persisted artifacts.
//! - `GET /sessions/:id` – Session state, chunk count, and readability scores once available.
//! - `GET /sessions/:id/events` – WebSocket progress channel. Clients send phase triggers
//!   (`preprocess`, `chunk`, `chunk_summarize`, `post_process`) and receive progress events.
//! - `GET /sessions/:id/summary` – Download the persisted summary.
//! - `POST /sessions/:id/audio` – Render the persisted summary to speech.
//! - `GET /sessions/:id/audio` – Download the rendered audio.
//! - `POST /admin/reset` – Drop every session and delete stored artifacts.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::metrics::MetricsSnapshot;
use crate::pipeline::{
    Artifact, AudioOutcome, ClientMessage, EventKind, PhaseTrigger, PipelineApi, PipelineError,
    ProgressEvent, ProgressReporter, SessionStatus, SessionTicket,
};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        ws::{Message, WebSocketUpgrade},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Build the HTTP router exposing the summarization API surface.
pub fn create_router<S>(service: Arc<S>, upload_limit: usize) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/upload", post(upload_document::<S>))
        .route("/sessions/:id", get(session_status::<S>))
        .route("/sessions/:id/events", get(session_events::<S>))
        .route("/sessions/:id/summary", get(download_summary::<S>))
        .route(
            "/sessions/:id/audio",
            get(download_audio::<S>).post(generate_audio::<S>),
        )
        .route("/admin/reset", post(reset_storage::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(service)
}

/// Success response for the `POST /upload` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    #[serde(flatten)]
    ticket: SessionTicket,
    message: &'static str,
}

/// Store an uploaded PDF and open a session for it.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: PipelineApi,
{
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::BadRequest(error.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(AppError::BadRequest("No selected file".into()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|error| AppError::BadRequest(error.to_string()))?;
        let ticket = service.upload(&file_name, bytes.to_vec()).await?;
        tracing::info!(session_id = %ticket.session_id, name = %ticket.name, "Upload request completed");
        return Ok(Json(UploadResponse {
            ticket,
            message: "File uploaded successfully",
        }));
    }
    Err(AppError::BadRequest("No file part".into()))
}

/// Report the current state of a session.
async fn session_status<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionStatus>, AppError>
where
    S: PipelineApi,
{
    Ok(Json(service.session_status(session_id).await?))
}

/// Upgrade to the progress channel of an existing session.
async fn session_events<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError>
where
    S: PipelineApi + 'static,
{
    service.session_status(session_id).await?;
    Ok(ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        run_channel(service, session_id, sink, stream).await;
    }))
}

/// Drive one progress channel until the client goes away.
///
/// Incoming triggers are queued to a worker that runs phases one at a time; outgoing events and
/// keepalive pings share a single writer task.
async fn run_channel<S, Tx, Rx, E>(service: Arc<S>, session_id: Uuid, mut sink: Tx, mut stream: Rx)
where
    S: PipelineApi + 'static,
    Tx: Sink<Message> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
{
    tracing::info!(%session_id, "Progress channel opened");
    let (reporter, mut events) = ProgressReporter::channel();
    reporter.emit(ProgressEvent::new(
        EventKind::Status,
        0,
        "Summarization started. Preprocessing text...",
    ));

    let keepalive = service.keepalive_interval();
    let writer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(keepalive);
        ticker.tick().await;
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(error) => {
                            tracing::warn!(error = %error, "Failed to encode progress event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sink.close().await;
    });

    let (triggers, mut queued) = mpsc::unbounded_channel::<PhaseTrigger>();
    let worker = tokio::spawn({
        let service = service.clone();
        let reporter = reporter.clone();
        async move {
            while let Some(trigger) = queued.recv().await {
                // failures are already reported on the channel
                let _ = service.handle_phase(session_id, trigger, &reporter).await;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientMessage::parse(&text) {
                Ok(message) => {
                    tracing::debug!(%session_id, trigger = %message.event, note = %message.data.text, "Trigger received");
                    if triggers.send(message.event).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::warn!(%session_id, error = %error, "Unrecognized channel message");
                    reporter.emit(ProgressEvent::failure(format!(
                        "Unrecognized message: {error}"
                    )));
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(%session_id, error = %error, "Progress channel read failed");
                break;
            }
        }
    }

    drop(triggers);
    if let Err(error) = worker.await {
        tracing::warn!(%session_id, error = %error, "Phase worker aborted");
    }
    drop(reporter);
    if let Err(error) = writer.await {
        tracing::warn!(%session_id, error = %error, "Progress writer aborted");
    }
    tracing::info!(%session_id, "Progress channel closed");
}

fn attachment(artifact: Artifact, content_type: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}

/// Download the persisted summary as Latin-1 text.
async fn download_summary<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, AppError>
where
    S: PipelineApi,
{
    let artifact = service.summary_artifact(session_id).await?;
    Ok(attachment(artifact, "text/plain; charset=iso-8859-1"))
}

/// Render the persisted summary to audio.
async fn generate_audio<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<AudioOutcome>, AppError>
where
    S: PipelineApi,
{
    Ok(Json(service.generate_audio(session_id).await?))
}

/// Download the rendered audio.
async fn download_audio<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, AppError>
where
    S: PipelineApi,
{
    let artifact = service.audio_artifact(session_id).await?;
    Ok(attachment(artifact, "audio/mpeg"))
}

/// Response body for `POST /admin/reset`.
#[derive(Serialize)]
struct ResetResponse {
    status: &'static str,
    files_removed: usize,
}

/// Drop every session and delete stored artifacts.
async fn reset_storage<S>(State(service): State<Arc<S>>) -> Result<Json<ResetResponse>, AppError>
where
    S: PipelineApi,
{
    let files_removed = service.reset().await?;
    Ok(Json(ResetResponse {
        status: "success",
        files_removed,
    }))
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/upload",
                description: "Upload a PDF as multipart field 'file'. Response returns { \"session_id\": string, \"name\": string }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "session_status",
                method: "GET",
                path: "/sessions/{id}",
                description: "Return the session state, chunk count, and readability scores.",
                request_example: None,
            },
            CommandDescriptor {
                name: "events",
                method: "GET",
                path: "/sessions/{id}/events",
                description: "WebSocket progress channel. Send phase triggers in order and receive progress events.",
                request_example: Some(json!({
                    "event": "preprocess",
                    "data": { "text": "start" }
                })),
            },
            CommandDescriptor {
                name: "download_summary",
                method: "GET",
                path: "/sessions/{id}/summary",
                description: "Download the persisted summary text.",
                request_example: None,
            },
            CommandDescriptor {
                name: "generate_audio",
                method: "POST",
                path: "/sessions/{id}/audio",
                description: "Render the persisted summary to speech.",
                request_example: None,
            },
            CommandDescriptor {
                name: "download_audio",
                method: "GET",
                path: "/sessions/{id}/audio",
                description: "Download the rendered audio.",
                request_example: None,
            },
            CommandDescriptor {
                name: "reset",
                method: "POST",
                path: "/admin/reset",
                description: "Drop all sessions and delete every stored artifact.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Pipeline(PipelineError),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(error) => match error {
                PipelineError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                PipelineError::SessionNotFound(_) | PipelineError::ArtifactMissing(_) => {
                    StatusCode::NOT_FOUND
                }
                PipelineError::PhaseOrder { .. } => StatusCode::CONFLICT,
                PipelineError::Extraction(_) | PipelineError::Chunking(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PipelineError::Summarization(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Persistence(_) | PipelineError::Speech(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        };
        let message = match self {
            Self::BadRequest(message) => message,
            Self::Pipeline(error) => error.to_string(),
        };
        (status, message).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self::Pipeline(inner)
    }
}
