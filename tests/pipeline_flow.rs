use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use booksum::{
    api, config,
    pipeline::{
        EventKind, PhaseTrigger, PipelineError, PipelineService, PipelineSettings,
        ProgressEvent, ProgressReporter, SessionSettings, SessionState,
        dispatch::DispatchSettings,
    },
    speech::CommandSynthesizer,
    storage::ArtifactStore,
    summarization::{
        HuggingFaceSummarizationClient, SummarizationClient, SummarizationClientError,
        SummaryBounds,
    },
};
use httpmock::{Method::POST, MockServer};
use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};
use serde_json::json;
use tokio::sync::{OnceCell, mpsc::UnboundedReceiver};
use tower::ServiceExt;
use uuid::Uuid;

const UPLOAD_LIMIT: usize = 4 * 1024 * 1024;

static HARNESS: OnceCell<Harness> = OnceCell::const_new();

fn set_env(key: &str, value: &str) {
    // SAFETY: Tests run in a single process and establish deterministic configuration upfront.
    unsafe { std::env::set_var(key, value) }
}

struct Harness {
    _mock_server: MockServer,
    service: Arc<PipelineService>,
}

impl Harness {
    fn router(&self) -> Router {
        api::create_router(self.service.clone(), UPLOAD_LIMIT)
    }
}

async fn harness() -> &'static Harness {
    HARNESS
        .get_or_init(|| async {
            let mock_server = MockServer::start_async().await;
            mock_server
                .mock_async(|when, then| {
                    when.method(POST)
                        .path("/models/facebook/bart-large-cnn")
                        .body_contains("\"inputs\"");
                    then.status(200)
                        .json_body(json!([{ "summary_text": "They dont stop." }]));
                })
                .await;

            let storage = std::env::temp_dir().join(format!("booksum-it-{}", Uuid::new_v4()));
            set_env("STORAGE_DIR", &storage.display().to_string());
            set_env("SUMMARIZATION_PROVIDER", "huggingface");
            set_env("SUMMARIZATION_URL", &mock_server.base_url());
            set_env("MAX_CHUNK_WORDS", "6");
            set_env("DISPATCH_DELAY_MS", "0");
            set_env("TTS_COMMAND", "booksum-missing-tts");

            let config = config::init_config().expect("config");
            let service = Arc::new(PipelineService::new(config).expect("service"));
            Harness {
                _mock_server: mock_server,
                service,
            }
        })
        .await
}

fn text_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content stream"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

fn upload_request(file_name: &str, content: &[u8]) -> Request<Body> {
    let boundary = "booksum-it-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request")
}

async fn upload(router: Router, file_name: &str, content: &[u8]) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(upload_request(file_name, content))
        .await
        .expect("router response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn drain(events: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

fn session_id(ticket: &serde_json::Value) -> Uuid {
    ticket["session_id"]
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .expect("session id")
}

#[tokio::test]
async fn pdf_runs_through_every_phase() {
    let harness = harness().await;
    let pdf = text_pdf(
        "The sea was calm that night. The boat drifted slowly east. Nobody aboard said a word.",
    );
    let (status, ticket) = upload(harness.router(), "Calm Sea.pdf", &pdf).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["name"], "Calm_Sea");
    let id = session_id(&ticket);

    let (reporter, mut events) = ProgressReporter::channel();
    for trigger in [
        PhaseTrigger::Preprocess,
        PhaseTrigger::Chunk,
        PhaseTrigger::ChunkSummarize,
        PhaseTrigger::PostProcess,
    ] {
        harness
            .service
            .handle_phase(id, trigger, &reporter)
            .await
            .unwrap_or_else(|error| panic!("{trigger} failed: {error}"));
    }

    let status = harness.service.session_status(id).await.expect("status");
    assert_eq!(status.state, SessionState::Persisted);
    let chunk_count = status.chunk_count.expect("chunk count");
    assert!(chunk_count >= 1);
    assert!(status.scores.is_some());

    let events = drain(&mut events);
    assert!(events.iter().all(|event| event.event != EventKind::Failure));
    let per_chunk: Vec<usize> = events
        .iter()
        .filter(|event| event.event == EventKind::SummChunk)
        .filter_map(|event| event.data.count)
        .collect();
    assert_eq!(per_chunk, (1..=chunk_count).collect::<Vec<_>>());

    let expected = vec!["They don't stop."; chunk_count].join(" ");
    let final_event = events.last().expect("summary event");
    assert_eq!(final_event.event, EventKind::Summary);
    assert_eq!(final_event.data.text, expected);

    let response = harness
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{id}/summary"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Calm_Sea_summary.txt\""
    );
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    assert_eq!(String::from_utf8_lossy(&body), expected);

    let audio = harness.service.generate_audio(id).await;
    assert!(matches!(audio, Err(PipelineError::Speech(_))));
}

struct PassThroughClient;

#[async_trait]
impl SummarizationClient for PassThroughClient {
    async fn summarize(
        &self,
        text: &str,
        _bounds: SummaryBounds,
    ) -> Result<String, SummarizationClientError> {
        Ok(text.to_string())
    }
}

async fn run_all_phases(service: &PipelineService, id: Uuid) -> String {
    let (reporter, mut events) = ProgressReporter::channel();
    for trigger in [
        PhaseTrigger::Preprocess,
        PhaseTrigger::Chunk,
        PhaseTrigger::ChunkSummarize,
        PhaseTrigger::PostProcess,
    ] {
        service
            .handle_phase(id, trigger, &reporter)
            .await
            .unwrap_or_else(|error| panic!("{trigger} failed: {error}"));
    }
    let events = drain(&mut events);
    let last = events.last().expect("summary event");
    assert_eq!(last.event, EventKind::Summary);
    last.data.text.clone()
}

#[tokio::test]
async fn same_file_name_uploads_keep_their_own_content() {
    let storage = ArtifactStore::new(
        std::env::temp_dir().join(format!("booksum-same-name-{}", Uuid::new_v4())),
    );
    let service = PipelineService::with_components(
        Arc::new(PassThroughClient),
        Arc::new(CommandSynthesizer::new("booksum-missing-tts", 150)),
        storage.clone(),
        PipelineSettings {
            max_chunk_words: 50,
            dispatch: DispatchSettings {
                delay: Duration::ZERO,
                ..DispatchSettings::default()
            },
        },
        SessionSettings::default(),
    );

    let first = service
        .upload("book.pdf", text_pdf("Alice wrote this."))
        .await
        .expect("first upload");
    let second = service
        .upload("book.pdf", text_pdf("Bob wrote this."))
        .await
        .expect("second upload");
    assert_eq!(first.name, second.name);
    assert_ne!(first.session_id, second.session_id);

    let first_summary = run_all_phases(&service, first.session_id).await;
    assert!(first_summary.contains("Alice"), "{first_summary}");
    assert!(!first_summary.contains("Bob"), "{first_summary}");

    let second_summary = run_all_phases(&service, second.session_id).await;
    assert!(second_summary.contains("Bob"), "{second_summary}");
    assert!(!second_summary.contains("Alice"), "{second_summary}");

    storage.reset().await.expect("cleanup");
}

#[tokio::test]
async fn non_pdf_upload_is_rejected() {
    let harness = harness().await;
    let (status, _) = upload(harness.router(), "notes.txt", b"plain text").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn out_of_order_trigger_reports_failure() {
    let harness = harness().await;
    let (status, ticket) = upload(harness.router(), "order.pdf", &text_pdf("Short text.")).await;
    assert_eq!(status, StatusCode::OK);
    let id = session_id(&ticket);

    let (reporter, mut events) = ProgressReporter::channel();
    let error = harness
        .service
        .handle_phase(id, PhaseTrigger::Chunk, &reporter)
        .await
        .expect_err("chunk before preprocess");
    assert!(matches!(
        error,
        PipelineError::PhaseOrder {
            trigger: PhaseTrigger::Chunk,
            state: SessionState::Created
        }
    ));
    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventKind::Failure);

    let status = harness.service.session_status(id).await.expect("status");
    assert_eq!(status.state, SessionState::Created);
}

#[tokio::test]
async fn corrupt_pdf_fails_extraction() {
    let harness = harness().await;
    let (status, ticket) = upload(harness.router(), "corrupt.pdf", b"%PDF-garbage").await;
    assert_eq!(status, StatusCode::OK);
    let id = session_id(&ticket);

    let (reporter, mut events) = ProgressReporter::channel();
    let error = harness
        .service
        .handle_phase(id, PhaseTrigger::Preprocess, &reporter)
        .await
        .expect_err("extraction");
    assert!(matches!(error, PipelineError::Extraction(_)));
    assert_eq!(drain(&mut events)[0].event, EventKind::Failure);
}

#[tokio::test]
async fn provider_outage_leaves_session_chunked() {
    let outage = MockServer::start_async().await;
    let failing = outage
        .mock_async(|when, then| {
            when.method(POST).path("/models/test-model");
            then.status(503).body("loading");
        })
        .await;

    let storage = ArtifactStore::new(
        std::env::temp_dir().join(format!("booksum-outage-{}", Uuid::new_v4())),
    );
    let service = PipelineService::with_components(
        Arc::new(HuggingFaceSummarizationClient::new(
            outage.base_url(),
            "test-model",
            None,
        )),
        Arc::new(CommandSynthesizer::new("booksum-missing-tts", 150)),
        storage.clone(),
        PipelineSettings {
            max_chunk_words: 5,
            dispatch: DispatchSettings {
                delay: Duration::ZERO,
                ..DispatchSettings::default()
            },
        },
        SessionSettings::default(),
    );

    let ticket = service
        .upload("outage.pdf", text_pdf("One two three. Four five six."))
        .await
        .expect("upload");
    let (reporter, mut events) = ProgressReporter::channel();
    service
        .handle_phase(ticket.session_id, PhaseTrigger::Preprocess, &reporter)
        .await
        .expect("preprocess");
    service
        .handle_phase(ticket.session_id, PhaseTrigger::Chunk, &reporter)
        .await
        .expect("chunk");
    drain(&mut events);

    let error = service
        .handle_phase(ticket.session_id, PhaseTrigger::ChunkSummarize, &reporter)
        .await
        .expect_err("provider outage");
    assert!(matches!(&error, PipelineError::Summarization(inner) if inner.chunk_index == 0));
    failing.assert_hits_async(1).await;

    let status = service
        .session_status(ticket.session_id)
        .await
        .expect("status");
    assert_eq!(status.state, SessionState::Chunked);
    let events = drain(&mut events);
    assert_eq!(events.last().map(|event| event.event), Some(EventKind::Failure));
    assert_eq!(service.metrics_snapshot().phase_failures, 1);

    storage.reset().await.expect("cleanup");
}
