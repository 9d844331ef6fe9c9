pub mod config;
pub mod decoder;
pub mod import;
pub mod templates;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Local};
use config::{ServerConfig, parse_flag};
use decoder::{
    Channel, DecodeContext, DecodeError, DecodedFile, SessionIdentity, TourRecord, TourSummary,
    WalkOutcome, decode_hac5_bytes, derive_tour_summary,
};
use import::{Admission, TourRegistry};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use templates::{render_landing_page, render_processed_upload};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Shared state of the upload service.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<Mutex<TourRegistry>>,
    pub uploads: Arc<Mutex<UploadStore>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(TourRegistry::new())),
            uploads: Arc::new(Mutex::new(UploadStore::new(config.max_uploads))),
            config,
        }
    }
}

/// Recent uploads kept for their download link. The oldest upload is
/// evicted once `capacity` is exceeded.
#[derive(Debug)]
pub struct UploadStore {
    capacity: usize,
    order: VecDeque<Uuid>,
    uploads: HashMap<Uuid, ProcessedUpload>,
}

impl UploadStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            uploads: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&ProcessedUpload> {
        self.uploads.get(id)
    }

    pub fn insert(&mut self, upload: ProcessedUpload) {
        self.order.push_back(upload.id);
        self.uploads.insert(upload.id, upload);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                tracing::debug!("evicting upload {evicted}");
                self.uploads.remove(&evicted);
            }
        }
    }
}

/// One decoded tour as listed on the overview page.
#[derive(Debug, Clone)]
pub struct TourView {
    pub identity: SessionIdentity,
    pub start: String,
    pub admission: Admission,
    pub summary: TourSummary,
    pub sample_count: usize,
    pub absent: Vec<Channel>,
}

#[derive(Debug, Clone)]
pub struct DumpOverview {
    pub tours: Vec<TourView>,
    /// Human-readable reason the ring walk stopped.
    pub outcome: String,
}

/// Result of one uploaded file; failures keep their error message.
#[derive(Debug, Clone)]
pub struct ProcessedDump {
    pub file_name: String,
    pub result: Result<DumpOverview, String>,
}

/// Everything produced by one upload request, kept for the download link.
#[derive(Debug, Clone)]
pub struct ProcessedUpload {
    pub id: Uuid,
    pub dumps: Vec<ProcessedDump>,
    pub records: Vec<TourRecord>,
}

pub fn build_app() -> Router {
    build_app_with(AppState::new(ServerConfig::default()))
}

pub fn build_app_with(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/upload", post(handle_upload))
        .route("/download/:id", get(handle_download))
        .with_state(state)
}

async fn landing_page() -> Html<String> {
    Html(render_landing_page())
}

fn describe_outcome(outcome: &WalkOutcome) -> String {
    match outcome {
        WalkOutcome::EndOfData => "All recorded tours were read.".to_string(),
        WalkOutcome::RingClosed => "The whole ring buffer was read.".to_string(),
        WalkOutcome::Aborted(error) => format!("Reading stopped early: {error}"),
    }
}

/// Admit decoded files into the registry and collect what the page shows.
pub fn build_upload(
    decoded: Vec<(String, Result<DecodedFile, DecodeError>)>,
    registry: &mut TourRegistry,
) -> ProcessedUpload {
    let mut dumps = Vec::with_capacity(decoded.len());
    let mut records = Vec::new();

    for (file_name, result) in decoded {
        let result = result.map_err(|err| err.to_string()).map(|file| {
            let tours = file
                .sessions
                .iter()
                .map(|decoded| {
                    records.push(decoded.session.to_tour_record(decoded.identity));
                    TourView {
                        identity: decoded.identity,
                        start: decoded.session.start.to_string(),
                        admission: registry.admit(decoded),
                        summary: derive_tour_summary(&decoded.session),
                        sample_count: decoded.session.samples.len(),
                        absent: decoded.session.absent.clone(),
                    }
                })
                .collect();
            DumpOverview {
                tours,
                outcome: describe_outcome(&file.outcome),
            }
        });
        dumps.push(ProcessedDump { file_name, result });
    }

    ProcessedUpload {
        id: Uuid::new_v4(),
        dumps,
        records,
    }
}

async fn handle_upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut uploaded: Vec<(String, Vec<u8>)> = Vec::new();
    let mut options = state.config.decode_options();

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => uploaded.push((file_name, bytes.to_vec())),
                    Err(err) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read uploaded file: {err}"),
                        )
                            .into_response();
                    }
                }
            }
            Some("import_year") => {
                if let Ok(value) = field.text().await {
                    if let Ok(year) = value.trim().parse() {
                        options.import_year = Some(year);
                    }
                }
            }
            Some("skip_checksum") => {
                if let Ok(value) = field.text().await {
                    options.skip_checksum = parse_flag(&value);
                }
            }
            _ => {}
        }
    }

    if uploaded.is_empty() {
        return (StatusCode::BAD_REQUEST, "No file provided").into_response();
    }

    // Uploads carry no file date, so the current year is the reference.
    let context = DecodeContext::resolve(&options, Local::now().year());
    let tasks: Vec<_> = uploaded
        .into_iter()
        .map(|(file_name, bytes)| {
            let options = options.clone();
            tokio::task::spawn_blocking(move || {
                let result = decode_hac5_bytes(bytes, &context, &options);
                (file_name, result)
            })
        })
        .collect();

    let mut decoded = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok((file_name, result)) => {
                if let Err(err) = &result {
                    tracing::warn!("rejected upload {file_name}: {err}");
                }
                decoded.push((file_name, result));
            }
            Err(err) => {
                tracing::error!("decode worker failed: {err}");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Decoding failed").into_response();
            }
        }
    }

    if decoded.iter().all(|(_, result)| result.is_err()) {
        let message = decoded
            .iter()
            .filter_map(|(name, result)| result.as_ref().err().map(|err| format!("{name}: {err}")))
            .collect::<Vec<_>>()
            .join("\n");
        return render_processing_error(message);
    }

    let upload = {
        let mut registry = state.registry.lock().await;
        build_upload(decoded, &mut registry)
    };
    let rendered = render_processed_upload(&upload, &format!("/download/{}", upload.id));
    state.uploads.lock().await.insert(upload);

    Html(rendered).into_response()
}

async fn handle_download(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.uploads.lock().await.get(&id) {
        Some(upload) => Json(upload.records.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "Unknown upload").into_response(),
    }
}

fn render_processing_error(message: String) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}
