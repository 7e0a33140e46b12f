use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::{HeaderValue, Request, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    error::{StudyError, StudyResult},
    models::{DownloadPdfRequest, StudyDocumentResponse, UploadedFile},
    tasks::{ContentStrategy, GeminiClient, PdfRenderer, StudyGenerator},
};

const PDF_FIELD: &str = "pdf";
const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AppState {
    pub strategy: ContentStrategy,
    pub generator: Arc<dyn StudyGenerator>,
    pub renderer: PdfRenderer,
}

impl AppState {
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        if config.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY is not set; every generation request will fail");
        }

        let renderer = PdfRenderer::from_config(config)?;
        if !renderer.has_embedded_font() {
            info!("PDF_FONT_PATH not set; exported PDFs use builtin Helvetica (WinAnsi only)");
        }

        Ok(Self {
            strategy: ContentStrategy::from_config(config),
            generator: Arc::new(GeminiClient::from_config(config)),
            renderer,
        })
    }
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    Ok(build_router(AppState::from_config(config)?))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route(
            "/api/generate-study-document",
            post(generate_study_document).get(method_not_allowed),
        )
        .route("/api/download-pdf", post(download_pdf))
        // Uploads are not size limited.
        .layer(DefaultBodyLimit::disable())
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tag every request with a correlation id, in its tracing span and in the response.
async fn correlation_id_middleware(request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "Study Document Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Turns uploaded PDFs into simplified study documents",
        "contentStrategy": format!("{:?}", state.strategy.kind()),
        "endpoints": {
            "POST /api/generate-study-document": "Upload a PDF (multipart field 'pdf') and receive a study document",
            "POST /api/download-pdf": "Render study document text ({\"content\": ...}) as a PDF",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed. Use POST to upload a PDF." })),
    )
}

async fn generate_study_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> StudyResult<Json<StudyDocumentResponse>> {
    let multipart = multipart.map_err(|e| {
        error!("Error in generate-study-document API: {}", e);
        StudyError::Internal
    })?;

    let file = validate_pdf_upload(read_pdf_field(multipart).await?)?;
    info!(
        "Generating study document for {} ({} bytes, {:?})",
        file.file_name.as_deref().unwrap_or("unnamed upload"),
        file.len(),
        state.strategy.kind()
    );

    let response = state.strategy.generate(file, state.generator.as_ref()).await?;
    Ok(Json(response))
}

/// Return the first `pdf` field of the form, if any.
async fn read_pdf_field(mut multipart: Multipart) -> StudyResult<Option<UploadedFile>> {
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            error!("Failed to read multipart body: {}", e);
            StudyError::Internal
        })?;

        let Some(field) = field else {
            return Ok(None);
        };

        if field.name() != Some(PDF_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let media_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            error!("Failed to read uploaded file: {}", e);
            StudyError::Internal
        })?;

        return Ok(Some(UploadedFile::new(file_name, media_type, bytes)));
    }
}

fn validate_pdf_upload(file: Option<UploadedFile>) -> StudyResult<UploadedFile> {
    let file = file.ok_or(StudyError::MissingFile)?;
    if !file.is_pdf() {
        info!("Rejected upload with media type {:?}", file.media_type);
        return Err(StudyError::NotPdf);
    }
    Ok(file)
}

async fn download_pdf(
    State(state): State<AppState>,
    request: Result<Json<DownloadPdfRequest>, JsonRejection>,
) -> StudyResult<Response> {
    let Json(request) = request.map_err(|e| {
        warn!("Invalid download-pdf request: {}", e);
        StudyError::EmptyContent
    })?;

    if request.content.trim().is_empty() {
        return Err(StudyError::EmptyContent);
    }
    info!("Rendering PDF for {} characters", request.content.len());

    let pdf = tokio::task::spawn_blocking(move || {
        state.renderer.render(&request.content, "Study Document")
    })
    .await
    .map_err(|e| {
        error!("PDF rendering task failed: {}", e);
        StudyError::Render
    })??;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_file_name(chrono::Utc::now().date_naive())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

fn download_file_name(date: chrono::NaiveDate) -> String {
    format!("study-document-{}.pdf", date.format("%Y-%m-%d"))
}
