use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::page::render;
use super::types::{Flash, PageView};
use crate::config::AppConfig;
use crate::handler::{Submission, SubmissionHandler, UploadedFile};
use crate::utils::ocr::TesseractOcr;
use crate::utils::pdf::PdfExtractor;
use crate::utils::summarizer::HuggingFaceSummarizer;

const TEXT_FIELD: &str = "bill_text";
const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    handler: Arc<SubmissionHandler>,
}

impl AppState {
    pub fn new(handler: SubmissionHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

/// Wires the production extractors and summarization client from the config.
pub fn build_handler(config: &AppConfig) -> Result<SubmissionHandler> {
    let summarizer = HuggingFaceSummarizer::new(
        config.summarizer_url.clone(),
        config.api_token.clone(),
        config.summarizer_timeout,
    )
    .context("failed to create HTTP client for the summarization API")?;

    Ok(SubmissionHandler::new(
        config.upload_dir.clone(),
        Arc::new(PdfExtractor::new()),
        Arc::new(TesseractOcr::new(&config.tesseract_cmd, &config.ocr_lang)),
        Arc::new(summarizer),
    ))
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Creates the upload directory, binds the listener and serves until Ctrl+C.
pub async fn serve(config: Arc<AppConfig>, handler: SubmissionHandler) -> Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create upload directory {}", config.upload_dir.display()))?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    let app = router(AppState::new(handler), config.max_upload_bytes);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn index() -> Html<String> {
    Html(render(&PageView::default()))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn submit(State(state): State<AppState>, headers: HeaderMap, request: Request) -> Response {
    let json = wants_json(&headers);

    let submission = match read_submission(request).await {
        Ok(submission) => submission,
        Err((status, message)) => {
            warn!(status = %status, "Could not read submission: {}", message);
            let view = PageView::with_flash(Flash::danger(format!(
                "Could not read the submitted form: {}",
                message
            )));
            return respond(status, view, json);
        }
    };

    let outcome = state.handler.process(submission).await;
    respond(StatusCode::OK, PageView::from(outcome), json)
}

fn respond(status: StatusCode, view: PageView, json: bool) -> Response {
    if json {
        (status, Json(view)).into_response()
    } else {
        (status, Html(render(&view))).into_response()
    }
}

/// JSON is served only when the client ranks `application/json` above
/// `text/html`; on equal quality the range listed first wins.
fn wants_json(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    match (
        preference(accept, "application/json"),
        preference(accept, "text/html"),
    ) {
        (Some((json_q, _)), _) if json_q <= 0.0 => false,
        (Some(_), None) => true,
        (Some((json_q, json_pos)), Some((html_q, html_pos))) => {
            json_q > html_q || (json_q == html_q && json_pos < html_pos)
        }
        (None, _) => false,
    }
}

/// Quality and position of the most specific `Accept` range matching
/// `media_type` (exact, then `type/*`, then `*/*`).
fn preference(accept: &str, media_type: &str) -> Option<(f32, usize)> {
    let main_type = media_type.split('/').next().unwrap_or(media_type);
    let wildcard = format!("{}/*", main_type);
    let mut best: Option<(u8, f32, usize)> = None;

    for (position, range) in accept.to_ascii_lowercase().split(',').enumerate() {
        let mut params = range.split(';');
        let range_type = params.next().unwrap_or_default().trim();
        let specificity = if range_type == media_type {
            2
        } else if range_type == wildcard {
            1
        } else if range_type == "*/*" {
            0
        } else {
            continue;
        };
        let quality = params
            .filter_map(|param| param.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);

        if best.map_or(true, |(current, _, _)| specificity > current) {
            best = Some((specificity, quality, position));
        }
    }

    best.map(|(_, quality, position)| (quality, position))
}

/// Decodes a multipart or urlencoded body into a [`Submission`]. A POST
/// without any body type carries nothing.
async fn read_submission(request: Request) -> Result<Submission, (StatusCode, String)> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase());

    match content_type.as_deref() {
        None => Ok(Submission::Empty),
        Some(ct) if ct.starts_with("multipart/form-data") => {
            let mut multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| (e.status(), e.body_text()))?;
            read_multipart(&mut multipart)
                .await
                .map_err(|e| (e.status(), e.body_text()))
        }
        Some(_) => {
            let Form(mut fields) = Form::<HashMap<String, String>>::from_request(request, &())
                .await
                .map_err(|e| (e.status(), e.body_text()))?;
            Ok(Submission::from_parts(fields.remove(TEXT_FIELD), None))
        }
    }
}

async fn read_multipart(
    multipart: &mut Multipart,
) -> Result<Submission, axum::extract::multipart::MultipartError> {
    let mut text = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(TEXT_FIELD) => text = Some(field.text().await?),
            Some(FILE_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?.to_vec();
                // An untouched file input still sends a nameless, empty part
                if file_name.is_empty() && bytes.is_empty() {
                    debug!("Ignoring empty file part");
                    continue;
                }
                debug!(file_name = %file_name, size = bytes.len(), "Received file part");
                file = Some(UploadedFile { file_name, bytes });
            }
            other => debug!(field = ?other, "Ignoring form field"),
        }
    }

    Ok(Submission::from_parts(text, file))
}
