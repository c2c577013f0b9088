#![cfg(feature = "web")]
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Local};
use log::{error, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::Args;
use crate::downloader;
use crate::error::HeatmapError;
use crate::figure::{self, FigureOptions, TITLE};
use crate::graph::{self, GraphOptions};
use crate::grid::{Aggregation, AggregationSummary, aggregate_rows};
use crate::loader;
use crate::saving;

/// The aggregation currently on display and where it came from.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub aggregation: Aggregation,
    pub source: String,
    pub loaded_at: DateTime<Local>,
}

impl Snapshot {
    pub fn new(aggregation: Aggregation, source: impl Into<String>) -> Self {
        Snapshot {
            aggregation,
            source: source.into(),
            loaded_at: Local::now(),
        }
    }
}

pub struct AppState {
    snapshot: Mutex<Snapshot>,
    workbook: PathBuf,
    sheet: String,
}

impl AppState {
    pub fn new(snapshot: Snapshot, workbook: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        AppState {
            snapshot: Mutex::new(snapshot),
            workbook: workbook.into(),
            sheet: sheet.into(),
        }
    }

    fn snapshot(&self) -> MutexGuard<'_, Snapshot> {
        // A panicked request leaves the previous snapshot intact.
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Serialize)]
struct UploadResponse {
    status: String,
    message: Option<String>,
    summary: Option<AggregationSummary>,
}

impl UploadResponse {
    fn error(message: String) -> Self {
        UploadResponse {
            status: "error".to_string(),
            message: Some(message),
            summary: None,
        }
    }
}

/// Builds the router over `state`, accepting uploads up to `max_upload_bytes`.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/figure", get(get_figure))
        .route("/api/summary", get(get_summary))
        .route("/api/upload", post(upload_spreadsheet))
        .route("/heatmap.png", get(get_png))
        .route("/export/grid.csv", get(export_csv))
        .route("/export/grid.xlsx", get(export_xlsx))
        .route("/export/figure.html", get(export_html))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

pub async fn run(args: &Args, snapshot: Snapshot) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState::new(
        snapshot,
        args.workbook.clone(),
        args.sheet.clone(),
    ));
    let app = router(app_state, args.max_upload_bytes);

    let addr = args.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn get_figure(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    Json(figure::build_figure(
        &snapshot.aggregation.grid,
        &FigureOptions::default(),
    ))
}

async fn get_summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    let mut summary = figure::summary_json(&snapshot.aggregation.summary);
    summary["source"] = serde_json::json!(snapshot.source);
    summary["loaded_at"] = serde_json::json!(snapshot.loaded_at.to_rfc3339());
    Json(summary)
}

async fn get_png(State(state): State<Arc<AppState>>) -> Response {
    let grid = state.snapshot().aggregation.grid.clone();
    match graph::create_heatmap_png(&grid, &GraphOptions::default()) {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Response {
    let result = downloader::to_csv(&state.snapshot().aggregation.grid);
    match result {
        Ok(csv) => attachment("text/csv", "grid.csv", csv.into_bytes()),
        Err(e) => internal_error(e),
    }
}

async fn export_xlsx(State(state): State<Arc<AppState>>) -> Response {
    let result = downloader::to_xlsx(&state.snapshot().aggregation.grid);
    match result {
        Ok(bytes) => attachment(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "grid.xlsx",
            bytes,
        ),
        Err(e) => internal_error(e),
    }
}

async fn export_html(State(state): State<Arc<AppState>>) -> Response {
    let figure = figure::build_figure(
        &state.snapshot().aggregation.grid,
        &FigureOptions::default(),
    );
    attachment(
        "text/html; charset=utf-8",
        "figure.html",
        figure::to_html(&figure, TITLE).into_bytes(),
    )
}

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

fn internal_error(e: HeatmapError) -> Response {
    error!("Request failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

/// Decodes the upload, replaces the workbook sheet, reloads it and re-aggregates.
///
/// Uploads without the `Alveoli` and `Count` headers are rejected before the
/// workbook is touched. The state lock is held from the write onwards so
/// uploads do not interleave their workbook writes.
fn apply_upload(state: &AppState, file_name: &str, bytes: &[u8]) -> Result<AggregationSummary, HeatmapError> {
    let table = loader::decode_upload(file_name, bytes, &state.sheet)?;
    table.records()?;

    let mut snapshot = state.snapshot();
    saving::replace_sheet(&state.workbook, &state.sheet, &table)?;
    let rows = loader::from_excel(&state.workbook, &state.sheet)?;
    let aggregation = aggregate_rows(&rows);
    let summary = aggregation.summary.clone();

    *snapshot = Snapshot::new(
        aggregation,
        format!("{} (sheet {})", state.workbook.display(), state.sheet),
    );
    Ok(summary)
}

async fn upload_spreadsheet(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    // Process the multipart form data
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed upload: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(UploadResponse::error(format!("Malformed upload: {}", e))),
                );
            }
        };

        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((file_name, bytes.to_vec())),
            Err(e) => {
                warn!("Failed to read upload {}: {}", file_name, e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(UploadResponse::error(format!("Failed to read upload: {}", e))),
                );
            }
        }
    }

    let Some((file_name, bytes)) = upload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(UploadResponse::error("No file data received".to_string())),
        );
    };

    info!("Received upload {} ({} bytes)", file_name, bytes.len());
    let result = {
        let file_name = file_name.clone();
        tokio::task::spawn_blocking(move || apply_upload(&state, &file_name, &bytes)).await
    };
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            error!("Upload {} aborted: {}", file_name, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(UploadResponse::error("Upload processing failed".to_string())),
            );
        }
    };

    match result {
        Ok(summary) => (
            StatusCode::OK,
            Json(UploadResponse {
                status: "ok".to_string(),
                message: None,
                summary: Some(summary),
            }),
        ),
        Err(e) => {
            warn!("Upload {} rejected: {}", file_name, e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(UploadResponse::error(format!(
                    "Failed to load spreadsheet: {}",
                    e
                ))),
            )
        }
    }
}
