//! HTTP surface over an [`Analyzer`].
//!
//! Every handler is a thin adapter: decode the request, call the analyzer or
//! the persistence gateway, encode the result. Failures become
//! `{"error": <message>, "step": <pipeline step or null>}` with a status
//! from [`status_for`]; nothing a request does can take the process down.

use crate::analyze::Analyzer;
use crate::error::AnalysisError;
use crate::output::{AnalysisOutcome, DeleteReport};
use crate::store::{Folder, SyncReport};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub type AppState = Arc<Analyzer>;

// ── Errors ───────────────────────────────────────────────────────────────────

/// HTTP status for a fatal analysis error.
pub fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::NotFound { .. } | AnalysisError::DownloadFailed { .. } => {
            StatusCode::NOT_FOUND
        }
        AnalysisError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// [`AnalysisError`] as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub AnalysisError);

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!(step = ?self.0.step(), "Request failed: {}", self.0);
        }
        let body = json!({
            "error": self.0.to_string(),
            "step": self.0.step(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn bad_request(detail: impl ToString) -> ApiError {
    ApiError(AnalysisError::InvalidRequest(detail.to_string()))
}

// ── Request bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FilenameRequest {
    #[serde(default)]
    filename: Option<String>,
}

impl FilenameRequest {
    fn required(self) -> ApiResult<String> {
        self.filename
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| bad_request("Filename is required"))
    }
}

#[derive(Debug, Deserialize)]
struct FilenamesRequest {
    #[serde(default)]
    filenames: Vec<String>,
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Every route, bound to `analyzer`.
pub fn router(analyzer: AppState) -> Router {
    let body_limit = analyzer.config().max_upload_bytes;

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/analyze", post(analyze))
        .route("/api/analyze-remote", post(analyze_remote))
        .route("/api/round_two_analysis", post(round_two_analysis))
        .route("/api/upload", post(upload))
        .route("/api/local-uploads", get(local_uploads))
        .route("/uploads/{filename}", get(download_upload))
        .route("/api/uploads", delete(delete_all_uploads))
        .route("/api/delete/{filename}", delete(delete_upload))
        .route("/api/successful_pitchdecks", get(successful_pitchdecks))
        .route(
            "/api/successful_pitchdecks/{filename}",
            delete(delete_successful_pitchdeck),
        )
        .route("/api/copy_successful_pitchdecks", post(copy_successful_pitchdecks))
        .route("/api/sync_check", get(sync_check));

    for folder in Folder::ARTIFACTS {
        app = app.merge(collection_routes(folder));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .with_state(analyzer)
}

/// List / fetch / delete routes for one artifact collection.
fn collection_routes(folder: Folder) -> Router<AppState> {
    let base = format!("/api/{}", folder.collection());
    let item = format!("{base}/{{filename}}");
    Router::new()
        .route(
            &base,
            get(move |State(a): State<AppState>| list_artifacts(a, folder))
                .delete(move |State(a): State<AppState>| delete_artifacts(a, folder)),
        )
        .route(
            &item,
            get(move |State(a): State<AppState>, Path(name): Path<String>| {
                get_artifact(a, folder, name)
            })
            .delete(move |State(a): State<AppState>, Path(name): Path<String>| {
                delete_artifact(a, folder, name)
            }),
        )
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(analyzer: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, analyzer).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(listener: TcpListener, analyzer: AppState) -> std::io::Result<()> {
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(analyzer)).await
}

// ── Analysis ─────────────────────────────────────────────────────────────────

fn outcome_body(outcome: &AnalysisOutcome) -> Value {
    let mut body = Map::new();
    if let Some(overview) = &outcome.overview {
        body.insert("Overview".into(), json!(overview));
    }
    body.insert("DetailedAnalysis".into(), json!(outcome.detailed_analysis));
    body.insert("Persistence".into(), json!(outcome.persistence));
    body.insert("ParseMisses".into(), json!(outcome.misses));
    Value::Object(body)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn analyze(
    State(a): State<AppState>,
    Json(req): Json<FilenameRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = a.analyze_round_one(&req.required()?).await?;
    Ok(Json(outcome_body(&outcome)))
}

async fn analyze_remote(
    State(a): State<AppState>,
    Json(req): Json<FilenameRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = a.analyze_round_one_remote(&req.required()?).await?;
    Ok(Json(outcome_body(&outcome)))
}

async fn round_two_analysis(
    State(a): State<AppState>,
    Json(req): Json<FilenameRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = a.analyze_round_two(&req.required()?).await?;
    Ok(Json(outcome_body(&outcome)))
}

// ── Uploads ──────────────────────────────────────────────────────────────────

async fn upload(State(a): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<Value>> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut name_override: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| bad_request(e.body_text()))? {
        match field.name().map(str::to_string).as_deref() {
            Some("file") => {
                let original = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
                file = Some((original, bytes.to_vec()));
            }
            Some("fileName") => {
                name_override = Some(field.text().await.map_err(|e| bad_request(e.body_text()))?);
            }
            _ => {}
        }
    }

    let (original, bytes) = file.ok_or_else(|| bad_request("Missing 'file' field"))?;
    let filename = name_override
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .or(original)
        .ok_or_else(|| bad_request("Missing file name"))?;

    let outcome = a.save_upload(&filename, bytes).await?;
    Ok(Json(json!({
        "message": "File uploaded successfully",
        "filename": filename,
        "persistence": outcome,
    })))
}

async fn local_uploads(State(a): State<AppState>) -> ApiResult<Json<Value>> {
    let files: Vec<Value> = a
        .list_uploads()
        .await?
        .into_iter()
        .map(|filename| json!({ "filename": filename }))
        .collect();
    Ok(Json(Value::Array(files)))
}

async fn download_upload(
    State(a): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let bytes = a.read_upload(&filename).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

async fn delete_upload(
    State(a): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<Value>> {
    let report = a.gateway().delete(Folder::Uploads, &filename).await?;
    Ok(Json(deleted_one(&filename, &report)))
}

async fn delete_all_uploads(State(a): State<AppState>) -> ApiResult<Json<Value>> {
    let report = a.gateway().delete_all(Folder::Uploads).await?;
    Ok(Json(deleted_many("uploads", &report)))
}

// ── Successful pitch decks ───────────────────────────────────────────────────

async fn successful_pitchdecks(State(a): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({ "filenames": a.list_successful().await? })))
}

async fn delete_successful_pitchdeck(
    State(a): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<Value>> {
    let report = a
        .gateway()
        .delete(Folder::SuccessfulPitchdecks, &filename)
        .await?;
    Ok(Json(deleted_one(&filename, &report)))
}

async fn copy_successful_pitchdecks(
    State(a): State<AppState>,
    Json(req): Json<FilenamesRequest>,
) -> ApiResult<Json<Value>> {
    let report = a.copy_successful(&req.filenames).await?;
    Ok(Json(json!({
        "message": format!("Copied {} successful pitch decks", report.copied.len()),
        "copied": report.copied,
        "skipped": report.skipped,
        "failed": report.failed,
        "persistence": report.persistence,
    })))
}

// ── Artifact collections ─────────────────────────────────────────────────────

async fn list_artifacts(a: AppState, folder: Folder) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(a.gateway().list(folder).await?))
}

async fn get_artifact(a: AppState, folder: Folder, name: String) -> ApiResult<Json<Value>> {
    Ok(Json(a.gateway().read_json(folder, &name).await?))
}

async fn delete_artifact(a: AppState, folder: Folder, name: String) -> ApiResult<Json<Value>> {
    let report = a.gateway().delete(folder, &name).await?;
    Ok(Json(deleted_one(&name, &report)))
}

async fn delete_artifacts(a: AppState, folder: Folder) -> ApiResult<Json<Value>> {
    let report = a.gateway().delete_all(folder).await?;
    Ok(Json(deleted_many(folder.collection(), &report)))
}

fn deleted_one(name: &str, report: &DeleteReport) -> Value {
    json!({
        "message": format!("{name} deleted"),
        "failures": report.failures,
    })
}

fn deleted_many(what: &str, report: &DeleteReport) -> Value {
    json!({
        "message": format!("Deleted {} {what}", report.deleted.len()),
        "deleted": report.deleted.len(),
        "failures": report.failures,
    })
}

// ── Sync check ───────────────────────────────────────────────────────────────

fn sync_body(report: &SyncReport) -> Value {
    let mut local = Map::new();
    let mut remote = Map::new();
    let mut discrepancies = Map::new();
    for f in &report.folders {
        let key = f.folder.collection().to_string();
        local.insert(key.clone(), json!(f.local));
        remote.insert(key.clone(), json!(f.remote));
        let diff: Vec<&String> = f.only_local.iter().chain(&f.only_remote).collect();
        discrepancies.insert(key, json!(diff));
    }
    json!({
        "remote_configured": report.remote_configured,
        "local_files": local,
        "remote_files": remote,
        "discrepancies": discrepancies,
    })
}

async fn sync_check(State(a): State<AppState>) -> ApiResult<Json<Value>> {
    let report = a.gateway().sync_check().await?;
    Ok(Json(sync_body(&report)))
}
