//! Tenant-scoped JSON HTTP API over the upload, ingestion, and retrieval
//! pipeline.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `POST`   | `/tenants/{tenant}/documents` | Upload a document (base64 body) |
//! | `GET`    | `/tenants/{tenant}/documents` | List documents, optional `?status=` filter |
//! | `DELETE` | `/tenants/{tenant}/documents/{id}` | Delete a document and its file |
//! | `DELETE` | `/tenants/{tenant}/documents` | Delete all documents and the index |
//! | `POST`   | `/tenants/{tenant}/ingest` | Rebuild the tenant's index |
//! | `GET`    | `/tenants/{tenant}/ingest/status` | Per-status document counts |
//! | `POST`   | `/tenants/{tenant}/retrieve` | Rank chunks against a query |
//! | `GET`    | `/tenants/{tenant}/quota` | Usage counters and tier limits |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "quota_exceeded", "message": "..." } }
//! ```
//!
//! Error codes: `validation_failed` (400), `bad_request` (400),
//! `quota_exceeded` (403), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::error::EngineError;
use crate::index::IndexManager;
use crate::models::{Document, DocumentStatus, IngestResult, ScoredChunk};
use crate::{ingest, quota, repo, retrieve, upload};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    indexes: Arc<IndexManager>,
}

/// Starts the HTTP server on the address configured in `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = crate::db::connect(config).await?;
    crate::migrate::apply_schema(&pool).await?;

    let state = AppState {
        indexes: Arc::new(IndexManager::new(config.storage.vector_root.clone())),
        config: Arc::new(config.clone()),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/tenants/{tenant}/documents", post(handle_upload))
        .route("/tenants/{tenant}/documents", get(handle_list))
        .route("/tenants/{tenant}/documents", delete(handle_purge))
        .route("/tenants/{tenant}/documents/{id}", delete(handle_delete))
        .route("/tenants/{tenant}/ingest", post(handle_ingest))
        .route("/tenants/{tenant}/ingest/status", get(handle_ingest_status))
        .route("/tenants/{tenant}/retrieve", post(handle_retrieve))
        .route("/tenants/{tenant}/quota", get(handle_quota))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("server listening on http://{}", bind_addr);
    println!("Server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        let (status, code) = match &e {
            EngineError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            EngineError::QuotaExceeded { .. } => (StatusCode::FORBIDDEN, "quota_exceeded"),
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: e.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /tenants/{tenant}/documents ============

#[derive(Deserialize)]
struct UploadRequest {
    filename: String,
    /// File content, standard base64.
    content_base64: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.content_base64)
        .map_err(|e| bad_request(format!("content_base64 is not valid base64: {}", e)))?;

    let doc = upload::upload_document(&state.pool, &state.config, &tenant, &req.filename, &bytes)
        .await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

// ============ GET /tenants/{tenant}/documents ============

#[derive(Deserialize)]
struct ListQuery {
    status: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<Document>,
}

async fn handle_list(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let status = match params.status.as_deref() {
        Some(raw) => Some(
            DocumentStatus::parse(raw)
                .ok_or_else(|| bad_request(format!("unknown status filter: {}", raw)))?,
        ),
        None => None,
    };

    let documents = repo::list(&state.pool, &tenant, status).await?;
    Ok(Json(ListResponse { documents }))
}

// ============ DELETE /tenants/{tenant}/documents/{id} ============

#[derive(Serialize)]
struct DeleteResponse {
    deleted: String,
}

async fn handle_delete(
    State(state): State<AppState>,
    Path((tenant, id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, AppError> {
    let doc = repo::get(&state.pool, &id)
        .await?
        .filter(|d| d.tenant_id == tenant)
        .ok_or_else(|| AppError::from(EngineError::NotFound(format!("document {}", id))))?;

    repo::delete(&state.pool, &state.config.storage.upload_root, &doc.id).await?;
    quota::release_document(&state.pool, &tenant, doc.size_bytes).await?;

    Ok(Json(DeleteResponse { deleted: doc.id }))
}

// ============ DELETE /tenants/{tenant}/documents ============

#[derive(Serialize)]
struct PurgeResponse {
    deleted: u64,
}

/// Removes every document, the stored files, and the tenant's index.
async fn handle_purge(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<Json<PurgeResponse>, AppError> {
    let deleted =
        ingest::purge_tenant(&state.pool, &state.config, &state.indexes, &tenant).await?;
    Ok(Json(PurgeResponse { deleted }))
}

// ============ POST /tenants/{tenant}/ingest ============

async fn handle_ingest(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<Json<IngestResult>, AppError> {
    let result = ingest::ingest_tenant(&state.pool, &state.config, &state.indexes, &tenant).await?;
    Ok(Json(result))
}

// ============ GET /tenants/{tenant}/ingest/status ============

async fn handle_ingest_status(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<Json<ingest::IngestStatus>, AppError> {
    let status = ingest::ingest_status(&state.pool, &state.indexes, &tenant).await?;
    Ok(Json(status))
}

// ============ POST /tenants/{tenant}/retrieve ============

#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct RetrieveResponse {
    results: Vec<ScoredChunk>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let results = retrieve::retrieve(
        &state.pool,
        &state.config,
        &state.indexes,
        &tenant,
        &req.query,
        req.top_k,
    )
    .await?;
    Ok(Json(RetrieveResponse { results }))
}

// ============ GET /tenants/{tenant}/quota ============

async fn handle_quota(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<Json<quota::QuotaUsage>, AppError> {
    let usage = quota::usage(&state.pool, &tenant).await?;
    Ok(Json(usage))
}
