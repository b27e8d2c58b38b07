//!
//! formworks HTTP server
//! ---------------------
//! This module defines the Axum-based HTTP API for the form engine.
//!
//! Responsibilities:
//! - Definition ingest (`POST /v1/forms`) with XML content-type gating.
//! - Form listings, JSON detail, raw XML, and schema JSON read paths.
//! - The OpenRosa formList endpoint with its exact wire format and headers.
//! - Lifecycle updates (PATCH name/state) and soft deletion.
//!
//! Authentication/authorization middleware is a collaborator outside this
//! crate; handlers assume an already-authorized caller.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::storage::SharedStore;

pub mod forms;

use forms::{FormPatch, NoSubmissions, SubmissionStats};

/// Server configuration, passed explicitly from `main`. No process-wide
/// mutable state.
#[derive(Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub db_root: String,
    /// Externally visible origin used for formList download links.
    pub base_url: String,
    /// When set, malformed XML reports its own boundary code instead of
    /// collapsing into the missing-formId code. See `AppError::problem_code`.
    pub strict_xml: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8383,
            db_root: "forms-db".to_string(),
            base_url: "http://localhost:8383".to_string(),
            strict_xml: false,
        }
    }
}

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub base_url: String,
    pub strict_xml: bool,
    pub stats: Arc<dyn SubmissionStats>,
}

/// Start the formworks HTTP server with the given configuration.
pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    let store = SharedStore::new(&config.db_root)?;
    {
        let guard = store.0.lock();
        info!(
            target: "startup",
            "formworks starting: db_root='{}', base_url='{}', {} definitions on disk",
            guard.root_path().display(),
            config.base_url,
            guard.all().len()
        );
    }

    let app = router(AppState {
        store,
        base_url: config.base_url.clone(),
        strict_xml: config.strict_xml,
        stats: Arc::new(NoSubmissions),
    });

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point using defaults.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(ServerConfig::default()).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "formworks ok" }))
        .route("/v1/forms", get(list_forms).post(create_form))
        .route("/v1/formList", get(form_list))
        .route("/v1/formlist", get(form_list))
        .route(
            "/v1/forms/{name}",
            get(get_form).patch(patch_form).delete(delete_form),
        )
        .with_state(state)
}

fn error_response(state: &AppState, err: AppError) -> axum::response::Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.body(state.strict_xml))).into_response()
}

fn extended_requested(headers: &HeaderMap) -> bool {
    headers
        .get("x-extended-metadata")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

async fn list_forms(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if extended_requested(&headers) {
        let out = forms::list_forms_extended(&state.store, state.stats.as_ref());
        return (StatusCode::OK, Json(json!(out))).into_response();
    }
    (StatusCode::OK, Json(json!(forms::list_forms(&state.store)))).into_response()
}

async fn create_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    match forms::create_form(&state.store, &body, content_type) {
        Ok(form) => (StatusCode::OK, Json(json!(form))).into_response(),
        Err(e) => error_response(&state, e),
    }
}

async fn form_list(State(state): State<AppState>) -> impl IntoResponse {
    let text = forms::openrosa_form_list(&state.store, &state.base_url);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/xml; charset=utf-8"),
    );
    headers.insert("X-OpenRosa-Version", HeaderValue::from_static("1.0"));
    (StatusCode::OK, headers, text)
}

/// axum matches whole path segments, so `.xml` and `.schema.json` reads are
/// dispatched on the suffix of the captured name.
async fn get_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Some(id) = name.strip_suffix(".schema.json") {
        let flatten = params.get("flatten").map(|v| v == "true").unwrap_or(false);
        return match forms::form_schema(&state.store, id, flatten) {
            Ok(value) => (StatusCode::OK, Json(value)).into_response(),
            Err(e) => error_response(&state, e),
        };
    }
    if let Some(id) = name.strip_suffix(".xml") {
        return match forms::form_xml(&state.store, id) {
            Ok(xml) => {
                let mut hs = HeaderMap::new();
                hs.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/xml; charset=utf-8"),
                );
                (StatusCode::OK, hs, xml).into_response()
            }
            Err(e) => error_response(&state, e),
        };
    }
    if extended_requested(&headers) {
        return match forms::get_form_extended(&state.store, &name, state.stats.as_ref()) {
            Ok(value) => (StatusCode::OK, Json(value)).into_response(),
            Err(e) => error_response(&state, e),
        };
    }
    match forms::get_form(&state.store, &name) {
        Ok(form) => (StatusCode::OK, Json(json!(form))).into_response(),
        Err(e) => error_response(&state, e),
    }
}

async fn patch_form(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(patch): Json<FormPatch>,
) -> impl IntoResponse {
    match forms::update_form(&state.store, &name, patch) {
        Ok(form) => (StatusCode::OK, Json(json!(form))).into_response(),
        Err(e) => error_response(&state, e),
    }
}

async fn delete_form(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    match forms::delete_form(&state.store, &name) {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => error_response(&state, e),
    }
}
