//! SKG-IF HTTP API.
//!
//! Serves study metadata as SKG-IF Products and thesaurus concepts as
//! SKG-IF Topics, both as JSON-LD.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service information |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/{prefix}/products` | Filtered, paginated products |
//! | `GET`  | `/{prefix}/products/{id}` | One product by study number, record id or URL |
//! | `GET`  | `/{prefix}/topics` | Label search over topics, or all topics |
//! | `GET`  | `/{prefix}/topics/{id}` | One topic by concept URI (raw or percent-encoded) |
//!
//! Listings accept `filter=key:value,...`, `page` (1-based) and `page_size`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Invalid filter keys: foo" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `not_implemented` (422), `mapping_error` (500), `internal` (500),
//! `unavailable` (503).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use skgif_core::envelope::{Envelope, PageMeta};
use skgif_core::error::{EnvelopeError, FilterError, QueryError};
use skgif_core::query::PageRequest;

use crate::config::{ApiConfig, Config};
use crate::services::{build_services, Services};

pub const JSON_LD: &str = "application/ld+json";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub api: Arc<ApiConfig>,
}

/// Starts the SKG-IF server on `[server].bind`.
///
/// Fails before binding if the thesaurus cannot be loaded.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = build_services(config).await?;
    let state = AppState {
        services: Arc::new(services),
        api: Arc::new(config.api.clone()),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        products = %config.api.endpoint("products"),
        "SKG-IF server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// All routes, mounted under `[api].prefix`.
pub fn build_router(state: AppState) -> Router {
    let prefix = state.api.prefix.trim_matches('/');
    let base = if prefix.is_empty() {
        String::new()
    } else {
        format!("/{}", prefix)
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route(&format!("{}/products", base), get(handle_products))
        .route(&format!("{}/products/{{*id}}", base), get(handle_product))
        .route(&format!("{}/topics", base), get(handle_topics))
        .route(&format!("{}/topics/{{*id}}", base), get(handle_topic))
        .layer(cors)
        .with_state(state)
}

// ============ Responses ============

/// A JSON-LD document served as `application/ld+json`.
struct JsonLd(Value);

impl IntoResponse for JsonLd {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_LD))],
            self.0.to_string(),
        )
            .into_response()
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::NotImplemented(_) => app_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "not_implemented",
                err.to_string(),
            ),
            other => bad_request(other.to_string()),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Filter(e) => e.into(),
            QueryError::Unavailable(e) => {
                tracing::error!(error = %format!("{:#}", e), "Study store unavailable");
                app_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    "Study store is temporarily unavailable",
                )
            }
            e @ QueryError::Mapping { .. } => {
                tracing::error!(error = %e, "Product mapping failed");
                app_error(StatusCode::INTERNAL_SERVER_ERROR, "mapping_error", e.to_string())
            }
        }
    }
}

impl From<EnvelopeError> for AppError {
    fn from(err: EnvelopeError) -> Self {
        tracing::error!(error = %err, "JSON-LD wrapping failed");
        app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
    }
}

// ============ Query parameters ============

/// `filter`, `page` and `page_size`, as raw strings so that bad numbers
/// produce our error body rather than the extractor's.
#[derive(Debug, Default, Deserialize)]
struct ListParams {
    filter: Option<String>,
    page: Option<String>,
    page_size: Option<String>,
}

impl ListParams {
    fn filter(&self) -> Option<&str> {
        self.filter.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    fn page_request(&self, state: &AppState) -> Result<PageRequest, AppError> {
        let page = parse_number("page", self.page.as_deref())?;
        let page_size = parse_number("page_size", self.page_size.as_deref())?;
        Ok(state.services.pagination.request(page, page_size)?)
    }
}

fn parse_number(name: &str, raw: Option<&str>) -> Result<Option<u64>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| bad_request(format!("{} must be a positive integer, got '{}'", name, s))),
    }
}

// ============ GET / ============

async fn handle_index(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "name": "SKG-IF API",
        "version": env!("CARGO_PKG_VERSION"),
        "context": state.services.jsonld.to_value(),
        "endpoints": {
            "products": state.api.endpoint("products"),
            "topics": state.api.endpoint("topics"),
        },
        "topics": state.services.engine.topic_index().len(),
    }))
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

// ============ GET /{prefix}/products ============

async fn handle_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<JsonLd, AppError> {
    let request = params.page_request(&state)?;
    let filter = params.filter();

    let page = state.services.engine.query_products(filter, request).await?;
    let meta = PageMeta::build(
        &state.api.endpoint("products"),
        filter,
        request,
        page.total,
        state.services.pagination.default_page_size,
    );

    let body = state.services.jsonld.wrap(Envelope::Page {
        items: &page.items,
        meta: &meta,
    })?;
    Ok(JsonLd(body))
}

// ============ GET /{prefix}/products/{id} ============

async fn handle_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<JsonLd, AppError> {
    let product = state
        .services
        .engine
        .find_product(&id)
        .await?
        .ok_or_else(|| not_found(format!("Product not found: {}", id)))?;

    Ok(JsonLd(state.services.jsonld.wrap(Envelope::Entity(&product))?))
}

// ============ GET /{prefix}/topics ============

async fn handle_topics(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<JsonLd, AppError> {
    let request = params.page_request(&state)?;
    let filter = params.filter();

    let page = state.services.engine.page_topics(filter, request)?;
    let meta = PageMeta::build(
        &state.api.endpoint("topics"),
        filter,
        request,
        page.total,
        state.services.pagination.default_page_size,
    );

    let body = state.services.jsonld.wrap(Envelope::Page {
        items: &page.items,
        meta: &meta,
    })?;
    Ok(JsonLd(body))
}

// ============ GET /{prefix}/topics/{id} ============

async fn handle_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<JsonLd, AppError> {
    let topic = state
        .services
        .engine
        .find_topic(&id)
        .ok_or_else(|| not_found(format!("Topic not found: {}", id)))?;

    Ok(JsonLd(state.services.jsonld.wrap(Envelope::Entity(&topic))?))
}
