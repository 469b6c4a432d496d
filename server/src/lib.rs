use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use search_core::config::MAX_K;
use search_core::{load_catalog, Algorithm, CorpusStats, Document, SearchConfig, SearchEngine, SearchError, SearchHit};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const ADMIN_HEADER: &str = "x-admin-token";

#[derive(Deserialize)]
pub struct SearchParams {
    /// Missing `q` searches for nothing and returns an empty page.
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub algorithm: Algorithm,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit<String>>,
}

#[derive(Serialize)]
struct DocResponse<'a> {
    pid: &'a str,
    #[serde(flatten)]
    doc: &'a Document,
}

#[derive(Serialize)]
pub struct RebuildResponse {
    pub stats: CorpusStats,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine<String>>,
    pub catalog_path: PathBuf,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Load the catalog and build the index before serving.
    pub fn load(catalog_path: PathBuf, config: SearchConfig, admin_token: Option<String>) -> Result<Self> {
        let engine = SearchEngine::from_config(config)?;
        let loaded = load_catalog(&catalog_path)?;
        engine.build_index(Arc::new(loaded.corpus));
        Ok(Self { engine: Arc::new(engine), catalog_path, admin_token })
    }
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self { Self { status, message: message.into() } }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        let status = match err {
            SearchError::IndexNotBuilt => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::UnknownAlgorithm(_) | SearchError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

pub fn build_app(catalog_path: PathBuf, config: SearchConfig) -> Result<Router> {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let state = AppState::load(catalog_path, config, admin_token)?;
    Ok(router(state))
}

/// Storefront origins from `CORS_ALLOW_ORIGIN` (comma-separated); any origin when unset.
fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> =
        allowed.into_iter().flat_map(|v| v.split(',')).filter_map(|o| o.trim().parse().ok()).collect();
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref());

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:pid", get(doc_handler))
        .route("/index/rebuild", post(index_rebuild))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let algorithm = match params.algorithm.as_deref().map(str::trim) {
        None | Some("") => Algorithm::default(),
        Some(name) => name.parse()?,
    };
    let k = params.k.unwrap_or(state.engine.config().default_top_k).clamp(1, MAX_K);
    let page = state.engine.search_hits(&params.q, algorithm, k)?;

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        algorithm,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: page.total_hits,
        results: page.hits,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(pid): Path<String>) -> Response {
    let snapshot = match state.engine.snapshot() {
        Some(s) => s,
        None => return ApiError::from(SearchError::IndexNotBuilt).into_response(),
    };
    match snapshot.document(&pid) {
        Some(doc) => Json(DocResponse { pid: &pid, doc }).into_response(),
        None => ApiError::new(StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// Reload the catalog from disk and swap in a freshly built index.
async fn index_rebuild(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RebuildResponse>, ApiError> {
    require_admin(state.admin_token.as_deref(), &headers)?;
    let engine = Arc::clone(&state.engine);
    let path = state.catalog_path.clone();
    let rebuilt = tokio::task::spawn_blocking(move || -> Result<RebuildResponse> {
        let loaded = load_catalog(&path)?;
        let skipped = loaded.skipped.len();
        let stats = engine.build_index(Arc::new(loaded.corpus));
        Ok(RebuildResponse { stats, skipped })
    })
    .await
    .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;
    tracing::info!(num_docs = rebuilt.stats.num_docs, skipped = rebuilt.skipped, "index rebuilt");
    Ok(Json(rebuilt))
}

/// Rebuilds are disabled outright when the server runs without an admin token.
fn require_admin(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "index rebuild is disabled"));
    };
    match headers.get(ADMIN_HEADER).map(HeaderValue::as_bytes) {
        Some(given) if given == expected.as_bytes() => Ok(()),
        Some(_) => Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid admin token")),
        None => Err(ApiError::new(StatusCode::UNAUTHORIZED, "missing admin token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn headers(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(ADMIN_HEADER, HeaderValue::from_str(token).unwrap());
        h
    }

    #[test]
    fn admin_token_checks() {
        assert!(require_admin(Some("secret"), &headers("secret")).is_ok());
        assert_eq!(require_admin(Some("secret"), &headers("guess")).unwrap_err().status, StatusCode::UNAUTHORIZED);
        assert_eq!(require_admin(Some("secret"), &HeaderMap::new()).unwrap_err().status, StatusCode::UNAUTHORIZED);
        assert_eq!(require_admin(None, &headers("secret")).unwrap_err().status, StatusCode::FORBIDDEN);
    }

    async fn allowed_origin(allowed: Option<&str>, origin: &str) -> Option<String> {
        let app: Router = Router::new().route("/", get(|| async { "ok" })).layer(cors_layer(allowed));
        let req = Request::get("/").header(header::ORIGIN, origin).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn cors_origins() {
        assert_eq!(allowed_origin(None, "https://anywhere.example").await.as_deref(), Some("*"));
        let list = Some("https://shop.example, https://admin.example");
        assert_eq!(allowed_origin(list, "https://admin.example").await.as_deref(), Some("https://admin.example"));
        assert_eq!(allowed_origin(list, "https://evil.example").await, None);
    }
}
