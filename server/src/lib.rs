use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use search_core::ingest::{Pipeline, RunReport};
use search_core::limiter::{ConcurrencyLimiter, RateLimiter};
use search_core::ports::Normalizer;
use search_core::search::Searcher;
use search_core::{DocId, Error, RunStatus, Stats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub phrase: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_limit() -> i64 { 10 }

#[derive(Deserialize)]
pub struct WordsParams {
    #[serde(default)]
    pub phrase: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub phrase: String,
    pub took_s: f64,
    pub total: usize,
    pub matched: usize,
    pub comics: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub id: DocId,
    pub url: String,
    pub title: String,
}

#[derive(Serialize)]
pub struct WordsResponse {
    pub words: Vec<String>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub replies: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: RunStatus,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub searcher: Arc<Searcher>,
    pub normalizer: Arc<dyn Normalizer>,
    pub admin_token: Option<String>,
}

/// Admission control for the search routes.
#[derive(Clone)]
pub struct Limits {
    /// Applied to `/api/search`; excess requests are rejected.
    pub concurrency: Arc<ConcurrencyLimiter>,
    /// Applied to `/api/isearch`; excess requests are delayed.
    pub rate: Arc<RateLimiter>,
}

/// Core errors as HTTP responses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self { Self(err) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            Error::AlreadyRunning => StatusCode::ACCEPTED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            err => {
                tracing::error!(error = %format!("{err:#}"), "request failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
            }
        };
        tracing::debug!(%status, error = %self.0, "request rejected");
        (status, self.0.to_string()).into_response()
    }
}

pub fn build_app(state: AppState, limits: Limits) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let shed = Router::new()
        .route("/api/search", get(search_handler))
        .route_layer(middleware::from_fn_with_state(limits.concurrency, shed_load));
    let paced = Router::new()
        .route("/api/isearch", get(isearch_handler))
        .route_layer(middleware::from_fn_with_state(limits.rate, pace));

    Router::new()
        .route("/ping", get(ping_handler))
        .route("/api/words", get(words_handler))
        .route("/api/db/update", post(update_handler))
        .route("/api/db/status", get(status_handler))
        .route("/api/db/stats", get(stats_handler))
        .route("/api/db", delete(drop_handler))
        .merge(shed)
        .merge(paced)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn shed_load(State(limiter): State<Arc<ConcurrencyLimiter>>, req: Request, next: Next) -> Response {
    let Some(_permit) = limiter.try_permit() else {
        tracing::debug!(capacity = limiter.capacity(), "concurrency limit exceeded");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    next.run(req).await
}

async fn pace(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    limiter.wait().await;
    next.run(req).await
}

/// Reports each dependency as `ok` or `unavailable`; always answers 200.
async fn ping_handler(State(state): State<AppState>) -> Json<PingResponse> {
    let (store, source) = tokio::join!(state.pipeline.check_store(), state.pipeline.check_source());
    let replies = [("store", store), ("source", source)]
        .into_iter()
        .map(|(name, checked)| match checked {
            Ok(()) => (name, "ok"),
            Err(err) => {
                tracing::warn!(dependency = name, error = %err, "dependency unavailable");
                (name, "unavailable")
            }
        })
        .collect();
    Json(PingResponse { replies })
}

fn limit_of(params: &SearchParams) -> usize {
    // Non-positive limits become 0, which the searcher rejects.
    usize::try_from(params.limit).unwrap_or(0)
}

fn respond(phrase: String, start: std::time::Instant, result: search_core::search::SearchResult) -> Json<SearchResponse> {
    let comics = result
        .comics
        .into_iter()
        .map(|doc| SearchHit { id: doc.id, url: doc.url, title: doc.title })
        .collect();
    Json(SearchResponse {
        phrase,
        took_s: start.elapsed().as_secs_f64(),
        total: result.total,
        matched: result.matched,
        comics,
    })
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let result = state.searcher.search(&params.phrase, limit_of(&params)).await?;
    Ok(respond(params.phrase, start, result))
}

pub async fn isearch_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let result = state.searcher.isearch(&params.phrase, limit_of(&params)).await?;
    Ok(respond(params.phrase, start, result))
}

pub async fn words_handler(
    State(state): State<AppState>,
    Query(params): Query<WordsParams>,
) -> Result<Json<WordsResponse>, ApiError> {
    if params.phrase.is_empty() {
        return Err(Error::BadArguments("phrase must not be empty").into());
    }
    let words = state.normalizer.normalize(&params.phrase).await?;
    Ok(Json(WordsResponse { total: words.len(), words }))
}

/// Runs one ingestion pass to completion. The pass lives in its own task so a
/// disconnecting client does not abort it.
async fn update_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RunReport>, Response> {
    authorize(&state, &headers).map_err(IntoResponse::into_response)?;
    let pipeline = state.pipeline.clone();
    let report = tokio::spawn(async move { pipeline.run().await })
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "update task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?
        .map_err(|err| ApiError(err).into_response())?;
    Ok(Json(report))
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse { status: state.pipeline.status() })
}

async fn stats_handler(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    Ok(Json(state.pipeline.stats().await?))
}

async fn drop_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, Response> {
    authorize(&state, &headers).map_err(IntoResponse::into_response)?;
    state.pipeline.drop_all().await.map_err(|err| ApiError(err).into_response())?;
    Ok(StatusCode::OK)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
