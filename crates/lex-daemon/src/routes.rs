//! Axum router and all HTTP handlers for lex-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are thin: every decision lives in
//! [`lex_runtime::LexService`], this module only maps its answers to HTTP.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use lex_mirror::Lookup;
use lex_runtime::{Direction, SearchPage, ServiceError};
use lex_schemas::{Field, Table};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    api_types::{
        AdvanceResponse, CountQuery, CountResponse, DiscoveredResponse, DistanceResponse,
        EntityCountResponse, ErrorResponse, HealthResponse, NewsResponse, RandomResponse,
        ReportRequest, ReportResponse, SearchRequest, StatusResponse, SubscribeRequest,
        SubscribeResponse, UnsubscribeResponse,
    },
    state::{uptime_secs, AppState, BusMsg},
};

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/callers/:caller/subscribe", post(subscribe))
        .route("/v1/callers/:caller/unsubscribe", post(unsubscribe))
        .route("/v1/callers/:caller/search", post(search_open))
        .route("/v1/callers/:caller/search/next", post(search_next))
        .route("/v1/callers/:caller/search/prev", post(search_prev))
        .route("/v1/callers/:caller/report", post(report))
        .route("/v1/mirror/count", get(mirror_count))
        .route("/v1/mirror/planets/count", get(planets_count))
        .route("/v1/mirror/discovered/:year", get(discovered))
        .route("/v1/mirror/lookup/:keyword", get(lookup))
        .route("/v1/mirror/random", get(random_entity))
        .route("/v1/mirror/distance/:reach", get(distance))
        .route("/v1/fields", get(fields))
        .route("/v1/news/random", get(news_random))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// HTTP face of [`ServiceError`]. SLEEPING is 503 so a client can retry.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            ServiceError::Synchronizing => (StatusCode::SERVICE_UNAVAILABLE, "SYNCHRONIZING"),
            ServiceError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INPUT"),
            ServiceError::StorageUnavailable => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_UNAVAILABLE")
            }
            ServiceError::RemoteUnavailable => {
                (StatusCode::INTERNAL_SERVER_ERROR, "REMOTE_UNAVAILABLE")
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health  /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

/// Never refused: the watermark is only read when a permit is available.
pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> Json<StatusResponse> {
    let svc = &st.service;
    let watermark = svc
        .read(|| svc.mirror().watermark())
        .await
        .ok()
        .flatten();

    Json(StatusResponse {
        daemon_uptime_secs: uptime_secs(),
        availability: svc.gate().state(),
        serving: svc.is_serving(),
        watermark,
        last_cycle: st.last_cycle.read().clone(),
    })
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

pub(crate) async fn subscribe(
    State(st): State<Arc<AppState>>,
    Path(caller): Path<String>,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<SubscribeResponse> {
    let outcome = st.service.subscribe(&caller, &req.time).await?;
    Ok(Json(SubscribeResponse {
        caller,
        time: req.time,
        created: outcome == lex_subscribers::SubscribeOutcome::Created,
    }))
}

pub(crate) async fn unsubscribe(
    State(st): State<Arc<AppState>>,
    Path(caller): Path<String>,
) -> ApiResult<UnsubscribeResponse> {
    let outcome = st.service.unsubscribe(&caller).await?;
    Ok(Json(UnsubscribeResponse {
        caller,
        removed: outcome == lex_subscribers::UnsubscribeOutcome::Removed,
    }))
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// The body is optional; no body means "no keyword".
pub(crate) async fn search_open(
    State(st): State<Arc<AppState>>,
    Path(caller): Path<String>,
    body: Option<Json<SearchRequest>>,
) -> ApiResult<SearchPage> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let page = st.service.open_search(&caller, req.keyword.as_deref()).await?;
    Ok(Json(page))
}

pub(crate) async fn search_next(
    State(st): State<Arc<AppState>>,
    Path(caller): Path<String>,
) -> ApiResult<AdvanceResponse<SearchPage>> {
    advance(&st, &caller, Direction::Next).await
}

pub(crate) async fn search_prev(
    State(st): State<Arc<AppState>>,
    Path(caller): Path<String>,
) -> ApiResult<AdvanceResponse<SearchPage>> {
    advance(&st, &caller, Direction::Prev).await
}

async fn advance(
    st: &AppState,
    caller: &str,
    dir: Direction,
) -> ApiResult<AdvanceResponse<SearchPage>> {
    let page = st.service.advance(caller, dir).await?;
    Ok(Json(AdvanceResponse {
        moved: page.is_some(),
        page,
    }))
}

// ---------------------------------------------------------------------------
// POST /v1/callers/:caller/report
// ---------------------------------------------------------------------------

pub(crate) async fn report(
    State(st): State<Arc<AppState>>,
    Path(caller): Path<String>,
    Json(req): Json<ReportRequest>,
) -> ApiResult<ReportResponse> {
    st.service.report(&caller, &req.message)?;
    Ok(Json(ReportResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Mirror reads
// ---------------------------------------------------------------------------

pub(crate) async fn mirror_count(
    State(st): State<Arc<AppState>>,
    Query(q): Query<CountQuery>,
) -> ApiResult<CountResponse> {
    let table = q
        .table
        .as_deref()
        .and_then(Table::parse)
        .ok_or_else(|| {
            ServiceError::InvalidInput("table must be observations or composite".into())
        })?;
    let count = st.service.count(table).await?;
    Ok(Json(CountResponse {
        table: table.to_string(),
        count,
    }))
}

pub(crate) async fn planets_count(State(st): State<Arc<AppState>>) -> ApiResult<EntityCountResponse> {
    let count = st.service.count_entities().await?;
    Ok(Json(EntityCountResponse { count }))
}

pub(crate) async fn discovered(
    State(st): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> ApiResult<DiscoveredResponse> {
    let count = st.service.discovered_in(year).await?;
    Ok(Json(DiscoveredResponse { year, count }))
}

pub(crate) async fn lookup(
    State(st): State<Arc<AppState>>,
    Path(keyword): Path<String>,
) -> ApiResult<Lookup> {
    Ok(Json(st.service.lookup(&keyword).await?))
}

pub(crate) async fn random_entity(State(st): State<Arc<AppState>>) -> ApiResult<RandomResponse> {
    let entity = st.service.random_entity().await?;
    Ok(Json(RandomResponse { entity }))
}

/// `near` lists the closest systems, `far` the most distant ones.
pub(crate) async fn distance(
    State(st): State<Arc<AppState>>,
    Path(reach): Path<String>,
) -> ApiResult<DistanceResponse> {
    let entities = match reach.as_str() {
        "near" => st.service.nearest().await?,
        "far" => st.service.farthest().await?,
        _ => {
            return Err(ServiceError::InvalidInput("reach must be near or far".into()).into());
        }
    };
    Ok(Json(DistanceResponse { reach, entities }))
}

// ---------------------------------------------------------------------------
// Ungated reads
// ---------------------------------------------------------------------------

pub(crate) async fn fields(State(st): State<Arc<AppState>>) -> Json<Vec<Field>> {
    Json(st.service.fields().to_vec())
}

pub(crate) async fn news_random(State(st): State<Arc<AppState>>) -> Json<NewsResponse> {
    Json(NewsResponse {
        entry: st.service.random_news(),
    })
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
