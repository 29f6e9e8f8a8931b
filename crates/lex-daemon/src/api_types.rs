//! Request and response types for all lex-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use chrono::NaiveDate;
use lex_gate::Availability;
use lex_mirror::{Distance, Sample};
use serde::{Deserialize, Serialize};

use crate::state::CycleEvent;

// ---------------------------------------------------------------------------
// /v1/health  /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub availability: Availability,
    pub serving: bool,
    /// `None` while SLEEPING or before the first successful cycle.
    pub watermark: Option<NaiveDate>,
    pub last_cycle: Option<CycleEvent>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "SYNCHRONIZING" | "INVALID_INPUT" | "STORAGE_UNAVAILABLE" | "REMOTE_UNAVAILABLE"
    pub code: String,
}

// ---------------------------------------------------------------------------
// Caller routes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub caller: String,
    pub time: String,
    /// true when the caller had no previous entry.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeResponse {
    pub caller: String,
    /// false when the caller was not subscribed.
    pub removed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub keyword: Option<String>,
}

/// A search page, or `page: None` when the window is already at the edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceResponse<P> {
    pub moved: bool,
    pub page: Option<P>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub ok: bool,
}

// ---------------------------------------------------------------------------
// Mirror reads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountQuery {
    pub table: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub table: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredResponse {
    pub year: i32,
    pub count: u64,
}

/// `entity: None` when the mirror holds no observations.
#[derive(Debug, Clone, Serialize)]
pub struct RandomResponse {
    pub entity: Option<Sample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistanceResponse {
    /// "near" | "far"
    pub reach: String,
    pub entities: Vec<Distance>,
}

// ---------------------------------------------------------------------------
// Ungated reads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsResponse {
    pub entry: Option<String>,
}
