//! Shared runtime state for lex-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The mirror, registry,
//! sessions and cache all live behind [`LexService`]; this module adds the
//! event bus and the last reconciliation outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lex_reconcile::CycleReport;
use lex_runtime::{LexService, SyncError, TickReport};
use lex_subscribers::RegistryError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg (SSE event bus payload)
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    SyncCycle(CycleEvent),
    Notification { subscriber_id: String, message: String },
    LogLine { level: String, msg: String },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::SyncCycle(_) => "sync_cycle",
            BusMsg::Notification { .. } => "notification",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// CycleEvent
// ---------------------------------------------------------------------------

/// Outcome of the most recent reconciliation cycle, as reported on
/// GET /v1/status and carried inside SSE `sync_cycle` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleEvent {
    pub finished_at: DateTime<Utc>,
    pub ok: bool,
    pub report: Option<CycleReport>,
    /// Display text of the failure; `None` on success.
    pub error: Option<String>,
}

impl CycleEvent {
    pub fn from_result(result: &Result<CycleReport, SyncError>) -> Self {
        match result {
            Ok(report) => Self {
                finished_at: Utc::now(),
                ok: true,
                report: Some(report.clone()),
                error: None,
            },
            Err(e) => Self {
                finished_at: Utc::now(),
                ok: false,
                report: None,
                error: Some(e.to_string()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared across all Axum handlers behind an `Arc`.
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub service: Arc<LexService>,
    /// Written by the reconcile loop callback, which is synchronous.
    pub last_cycle: Arc<RwLock<Option<CycleEvent>>>,
}

impl AppState {
    pub fn new(service: Arc<LexService>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "lex-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            service,
            last_cycle: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a finished cycle and announce it on the bus.
    pub fn record_cycle(&self, result: &Result<CycleReport, SyncError>) {
        let event = CycleEvent::from_result(result);
        *self.last_cycle.write() = Some(event.clone());

        if let Some(err) = &event.error {
            let _ = self.bus.send(BusMsg::LogLine {
                level: "WARN".to_string(),
                msg: format!("reconciliation cycle aborted: {err}"),
            });
        }
        let _ = self.bus.send(BusMsg::SyncCycle(event));
    }

    /// Surface failed deliveries of a notification tick on the bus.
    pub fn record_tick(&self, result: &Result<TickReport, RegistryError>) {
        let msg = match result {
            Ok(r) if !r.failed.is_empty() => format!(
                "notification tick {}: {} delivered, {} failed",
                r.at,
                r.delivered.len(),
                r.failed.len()
            ),
            Ok(_) => return,
            Err(e) => format!("notification tick skipped: {e}"),
        };
        let _ = self.bus.send(BusMsg::LogLine {
            level: "WARN".to_string(),
            msg,
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
