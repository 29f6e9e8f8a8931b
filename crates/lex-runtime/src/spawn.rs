//! Periodic background loops.
//!
//! Each loop owns its ticker and nothing else. A failing tick is logged by
//! the component and handed to `on_*`; the loop itself never exits.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lex_reconcile::CycleReport;
use lex_subscribers::RegistryError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::{CacheRefresher, NotificationScheduler, ReconciliationEngine, SyncError, TickReport};

/// Run a reconciliation cycle every `interval`, the first one immediately.
pub fn spawn_reconcile_loop<F>(
    engine: Arc<ReconciliationEngine>,
    interval: Duration,
    on_cycle: F,
) -> JoinHandle<()>
where
    F: Fn(&Result<CycleReport, SyncError>) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let result = engine.run_cycle().await;
            on_cycle(&result);
        }
    })
}

/// Dispatch due notifications every `tick`.
pub fn spawn_notification_loop<F>(
    scheduler: Arc<NotificationScheduler>,
    tick: Duration,
    on_tick: F,
) -> JoinHandle<()>
where
    F: Fn(&Result<TickReport, RegistryError>) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let result = scheduler.dispatch_tick(Utc::now()).await;
            if let Err(e) = &result {
                warn!(error = %e, "notification tick skipped");
            }
            on_tick(&result);
        }
    })
}

/// Refresh the content cache every `interval`, the first one immediately.
pub fn spawn_cache_refresh_loop(refresher: Arc<CacheRefresher>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = refresher.refresh_once().await {
                warn!(error = %format!("{e:#}"), "content cache refresh failed; keeping previous entries");
            }
        }
    })
}
