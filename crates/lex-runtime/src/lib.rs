//! lex-runtime
//!
//! The I/O half of the mirror: everything that runs on a schedule or on
//! behalf of a caller.
//!
//! Architectural decisions:
//! - [`ReconciliationEngine`] executes the plans from lex-reconcile under a
//!   gate [`CycleGuard`](lex_gate::CycleGuard); all remote reads finish
//!   before the first local write
//! - [`NotificationScheduler`] only reads the subscriber registry; it never
//!   touches the mirror and so never waits on the gate
//! - [`ContentCache`] publishes immutable snapshots; readers clone an `Arc`
//! - [`SessionStore`] is never locked across an `.await`
//! - No code path holds two of the shared locks at once (gate, registry
//!   file, cache swap, session map)
//! - Background failures are logged and the next tick starts clean

mod bootstrap;
mod cache;
mod engine;
mod error;
mod scheduler;
mod service;
mod session;
mod spawn;

pub use bootstrap::{open_mirror, tap_config};
pub use cache::{
    parse_entries, render_entries, CacheRefresher, ContentCache, ContentSource, HttpListSource,
    RefreshOutcome,
};
pub use engine::ReconciliationEngine;
pub use error::{ServiceError, SyncError};
pub use scheduler::{compose_message, NotificationScheduler, Notifier, TickReport};
pub use service::{
    LexService, SearchPage, DISTANCE_PICKS, FIRST_DISCOVERY_YEAR, REPORT_MIN_WORDS,
};
pub use session::{normalize_keyword, CallerSession, Direction, SessionStore, Window};
pub use spawn::{spawn_cache_refresh_loop, spawn_notification_loop, spawn_reconcile_loop};
