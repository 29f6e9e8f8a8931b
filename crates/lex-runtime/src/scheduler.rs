use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use lex_subscribers::{RegistryError, SubscriberRegistry, TimeOfDay};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ContentCache;

/// Outbound-message capability owned by the front end.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, subscriber_id: &str, message: &str) -> anyhow::Result<()>;
}

/// Outcome of one scheduler tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// `HH:MM` the tick matched against.
    pub at: TimeOfDay,
    /// A tick for this minute already dispatched; nothing was sent.
    pub skipped: bool,
    pub due: usize,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

impl TickReport {
    fn skipped(at: TimeOfDay) -> Self {
        Self {
            at,
            skipped: true,
            due: 0,
            delivered: Vec::new(),
            failed: Vec::new(),
        }
    }
}

const FALLBACK_MESSAGE: &str = "No archive news today. Check back tomorrow!";

/// The daily message: one random cache entry, or a fixed text when the
/// cache is empty.
pub fn compose_message(cache: &ContentCache) -> String {
    match cache.random() {
        Some(entry) => format!("Your daily exoplanet news: {entry}"),
        None => FALLBACK_MESSAGE.to_string(),
    }
}

/// Sends one message per subscriber whose stored time equals the tick's
/// `HH:MM`. Never writes to the registry.
pub struct NotificationScheduler {
    registry: Arc<SubscriberRegistry>,
    notifier: Arc<dyn Notifier>,
    cache: Arc<ContentCache>,
    /// Last (date, minute) dispatched by this process.
    last: Mutex<Option<(NaiveDate, TimeOfDay)>>,
}

impl NotificationScheduler {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        notifier: Arc<dyn Notifier>,
        cache: Arc<ContentCache>,
    ) -> Self {
        Self {
            registry,
            notifier,
            cache,
            last: Mutex::new(None),
        }
    }

    pub async fn dispatch_tick(&self, now: DateTime<Utc>) -> Result<TickReport, RegistryError> {
        let at = TimeOfDay::of(&now);
        let key = (now.date_naive(), at);
        if *self.last.lock() == Some(key) {
            return Ok(TickReport::skipped(at));
        }

        // Snapshot first; a failed read leaves the minute open for the next
        // tick to retry.
        let subscribers = self.registry.list().await?;
        *self.last.lock() = Some(key);

        let due: Vec<_> = subscribers.into_iter().filter(|s| s.is_due(at)).collect();
        let mut report = TickReport {
            at,
            skipped: false,
            due: due.len(),
            delivered: Vec::new(),
            failed: Vec::new(),
        };
        if due.is_empty() {
            return Ok(report);
        }

        let message = compose_message(&self.cache);
        for sub in due {
            match self.notifier.deliver(&sub.id, &message).await {
                Ok(()) => {
                    debug!(subscriber_id = %sub.id, %at, "notification delivered");
                    report.delivered.push(sub.id);
                }
                Err(e) => {
                    warn!(subscriber_id = %sub.id, %at, error = %e, "notification delivery failed");
                    report.failed.push(sub.id);
                }
            }
        }
        info!(
            %at,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "notification tick"
        );
        Ok(report)
    }
}
