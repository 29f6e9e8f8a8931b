use std::future::Future;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use lex_gate::{AvailabilityGate, Gated};
use lex_mirror::{Distance, Lookup, Mirror, Sample};
use lex_schemas::{Field, Table};
use lex_subscribers::{SubscribeOutcome, SubscriberRegistry, UnsubscribeOutcome};
use serde::Serialize;
use tracing::{error, info};

use crate::{normalize_keyword, ContentCache, Direction, ServiceError, SessionStore, Window};

/// Earliest year accepted by [`LexService::discovered_in`].
pub const FIRST_DISCOVERY_YEAR: i32 = 1900;

/// Minimum length of a problem report, in words.
pub const REPORT_MIN_WORDS: usize = 5;

/// How many entities [`LexService::nearest`] and [`LexService::farthest`] list.
pub const DISTANCE_PICKS: u32 = 3;

/// One rendered page of a keyword search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    pub window: Window,
    pub total: u64,
    pub keyword: Option<String>,
    pub names: Vec<String>,
    /// Reference of this page; stored as the caller's last rendered page.
    pub page_ref: u64,
}

/// Everything the request layer may call.
///
/// Operations that touch the mirror run under a serving permit via
/// [`LexService::read`]. Subscribe/unsubscribe only look at the flag: they
/// never read the mirror, and holding a permit while taking the registry
/// lock would nest two locks.
pub struct LexService {
    gate: Arc<AvailabilityGate>,
    mirror: Mirror,
    registry: Arc<SubscriberRegistry>,
    sessions: SessionStore,
    cache: Arc<ContentCache>,
    lookup_limit: u32,
}

impl LexService {
    pub fn new(
        gate: Arc<AvailabilityGate>,
        mirror: Mirror,
        registry: Arc<SubscriberRegistry>,
        cache: Arc<ContentCache>,
        page_size: u32,
        lookup_limit: u32,
    ) -> Self {
        Self {
            gate,
            mirror,
            registry,
            sessions: SessionStore::new(page_size),
            cache,
            lookup_limit,
        }
    }

    pub fn gate(&self) -> &Arc<AvailabilityGate> {
        &self.gate
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn is_serving(&self) -> bool {
        self.gate.is_awake()
    }

    /// Lazily create the caller's ephemeral state.
    pub fn register(&self, caller: &str) {
        self.sessions.register(caller);
    }

    /// Run a mirror read under a serving permit. SLEEPING becomes
    /// [`ServiceError::Synchronizing`]; a store failure is logged here and
    /// surfaces without detail.
    pub async fn read<F, Fut, T>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.gate.gated(op).await {
            Gated::Deferred => Err(ServiceError::Synchronizing),
            Gated::Served(Ok(v)) => Ok(v),
            Gated::Served(Err(e)) => {
                error!(error = %format!("{e:#}"), "mirror read failed");
                Err(ServiceError::StorageUnavailable)
            }
        }
    }

    fn require_awake(&self) -> Result<(), ServiceError> {
        if self.gate.is_awake() {
            Ok(())
        } else {
            Err(ServiceError::Synchronizing)
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub async fn subscribe(&self, caller: &str, time: &str) -> Result<SubscribeOutcome, ServiceError> {
        self.register(caller);
        self.require_awake()?;
        let outcome = self.registry.subscribe(caller, time).await?;
        info!(subscriber_id = caller, time, ?outcome, "subscribe");
        Ok(outcome)
    }

    pub async fn unsubscribe(&self, caller: &str) -> Result<UnsubscribeOutcome, ServiceError> {
        self.register(caller);
        self.require_awake()?;
        let outcome = self.registry.unsubscribe(caller).await?;
        info!(subscriber_id = caller, ?outcome, "unsubscribe");
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Paging
    // -----------------------------------------------------------------------

    /// Reset the caller's window to the first page of `keyword` matches.
    pub async fn open_search(
        &self,
        caller: &str,
        keyword: Option<&str>,
    ) -> Result<SearchPage, ServiceError> {
        self.register(caller);
        let keyword = normalize_keyword(keyword);
        self.read(|| async {
            let total = self.mirror.count_like(keyword.as_deref()).await?;
            let session = self.sessions.reset(caller, keyword.clone());
            let names = self
                .mirror
                .search_names(keyword.as_deref(), session.window.start, session.window.len())
                .await?;
            Ok::<_, anyhow::Error>(SearchPage {
                window: session.window,
                total,
                keyword: session.keyword,
                names,
                page_ref: self.sessions.mark_rendered(caller),
            })
        })
        .await
    }

    /// Move the caller's window. `Ok(None)` is the no-op at either edge.
    pub async fn advance(
        &self,
        caller: &str,
        dir: Direction,
    ) -> Result<Option<SearchPage>, ServiceError> {
        self.register(caller);
        self.read(|| async {
            let Some(session) = self.sessions.get(caller) else {
                return Ok(None);
            };
            let keyword = session.keyword;
            // Recount: the mirror may have changed since the window opened.
            let total = self.mirror.count_like(keyword.as_deref()).await?;
            let Some(window) = session.window.advance(dir, total) else {
                return Ok(None);
            };
            self.sessions.set_window(caller, window);
            let names = self
                .mirror
                .search_names(keyword.as_deref(), window.start, window.len())
                .await?;
            Ok::<_, anyhow::Error>(Some(SearchPage {
                window,
                total,
                keyword,
                names,
                page_ref: self.sessions.mark_rendered(caller),
            }))
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Mirror reads
    // -----------------------------------------------------------------------

    pub async fn count(&self, table: Table) -> Result<u64, ServiceError> {
        self.read(|| self.mirror.count(table)).await
    }

    pub async fn count_entities(&self) -> Result<u64, ServiceError> {
        self.read(|| self.mirror.count_distinct_names()).await
    }

    /// Entities discovered in `year`, which must lie in
    /// `[FIRST_DISCOVERY_YEAR, current year]`.
    pub async fn discovered_in(&self, year: i32) -> Result<u64, ServiceError> {
        let current = Utc::now().year();
        if !(FIRST_DISCOVERY_YEAR..=current).contains(&year) {
            return Err(ServiceError::InvalidInput(format!(
                "year must be between {FIRST_DISCOVERY_YEAR} and {current}"
            )));
        }
        self.read(|| self.mirror.discovered_in(year)).await
    }

    pub async fn lookup(&self, keyword: &str) -> Result<Lookup, ServiceError> {
        let Some(kw) = normalize_keyword(Some(keyword)) else {
            return Err(ServiceError::InvalidInput("keyword must not be empty".into()));
        };
        self.read(|| self.mirror.lookup(&kw, self.lookup_limit)).await
    }

    /// A random observation row; `None` when the mirror is empty.
    pub async fn random_entity(&self) -> Result<Option<Sample>, ServiceError> {
        self.read(|| self.mirror.random_entity()).await
    }

    pub async fn nearest(&self) -> Result<Vec<Distance>, ServiceError> {
        self.read(|| self.mirror.nearest(DISTANCE_PICKS)).await
    }

    pub async fn farthest(&self) -> Result<Vec<Distance>, ServiceError> {
        self.read(|| self.mirror.farthest(DISTANCE_PICKS)).await
    }

    // -----------------------------------------------------------------------
    // Ungated
    // -----------------------------------------------------------------------

    pub fn fields(&self) -> &[Field] {
        self.mirror.catalog().fields()
    }

    pub fn random_news(&self) -> Option<String> {
        self.cache.random()
    }

    /// Log a caller's problem report on its own target. Reports shorter than
    /// [`REPORT_MIN_WORDS`] words are refused.
    pub fn report(&self, caller: &str, message: &str) -> Result<(), ServiceError> {
        self.register(caller);
        let words: Vec<&str> = message.split_whitespace().collect();
        if words.len() < REPORT_MIN_WORDS {
            return Err(ServiceError::InvalidInput(format!(
                "report message needs at least {REPORT_MIN_WORDS} words"
            )));
        }
        let message = words.join(" ");
        info!(target: "lex::report", caller, message = %message, "problem report");
        Ok(())
    }
}
