use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

/// Entries separated by commas or newlines, trimmed, blanks dropped.
pub fn parse_entries(text: &str) -> Vec<String> {
    text.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn render_entries(entries: &[String]) -> String {
    entries.join(",")
}

// ---------------------------------------------------------------------------
// ContentCache
// ---------------------------------------------------------------------------

/// Shared pool of content entries, backed by a comma-separated file.
///
/// Readers take the currently published snapshot without locking. A replace
/// writes the file and publishes the new snapshot under the swap lock, so
/// two refreshes cannot interleave their file writes.
#[derive(Debug)]
pub struct ContentCache {
    path: PathBuf,
    published: watch::Sender<Arc<Vec<String>>>,
    swap: Mutex<()>,
}

impl ContentCache {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        let (published, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            path: path.into(),
            published,
            swap: Mutex::new(()),
        }
    }

    /// Load the cache file at `path`. A missing file is an empty cache.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let cache = Self::empty(path);
        let entries = match tokio::fs::read_to_string(&cache.path).await {
            Ok(text) => parse_entries(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("read content cache {:?}", cache.path))
            }
        };
        info!(entries = entries.len(), path = ?cache.path, "content cache loaded");
        cache.published.send_replace(Arc::new(entries));
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.published.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<String>>> {
        self.published.subscribe()
    }

    pub fn random(&self) -> Option<String> {
        let snap = self.snapshot();
        snap.choose(&mut rand::thread_rng()).cloned()
    }

    /// Persist and publish `entries`. An empty list keeps the current
    /// contents and returns [`RefreshOutcome::KeptPrevious`].
    pub async fn replace(&self, entries: Vec<String>) -> Result<RefreshOutcome> {
        if entries.is_empty() {
            return Ok(RefreshOutcome::KeptPrevious);
        }
        let _swap = self.swap.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create cache dir {parent:?}"))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, render_entries(&entries))
            .await
            .with_context(|| format!("write {tmp:?}"))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename {tmp:?} -> {:?}", self.path))?;

        let n = entries.len();
        self.published.send_replace(Arc::new(entries));
        Ok(RefreshOutcome::Replaced(n))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Replaced(usize),
    /// Source returned nothing; previous entries still published.
    KeptPrevious,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where cache contents come from.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<String>>;
}

/// Fetches a comma- or newline-separated list over HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpListSource {
    client: reqwest::Client,
    url: String,
}

impl HttpListSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl ContentSource for HttpListSource {
    fn source_name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self) -> Result<Vec<String>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?
            .error_for_status()
            .with_context(|| format!("GET {}", self.url))?
            .text()
            .await
            .context("read content body")?;
        Ok(parse_entries(&body))
    }
}

// ---------------------------------------------------------------------------
// CacheRefresher
// ---------------------------------------------------------------------------

pub struct CacheRefresher {
    cache: Arc<ContentCache>,
    source: Arc<dyn ContentSource>,
}

impl CacheRefresher {
    pub fn new(cache: Arc<ContentCache>, source: Arc<dyn ContentSource>) -> Self {
        Self { cache, source }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Fetch and swap in one go. The swap lock is only taken once the fetch
    /// has returned.
    pub async fn refresh_once(&self) -> Result<RefreshOutcome> {
        let entries = self
            .source
            .fetch()
            .await
            .with_context(|| format!("content source {} failed", self.source.source_name()))?;
        let outcome = self.cache.replace(entries).await?;
        match outcome {
            RefreshOutcome::Replaced(n) => info!(entries = n, "content cache refreshed"),
            RefreshOutcome::KeptPrevious => {
                warn!(source = self.source.source_name(), "content source returned nothing; keeping previous cache")
            }
        }
        Ok(outcome)
    }
}
