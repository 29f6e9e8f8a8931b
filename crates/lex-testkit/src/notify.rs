use std::collections::BTreeSet;

use lex_runtime::{ContentSource, Notifier};
use parking_lot::Mutex;

/// Records every successful delivery. Subscribers in `failing` get an error.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<(String, String)>>,
    failing: Mutex<BTreeSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, subscriber_id: &str) {
        self.failing.lock().insert(subscriber_id.to_string());
    }

    /// `(subscriber_id, message)` in delivery order.
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.delivered.lock().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, subscriber_id: &str, message: &str) -> anyhow::Result<()> {
        if self.failing.lock().contains(subscriber_id) {
            anyhow::bail!("delivery to {subscriber_id} refused");
        }
        self.delivered
            .lock()
            .push((subscriber_id.to_string(), message.to_string()));
        Ok(())
    }
}

/// Content source returning a fixed list (possibly empty).
#[derive(Debug, Default)]
pub struct StaticContentSource {
    entries: Mutex<Vec<String>>,
}

impl StaticContentSource {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn set(&self, entries: Vec<String>) {
        *self.entries.lock() = entries;
    }
}

#[async_trait::async_trait]
impl ContentSource for StaticContentSource {
    fn source_name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.entries.lock().clone())
    }
}
