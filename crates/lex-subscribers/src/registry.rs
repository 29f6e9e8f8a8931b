use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::format::{parse_file, render_file, Line, Subscriber};
use crate::{validate_subscriber_id, RegistryError, TimeOfDay};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created,
    /// The subscriber already had an entry; its time was overwritten in place.
    Updated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotSubscribed,
}

/// File-backed registry. All three operations are mutually exclusive.
#[derive(Debug)]
pub struct SubscriberRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SubscriberRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_err(&self, source: std::io::Error) -> RegistryError {
        RegistryError::StorageUnavailable {
            path: self.path.clone(),
            source,
        }
    }

    /// Missing file reads as an empty registry.
    async fn load(&self) -> Result<Vec<Line>, RegistryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(parse_file(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.storage_err(e)),
        }
    }

    async fn store(&self, lines: &[Line]) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.storage_err(e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, render_file(lines))
            .await
            .map_err(|e| self.storage_err(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.storage_err(e))?;
        Ok(())
    }

    /// Set `id`'s notification time. Input is validated before the lock is
    /// taken, so a bad request never touches the file.
    pub async fn subscribe(&self, id: &str, time: &str) -> Result<SubscribeOutcome, RegistryError> {
        validate_subscriber_id(id)?;
        let time = TimeOfDay::parse(time)?;

        let _held = self.lock.lock().await;
        let mut lines = self.load().await?;

        let mut outcome = SubscribeOutcome::Created;
        for line in lines.iter_mut() {
            if let Line::Entry(s) = line {
                if s.id == id {
                    s.time = time.to_string();
                    outcome = SubscribeOutcome::Updated;
                }
            }
        }
        if outcome == SubscribeOutcome::Created {
            lines.push(Line::Entry(Subscriber::new(id, time)));
        }

        self.store(&lines).await.map_err(|e| {
            warn!(subscriber_id = id, error = %e, "subscriber registry write failed");
            e
        })?;
        debug!(subscriber_id = id, %time, ?outcome, "subscribed");
        Ok(outcome)
    }

    /// Remove `id`. The file is only rewritten when something was removed.
    pub async fn unsubscribe(&self, id: &str) -> Result<UnsubscribeOutcome, RegistryError> {
        let _held = self.lock.lock().await;
        let mut lines = self.load().await?;

        let before = lines.len();
        lines.retain(|l| !matches!(l, Line::Entry(s) if s.id == id));
        if lines.len() == before {
            return Ok(UnsubscribeOutcome::NotSubscribed);
        }

        self.store(&lines).await?;
        debug!(subscriber_id = id, "unsubscribed");
        Ok(UnsubscribeOutcome::Removed)
    }

    /// Snapshot of every parseable entry, in file order.
    pub async fn list(&self) -> Result<Vec<Subscriber>, RegistryError> {
        let _held = self.lock.lock().await;
        let lines = self.load().await?;
        Ok(lines
            .into_iter()
            .filter_map(|l| match l {
                Line::Entry(s) => Some(s),
                Line::Unparsed(_) => None,
            })
            .collect())
    }
}
