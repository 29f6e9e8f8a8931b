//! Typed configuration. Every field has a default so an empty document is a
//! valid (development) configuration.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unknown top-level sections are left to [`crate::report_unused_keys`];
/// unknown keys inside a known section are rejected outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexConfig {
    pub archive: ArchiveSettings,
    pub mirror: MirrorSettings,
    pub storage: StorageSettings,
    pub schedule: ScheduleSettings,
    pub paging: PagingSettings,
    pub news: NewsSettings,
    pub daemon: DaemonSettings,
}

impl LexConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: LexConfig =
            serde_json::from_value(v.clone()).context("config does not match LexConfig")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.archive.names_per_query == 0 {
            bail!("archive.names_per_query must be > 0");
        }
        if self.archive.max_attempts == 0 {
            bail!("archive.max_attempts must be >= 1");
        }
        if self.schedule.reconcile_interval_secs == 0
            || self.schedule.notification_tick_secs == 0
            || self.schedule.cache_refresh_interval_secs == 0
        {
            bail!("schedule intervals must be > 0 seconds");
        }
        // A tick longer than a minute can skip an HH:MM slot entirely.
        if self.schedule.notification_tick_secs > 60 {
            bail!("schedule.notification_tick_secs must be <= 60");
        }
        if self.paging.page_size == 0 || self.paging.lookup_limit == 0 {
            bail!("paging sizes must be > 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveSettings {
    pub base_url: String,
    pub sync_path: String,
    pub observation_table: String,
    pub composite_table: String,
    pub name_column: String,
    pub release_column: String,
    pub update_column: String,
    pub names_per_query: usize,
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            base_url: "https://exoplanetarchive.ipac.caltech.edu".to_string(),
            sync_path: "/TAP/sync".to_string(),
            observation_table: "ps".to_string(),
            composite_table: "pscomppars".to_string(),
            name_column: "pl_name".to_string(),
            release_column: "releasedate".to_string(),
            update_column: "rowupdate".to_string(),
            names_per_query: 200,
            max_attempts: 3,
            timeout_secs: 120,
        }
    }
}

impl ArchiveSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorSettings {
    pub database_url: String,
    pub fields_path: String,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://resources/archive/mirror.db".to_string(),
            fields_path: "resources/config/fields.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    pub subscribers_path: String,
    pub news_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            subscribers_path: "resources/data/subscribers.txt".to_string(),
            news_path: "resources/data/news.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleSettings {
    pub reconcile_interval_secs: u64,
    pub notification_tick_secs: u64,
    pub cache_refresh_interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 86_400,
            notification_tick_secs: 30,
            cache_refresh_interval_secs: 21_600,
        }
    }
}

impl ScheduleSettings {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn notification_tick(&self) -> Duration {
        Duration::from_secs(self.notification_tick_secs)
    }

    pub fn cache_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.cache_refresh_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagingSettings {
    pub page_size: u32,
    pub lookup_limit: u32,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            page_size: 25,
            lookup_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewsSettings {
    /// When absent the cache refresher is not started; the cache file is
    /// still loaded and served.
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonSettings {
    pub addr: String,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8898".to_string(),
        }
    }
}
