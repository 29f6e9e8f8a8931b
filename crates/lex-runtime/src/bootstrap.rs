use std::time::Duration;

use anyhow::{Context, Result};
use lex_archive::TapConfig;
use lex_config::{ArchiveSettings, LexConfig};
use lex_mirror::Mirror;
use lex_schemas::FieldCatalog;
use tracing::info;

/// Pause before the n-th retry is `n * RETRY_BACKOFF`.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

pub fn tap_config(a: &ArchiveSettings) -> TapConfig {
    TapConfig {
        base_url: a.base_url.clone(),
        sync_path: a.sync_path.clone(),
        observation_table: a.observation_table.clone(),
        composite_table: a.composite_table.clone(),
        name_column: a.name_column.clone(),
        release_column: a.release_column.clone(),
        update_column: a.update_column.clone(),
        names_per_query: a.names_per_query,
        max_attempts: a.max_attempts,
        timeout: a.timeout(),
        retry_backoff: RETRY_BACKOFF,
    }
}

/// Load the field catalog, open the mirror database (`LEX_MIRROR_URL`
/// overrides the configured url) and create any missing tables.
pub async fn open_mirror(cfg: &LexConfig) -> Result<Mirror> {
    let catalog = FieldCatalog::load(&cfg.mirror.fields_path)
        .with_context(|| format!("load field catalog {}", cfg.mirror.fields_path))?;

    let url = std::env::var(lex_mirror::ENV_DB_URL)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| cfg.mirror.database_url.clone());
    if let Some(dir) = sqlite_parent_dir(&url) {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create mirror directory {dir}"))?;
    }

    let pool = lex_mirror::connect(&url, 4).await?;
    let mirror = Mirror::new(pool, catalog, &cfg.archive.name_column)?;
    mirror.ensure_schema().await?;
    info!(url = %url, columns = mirror.catalog().fields().len(), "mirror ready");
    Ok(mirror)
}

/// Directory part of a file-backed sqlite url, if any.
fn sqlite_parent_dir(url: &str) -> Option<String> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    let parent = std::path::Path::new(path).parent()?;
    let parent = parent.to_str()?;
    (!parent.is_empty()).then(|| parent.to_string())
}
