//! `lex mirror status` and `lex sync`.

use std::sync::Arc;

use anyhow::{Context, Result};
use lex_archive::{Archive, TapArchive};
use lex_config::LexConfig;
use lex_gate::AvailabilityGate;
use lex_runtime::{open_mirror, tap_config, ReconciliationEngine};
use tracing::info;

pub async fn status(cfg: &LexConfig) -> Result<()> {
    let mirror = open_mirror(cfg).await?;
    let s = mirror.status().await?;
    println!("observations={}", s.observations);
    println!("composite={}", s.composite);
    match s.watermark {
        Some(d) => println!("watermark={d}"),
        None => println!("watermark=NONE"),
    }
    Ok(())
}

/// One reconciliation cycle against the configured archive. Nothing else
/// reads this mirror handle, so the gate only brackets the cycle.
pub async fn sync_once(cfg: &LexConfig) -> Result<()> {
    let mirror = open_mirror(cfg).await?;
    let archive: Arc<dyn Archive> = Arc::new(TapArchive::new(
        tap_config(&cfg.archive),
        mirror.catalog().clone(),
    )?);
    let engine = ReconciliationEngine::new(archive, mirror, Arc::new(AvailabilityGate::new()));

    let report = engine
        .run_cycle()
        .await
        .context("reconciliation cycle aborted; mirror and watermark unchanged")?;
    info!(cycle = report.cycle, changed = report.changed(), "sync finished");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
