use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lex_archive::Archive;
use lex_gate::AvailabilityGate;
use lex_mirror::Mirror;
use lex_reconcile::{
    diff_names, plan_composite, plan_observations, CompositePlan, CycleReport, ObservationPlan,
    Watermark, WatermarkAdvance,
};
use lex_schemas::{Row, Selection, Table};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::SyncError;

// ---------------------------------------------------------------------------
// Fetched work
// ---------------------------------------------------------------------------

/// Composite changes, fully fetched.
#[derive(Debug, Default)]
struct CompositeWork {
    insert: Vec<Row>,
    delete: Vec<String>,
}

/// Observation changes, fully fetched.
#[derive(Debug)]
enum ObservationWork {
    Insert(Vec<Row>),
    /// Drop every local row of `names`, then insert `rows`.
    Replace { names: Vec<String>, rows: Vec<Row> },
}

// ---------------------------------------------------------------------------
// ReconciliationEngine
// ---------------------------------------------------------------------------

/// Brings the mirror up to date with the archive, one cycle at a time.
///
/// A cycle runs in two phases under the gate's cycle guard: every remote
/// query first, then the local writes. An archive failure therefore leaves
/// the mirror exactly as it was. A storage failure in the write phase can
/// leave earlier steps committed (each step is its own transaction), but the
/// watermark is written last, so the next cycle redoes the work.
pub struct ReconciliationEngine {
    archive: Arc<dyn Archive>,
    mirror: Mirror,
    gate: Arc<AvailabilityGate>,
    cycles: AtomicU64,
    last_report: Mutex<Option<CycleReport>>,
}

impl ReconciliationEngine {
    pub fn new(archive: Arc<dyn Archive>, mirror: Mirror, gate: Arc<AvailabilityGate>) -> Self {
        Self {
            archive,
            mirror,
            gate,
            cycles: AtomicU64::new(0),
            last_report: Mutex::new(None),
        }
    }

    pub fn gate(&self) -> &Arc<AvailabilityGate> {
        &self.gate
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Report of the most recent successful cycle.
    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.lock().clone()
    }

    /// Run one cycle. The gate is SLEEPING for its whole duration and AWAKE
    /// again when this returns, whatever the outcome.
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = Utc::now();

        let result = {
            let _cycle_guard = self.gate.begin_cycle().await;
            self.reconcile(cycle, started_at).await
        };

        match &result {
            Ok(report) => {
                info!(
                    cycle,
                    source = self.archive.source_name(),
                    composite = ?report.composite,
                    composite_inserted = report.composite_inserted,
                    composite_deleted = report.composite_deleted,
                    observations_deleted = report.observations_deleted,
                    observations_inserted = report.observations_inserted,
                    watermark = ?report.watermark_after,
                    "reconcile cycle complete"
                );
                *self.last_report.lock() = Some(report.clone());
            }
            Err(e) => warn!(cycle, error = %e, "reconcile cycle aborted; retrying next interval"),
        }
        result
    }

    async fn reconcile(
        &self,
        cycle: u64,
        started_at: DateTime<Utc>,
    ) -> Result<CycleReport, SyncError> {
        // Plan.
        let remote_composite = self.archive.count(&Selection::all(Table::Composite)).await?;
        let local_composite = self
            .mirror
            .count(Table::Composite)
            .await
            .map_err(SyncError::storage)?;
        let local_observations = self
            .mirror
            .count(Table::Observations)
            .await
            .map_err(SyncError::storage)?;
        let watermark = Watermark::new(self.mirror.watermark().await.map_err(SyncError::storage)?);

        let composite = plan_composite(local_composite, remote_composite);
        let observations = plan_observations(
            local_observations,
            watermark.get(),
            Watermark::fallback_since(),
        );
        debug!(
            cycle,
            local_composite,
            remote_composite,
            ?composite,
            ?observations,
            "reconcile plan"
        );

        // Fetch.
        let composite_work = self.fetch_composite(composite).await?;
        let observation_work = self.fetch_observations(observations).await?;

        // Apply.
        let mut report = CycleReport::new(cycle, started_at, composite, observations, watermark.get());

        report.composite_inserted = self
            .mirror
            .insert_rows(Table::Composite, &composite_work.insert)
            .await
            .map_err(SyncError::storage)?;
        report.composite_deleted = self
            .mirror
            .delete_entities(&composite_work.delete)
            .await
            .map_err(SyncError::storage)?;

        match observation_work {
            ObservationWork::Insert(rows) => {
                report.observations_inserted = self
                    .mirror
                    .insert_rows(Table::Observations, &rows)
                    .await
                    .map_err(SyncError::storage)?;
            }
            ObservationWork::Replace { names, rows } if !names.is_empty() => {
                let (deleted, inserted) = self
                    .mirror
                    .replace_observations(&names, &rows)
                    .await
                    .map_err(SyncError::storage)?;
                report.observations_deleted = deleted;
                report.observations_inserted = inserted;
            }
            ObservationWork::Replace { .. } => {}
        }

        match watermark.check(&report, started_at.date_naive()) {
            WatermarkAdvance::Advance(to) => {
                let stored = self
                    .mirror
                    .advance_watermark(to)
                    .await
                    .map_err(SyncError::storage)?;
                report.watermark_after = Some(stored);
            }
            WatermarkAdvance::Unchanged => {}
            WatermarkAdvance::Regressed { current, got } => {
                // Clock went backwards. The store refuses the older date too.
                warn!(cycle, %current, %got, "watermark would regress; keeping current");
            }
        }
        Ok(report)
    }

    async fn fetch_composite(&self, plan: CompositePlan) -> Result<CompositeWork, SyncError> {
        match plan {
            CompositePlan::UpToDate => Ok(CompositeWork::default()),
            CompositePlan::FullTransfer => Ok(CompositeWork {
                insert: self
                    .archive
                    .fetch_rows(&Selection::all(Table::Composite))
                    .await?,
                delete: Vec::new(),
            }),
            CompositePlan::Diff => {
                let remote = self
                    .archive
                    .fetch_names(&Selection::all(Table::Composite))
                    .await?;
                let local = self
                    .mirror
                    .names(Table::Composite)
                    .await
                    .map_err(SyncError::storage)?;
                let diff = diff_names(remote, local);
                debug!(missing = diff.missing.len(), stale = diff.stale.len(), "composite name diff");

                let insert = if diff.missing.is_empty() {
                    Vec::new()
                } else {
                    self.archive
                        .fetch_rows(&Selection::names(Table::Composite, diff.missing))
                        .await?
                };
                Ok(CompositeWork {
                    insert,
                    delete: diff.stale,
                })
            }
        }
    }

    async fn fetch_observations(
        &self,
        plan: ObservationPlan,
    ) -> Result<ObservationWork, SyncError> {
        match plan {
            ObservationPlan::FullTransfer => Ok(ObservationWork::Insert(
                self.archive
                    .fetch_rows(&Selection::all(Table::Observations))
                    .await?,
            )),
            ObservationPlan::Incremental { since } => {
                // Every row of a touched entity is refetched, not just the
                // changed ones, since its local rows are all replaced.
                let mut names = self
                    .archive
                    .fetch_names(&Selection::changed_since(Table::Observations, since))
                    .await?;
                names.sort();
                names.dedup();
                if names.is_empty() {
                    return Ok(ObservationWork::Replace {
                        names,
                        rows: Vec::new(),
                    });
                }
                let rows = self
                    .archive
                    .fetch_rows(&Selection::names(Table::Observations, names.clone()))
                    .await?;
                self.check_rows_belong(&names, &rows)?;
                Ok(ObservationWork::Replace { names, rows })
            }
        }
    }

    /// A row outside `names` would survive the delete and duplicate on the
    /// next replace.
    fn check_rows_belong(&self, names: &[String], rows: &[Row]) -> Result<(), SyncError> {
        let Some(idx) = self
            .mirror
            .catalog()
            .position(Table::Observations, self.mirror.name_column())
        else {
            return Err(SyncError::InconsistentState(format!(
                "name column `{}` missing from observation columns",
                self.mirror.name_column()
            )));
        };
        for row in rows {
            match row.name_at(idx) {
                Some(n) if names.binary_search(&n).is_ok() => {}
                other => {
                    return Err(SyncError::InconsistentState(format!(
                        "archive returned observation row for unrequested entity {other:?}"
                    )))
                }
            }
        }
        Ok(())
    }
}
