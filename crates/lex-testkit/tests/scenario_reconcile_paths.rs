//! Scenario: reconciliation strategy per table.
//!
//! # Invariants under test
//!
//! 1. Empty local tables are filled by a full transfer and the watermark is set.
//! 2. Differing counts run the name diff: missing names are inserted, stale
//!    ones deleted from both tables. A one-for-one swap waits for the counts
//!    to drift apart.
//! 3. Remote composite emptied: every local entity goes, watermark advances.
//! 4. Equal counts with swapped membership are left alone (count short-circuit).
//! 5. A cycle with nothing to do changes neither rows nor watermark.

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use lex_gate::AvailabilityGate;
use lex_mirror::Mirror;
use lex_reconcile::{CompositePlan, ObservationPlan};
use lex_runtime::ReconciliationEngine;
use lex_schemas::{Selection, Table};
use lex_testkit::{
    composite_row, fixture_catalog, memory_mirror, observation_row, InMemoryArchive, NAME_COLUMN,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn remote_with(names: &[&str]) -> Arc<InMemoryArchive> {
    let a = Arc::new(InMemoryArchive::new(fixture_catalog(), NAME_COLUMN));
    for n in names {
        a.push(Table::Composite, composite_row(n, 2015), d(2020, 1, 1));
        a.push(Table::Observations, observation_row(n, 2015, 1.0), d(2020, 1, 1));
    }
    a
}

async fn local_with(names: &[&str]) -> Result<Mirror> {
    let m = memory_mirror().await?;
    let comp: Vec<_> = names.iter().map(|n| composite_row(n, 2015)).collect();
    let obs: Vec<_> = names.iter().map(|n| observation_row(n, 2015, 1.0)).collect();
    m.insert_rows(Table::Composite, &comp).await?;
    m.insert_rows(Table::Observations, &obs).await?;
    Ok(m)
}

fn engine(archive: Arc<InMemoryArchive>, mirror: Mirror) -> ReconciliationEngine {
    ReconciliationEngine::new(archive, mirror, Arc::new(AvailabilityGate::new()))
}

fn set(names: &[&str]) -> std::collections::BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// 1. Full transfer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_mirror_gets_full_transfer() -> Result<()> {
    let remote = remote_with(&["A", "B", "C"]);
    let eng = engine(Arc::clone(&remote), memory_mirror().await?);

    let report = eng.run_cycle().await?;
    assert_eq!(report.composite, CompositePlan::FullTransfer);
    assert_eq!(report.observations, ObservationPlan::FullTransfer);
    assert_eq!(report.composite_inserted, 3);
    assert_eq!(report.observations_inserted, 3);
    assert_eq!(report.watermark_before, None);
    assert_eq!(report.watermark_after, Some(Utc::now().date_naive()));

    let m = eng.mirror();
    assert_eq!(m.names(Table::Composite).await?, set(&["A", "B", "C"]));
    assert_eq!(m.watermark().await?, report.watermark_after);
    assert_eq!(eng.last_report(), Some(report));
    Ok(())
}

// ---------------------------------------------------------------------------
// 2. Name diff
// ---------------------------------------------------------------------------

#[tokio::test]
async fn name_diff_inserts_missing_and_deletes_stale() -> Result<()> {
    let remote = remote_with(&["A", "B", "C", "E"]);
    let local = local_with(&["A", "C", "D"]).await?;
    let eng = engine(Arc::clone(&remote), local);

    let report = eng.run_cycle().await?;
    assert_eq!(report.composite, CompositePlan::Diff);
    assert_eq!(report.composite_inserted, 2);
    assert_eq!(report.composite_deleted, 1);

    let m = eng.mirror();
    assert_eq!(m.names(Table::Composite).await?, set(&["A", "B", "C", "E"]));
    // D is gone from the observation table too.
    assert!(!m.names(Table::Observations).await?.contains("D"));

    // Only the missing names were transferred, not the whole table.
    let composite_row_fetches: Vec<_> = remote
        .calls()
        .into_iter()
        .filter(|c| c.method == "fetch_rows" && c.selection.table == Table::Composite)
        .collect();
    assert_eq!(composite_row_fetches.len(), 1);
    assert_eq!(
        composite_row_fetches[0].selection,
        Selection::names(Table::Composite, vec!["B".into(), "E".into()])
    );
    Ok(())
}

#[tokio::test]
async fn one_for_one_swap_waits_for_counts_to_drift() -> Result<()> {
    // Remote {A,B,C} vs local {A,C,D}: 3 vs 3, so the count check skips the diff.
    let remote = remote_with(&["A", "B", "C"]);
    let local = local_with(&["A", "C", "D"]).await?;
    local.advance_watermark(d(2030, 1, 1)).await?;
    let eng = engine(remote, local);

    let first = eng.run_cycle().await?;
    assert_eq!(first.composite, CompositePlan::UpToDate);
    assert_eq!(eng.mirror().names(Table::Composite).await?, set(&["A", "C", "D"]));

    // One more local row makes the counts differ; the next diff settles all of it.
    eng.mirror()
        .insert_rows(Table::Composite, &[composite_row("F", 2015)])
        .await?;
    let second = eng.run_cycle().await?;
    assert_eq!(second.composite, CompositePlan::Diff);
    assert_eq!(second.composite_inserted, 1);
    assert_eq!(second.composite_deleted, 2);
    assert_eq!(eng.mirror().names(Table::Composite).await?, set(&["A", "B", "C"]));
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Remote emptied
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remote_count_zero_empties_local_and_advances_watermark() -> Result<()> {
    let remote = Arc::new(InMemoryArchive::new(fixture_catalog(), NAME_COLUMN));
    let local = local_with(&["A", "B", "C"]).await?;
    let eng = engine(remote, local);

    let report = eng.run_cycle().await?;
    assert_eq!(report.composite_deleted, 3);
    assert_eq!(eng.mirror().count(Table::Composite).await?, 0);
    assert_eq!(eng.mirror().count(Table::Observations).await?, 0);
    assert!(report.watermark_after.is_some());
    // The watermark lives outside the (now empty) composite table.
    assert_eq!(eng.mirror().watermark().await?, report.watermark_after);
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Equal counts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn equal_counts_with_swapped_members_are_not_diffed() -> Result<()> {
    let remote = remote_with(&["A", "B", "X"]);
    let local = local_with(&["A", "B", "C"]).await?;
    local.advance_watermark(d(2030, 1, 1)).await?;
    let eng = engine(Arc::clone(&remote), local);

    let report = eng.run_cycle().await?;
    assert_eq!(report.composite, CompositePlan::UpToDate);
    assert_eq!(eng.mirror().names(Table::Composite).await?, set(&["A", "B", "C"]));
    assert!(!remote
        .calls()
        .iter()
        .any(|c| c.method == "fetch_names" && c.selection == Selection::all(Table::Composite)));
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Nothing to do
// ---------------------------------------------------------------------------

#[tokio::test]
async fn idle_cycle_keeps_watermark() -> Result<()> {
    let remote = remote_with(&["A", "B"]);
    let local = local_with(&["A", "B"]).await?;
    // Stored watermark is after every remote change date.
    local.advance_watermark(d(2021, 6, 1)).await?;
    let eng = engine(remote, local);

    let report = eng.run_cycle().await?;
    assert!(!report.changed());
    assert_eq!(report.observations, ObservationPlan::Incremental { since: d(2021, 6, 1) });
    assert_eq!(report.watermark_after, Some(d(2021, 6, 1)));
    assert_eq!(eng.mirror().watermark().await?, Some(d(2021, 6, 1)));
    Ok(())
}
