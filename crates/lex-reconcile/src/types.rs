use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What to do with the composite table this cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositePlan {
    /// Local table is empty: copy every remote row.
    FullTransfer,
    /// Counts differ: compare name sets and patch the difference.
    Diff,
    /// Counts agree: skip the table.
    UpToDate,
}

/// What to do with the observation table this cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ObservationPlan {
    FullTransfer,
    /// Replace the rows of every entity released or updated on/after `since`.
    Incremental { since: NaiveDate },
}

/// Result of comparing remote and local entity-name sets. Both lists are
/// sorted and free of duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameDiff {
    /// Present remotely, absent locally.
    pub missing: Vec<String>,
    /// Present locally, absent remotely.
    pub stale: Vec<String>,
}

impl NameDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }
}

/// Outcome of one completed reconciliation cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub composite: CompositePlan,
    pub observations: ObservationPlan,
    pub composite_inserted: u64,
    pub composite_deleted: u64,
    pub observations_deleted: u64,
    pub observations_inserted: u64,
    pub watermark_before: Option<NaiveDate>,
    pub watermark_after: Option<NaiveDate>,
}

impl CycleReport {
    pub fn new(
        cycle: u64,
        started_at: DateTime<Utc>,
        composite: CompositePlan,
        observations: ObservationPlan,
        watermark_before: Option<NaiveDate>,
    ) -> Self {
        Self {
            cycle,
            started_at,
            composite,
            observations,
            composite_inserted: 0,
            composite_deleted: 0,
            observations_deleted: 0,
            observations_inserted: 0,
            watermark_before,
            watermark_after: watermark_before,
        }
    }

    /// Any insert or delete happened; the watermark advances iff this holds.
    pub fn changed(&self) -> bool {
        self.composite_inserted
            + self.composite_deleted
            + self.observations_deleted
            + self.observations_inserted
            > 0
    }
}
