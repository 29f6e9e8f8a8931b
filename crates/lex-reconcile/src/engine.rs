use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::{CompositePlan, NameDiff, ObservationPlan};

/// Composite strategy from the two row counts.
///
/// Equal non-zero counts short-circuit to [`CompositePlan::UpToDate`] even
/// when the remote set swapped some entities for others. Such churn stays
/// invisible until the counts drift apart; the name diff run then catches
/// every accumulated difference at once.
pub fn plan_composite(local_count: u64, remote_count: u64) -> CompositePlan {
    if local_count == 0 {
        CompositePlan::FullTransfer
    } else if local_count != remote_count {
        CompositePlan::Diff
    } else {
        CompositePlan::UpToDate
    }
}

/// `missing = remote - local`, `stale = local - remote`.
pub fn diff_names<R, L>(remote: R, local: L) -> NameDiff
where
    R: IntoIterator,
    R::Item: Into<String>,
    L: IntoIterator,
    L::Item: Into<String>,
{
    let remote: BTreeSet<String> = remote.into_iter().map(Into::into).collect();
    let local: BTreeSet<String> = local.into_iter().map(Into::into).collect();

    NameDiff {
        missing: remote.difference(&local).cloned().collect(),
        stale: local.difference(&remote).cloned().collect(),
    }
}

/// Observation strategy. Without a stored watermark the incremental query
/// starts at `fallback_since`.
pub fn plan_observations(
    local_count: u64,
    watermark: Option<NaiveDate>,
    fallback_since: NaiveDate,
) -> ObservationPlan {
    if local_count == 0 {
        return ObservationPlan::FullTransfer;
    }
    ObservationPlan::Incremental {
        since: watermark.unwrap_or(fallback_since),
    }
}
