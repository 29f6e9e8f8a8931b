//! Mirror watermark: the date of the last cycle that changed the mirror.
//!
//! # Invariants
//!
//! - **Non-decreasing**: an advance to an older date is refused.
//! - **Advances only on change**: a cycle with no inserts or deletes leaves
//!   it where it was.
//! - **Never rolled back**: an aborted cycle never reaches the advance step,
//!   so the stored value is the pre-cycle value.
//! - **Pure, no IO**: the runtime persists whatever this type decides.

use chrono::NaiveDate;

use crate::CycleReport;

/// Result of offering a candidate date to the watermark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatermarkAdvance {
    /// Candidate is newer than (or equal to) the current value, or there was
    /// none yet.
    Advance(NaiveDate),
    /// Cycle changed nothing; keep the current value.
    Unchanged,
    /// Candidate is strictly older than the current value.
    Regressed { current: NaiveDate, got: NaiveDate },
}

impl WatermarkAdvance {
    pub fn is_advance(&self) -> bool {
        matches!(self, WatermarkAdvance::Advance(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Watermark {
    last: Option<NaiveDate>,
}

impl Watermark {
    pub fn new(last: Option<NaiveDate>) -> Self {
        Self { last }
    }

    pub fn get(&self) -> Option<NaiveDate> {
        self.last
    }

    /// Start of the incremental observation query when nothing was stored.
    pub fn fallback_since() -> NaiveDate {
        NaiveDate::default()
    }

    /// Decide, without mutating, what ending `report` on `today` does to the
    /// watermark.
    pub fn check(&self, report: &CycleReport, today: NaiveDate) -> WatermarkAdvance {
        if !report.changed() {
            return WatermarkAdvance::Unchanged;
        }
        match self.last {
            Some(current) if today < current => WatermarkAdvance::Regressed {
                current,
                got: today,
            },
            _ => WatermarkAdvance::Advance(today),
        }
    }

    /// [`check`](Self::check) and apply an `Advance`.
    pub fn accept(&mut self, report: &CycleReport, today: NaiveDate) -> WatermarkAdvance {
        let decision = self.check(report, today);
        if let WatermarkAdvance::Advance(d) = decision {
            self.last = Some(d);
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompositePlan, ObservationPlan};
    use chrono::{TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn report(inserted: u64) -> CycleReport {
        let mut r = CycleReport::new(
            1,
            Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap(),
            CompositePlan::Diff,
            ObservationPlan::FullTransfer,
            None,
        );
        r.composite_inserted = inserted;
        r
    }

    #[test]
    fn fallback_is_unix_epoch() {
        assert_eq!(Watermark::fallback_since(), d(1970, 1, 1));
    }

    #[test]
    fn unchanged_cycle_does_not_advance() {
        let mut w = Watermark::new(Some(d(2024, 1, 1)));
        assert_eq!(w.accept(&report(0), d(2024, 5, 1)), WatermarkAdvance::Unchanged);
        assert_eq!(w.get(), Some(d(2024, 1, 1)));
    }

    #[test]
    fn changed_cycle_advances_from_nothing() {
        let mut w = Watermark::default();
        assert!(w.accept(&report(2), d(2024, 5, 1)).is_advance());
        assert_eq!(w.get(), Some(d(2024, 5, 1)));
    }

    #[test]
    fn same_day_is_not_a_regression() {
        let w = Watermark::new(Some(d(2024, 5, 1)));
        assert_eq!(w.check(&report(1), d(2024, 5, 1)), WatermarkAdvance::Advance(d(2024, 5, 1)));
    }

    #[test]
    fn older_date_is_refused() {
        let mut w = Watermark::new(Some(d(2024, 5, 1)));
        let got = w.accept(&report(1), d(2024, 4, 30));
        assert_eq!(
            got,
            WatermarkAdvance::Regressed {
                current: d(2024, 5, 1),
                got: d(2024, 4, 30)
            }
        );
        assert_eq!(w.get(), Some(d(2024, 5, 1)));
    }
}
