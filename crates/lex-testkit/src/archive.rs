use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use lex_archive::{Archive, ArchiveError};
use lex_gate::{Availability, AvailabilityGate};
use lex_schemas::{FieldCatalog, Row, RowFilter, Selection, Table};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// InMemoryArchive
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveCall {
    pub method: &'static str,
    pub selection: Selection,
}

#[derive(Clone, Debug)]
struct Stored {
    row: Row,
    changed: NaiveDate,
}

#[derive(Debug, Default)]
struct Tables {
    composite: Vec<Stored>,
    observations: Vec<Stored>,
}

impl Tables {
    fn table(&self, t: Table) -> &Vec<Stored> {
        match t {
            Table::Composite => &self.composite,
            Table::Observations => &self.observations,
        }
    }

    fn table_mut(&mut self, t: Table) -> &mut Vec<Stored> {
        match t {
            Table::Composite => &mut self.composite,
            Table::Observations => &mut self.observations,
        }
    }
}

/// Remote archive held in memory. Every row carries the date it was last
/// released or updated, which is what `ChangedSince` filters on.
#[derive(Debug)]
pub struct InMemoryArchive {
    catalog: FieldCatalog,
    name_column: String,
    tables: Mutex<Tables>,
    calls: Mutex<Vec<ArchiveCall>>,
}

impl InMemoryArchive {
    pub fn new(catalog: FieldCatalog, name_column: &str) -> Self {
        Self {
            catalog,
            name_column: name_column.to_string(),
            tables: Mutex::new(Tables::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn name_of(&self, table: Table, row: &Row) -> Option<String> {
        let idx = self.catalog.position(table, &self.name_column)?;
        row.name_at(idx)
    }

    pub fn push(&self, table: Table, row: Row, changed: NaiveDate) {
        self.tables
            .lock()
            .table_mut(table)
            .push(Stored { row, changed });
    }

    /// Drop every row of `name` from both tables.
    pub fn remove_entity(&self, name: &str) {
        let mut t = self.tables.lock();
        for table in [Table::Composite, Table::Observations] {
            let idx = self.catalog.position(table, &self.name_column);
            t.table_mut(table)
                .retain(|s| idx.and_then(|i| s.row.name_at(i)).as_deref() != Some(name));
        }
    }

    /// Replace the observation rows of `name` with `rows`, all changed on
    /// `changed`.
    pub fn revise_observations(&self, name: &str, rows: Vec<Row>, changed: NaiveDate) {
        let idx = self.catalog.position(Table::Observations, &self.name_column);
        let mut t = self.tables.lock();
        t.observations
            .retain(|s| idx.and_then(|i| s.row.name_at(i)).as_deref() != Some(name));
        t.observations
            .extend(rows.into_iter().map(|row| Stored { row, changed }));
    }

    pub fn names(&self, table: Table) -> BTreeSet<String> {
        let t = self.tables.lock();
        t.table(table)
            .iter()
            .filter_map(|s| self.name_of(table, &s.row))
            .collect()
    }

    pub fn calls(&self) -> Vec<ArchiveCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, method: &'static str, sel: &Selection) {
        self.calls.lock().push(ArchiveCall {
            method,
            selection: sel.clone(),
        });
    }

    fn select(&self, sel: &Selection) -> Vec<Row> {
        let t = self.tables.lock();
        t.table(sel.table)
            .iter()
            .filter(|s| match &sel.filter {
                RowFilter::All => true,
                RowFilter::Names(names) => self
                    .name_of(sel.table, &s.row)
                    .is_some_and(|n| names.contains(&n)),
                RowFilter::ChangedSince(d) => s.changed >= *d,
            })
            .map(|s| s.row.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Archive for InMemoryArchive {
    fn source_name(&self) -> &'static str {
        "memory"
    }

    async fn count(&self, sel: &Selection) -> Result<u64, ArchiveError> {
        self.record("count", sel);
        Ok(self.select(sel).len() as u64)
    }

    async fn fetch_names(&self, sel: &Selection) -> Result<Vec<String>, ArchiveError> {
        self.record("fetch_names", sel);
        let mut seen = BTreeSet::new();
        Ok(self
            .select(sel)
            .iter()
            .filter_map(|r| self.name_of(sel.table, r))
            .filter(|n| seen.insert(n.clone()))
            .collect())
    }

    async fn fetch_rows(&self, sel: &Selection) -> Result<Vec<Row>, ArchiveError> {
        self.record("fetch_rows", sel);
        Ok(self.select(sel))
    }
}

// ---------------------------------------------------------------------------
// FlakyArchive
// ---------------------------------------------------------------------------

/// Which calls a [`FlakyArchive`] fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailOn {
    Count,
    Names,
    Rows,
    Any,
}

/// Wraps another archive. While a failure mode is set, matching calls
/// return a 503 without reaching the inner archive.
pub struct FlakyArchive {
    inner: Arc<dyn Archive>,
    fail: Mutex<Option<FailOn>>,
    watched_gate: Option<Arc<AvailabilityGate>>,
    seen: Mutex<Vec<Availability>>,
}

impl FlakyArchive {
    pub fn new(inner: Arc<dyn Archive>) -> Self {
        Self {
            inner,
            fail: Mutex::new(None),
            watched_gate: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Record `gate.state()` at the start of every call.
    pub fn observing_gate(mut self, gate: Arc<AvailabilityGate>) -> Self {
        self.watched_gate = Some(gate);
        self
    }

    pub fn fail(&self, on: FailOn) {
        *self.fail.lock() = Some(on);
    }

    pub fn heal(&self) {
        *self.fail.lock() = None;
    }

    /// Gate states observed by calls so far.
    pub fn seen_states(&self) -> Vec<Availability> {
        self.seen.lock().clone()
    }

    fn enter(&self, kind: FailOn) -> Result<(), ArchiveError> {
        if let Some(gate) = &self.watched_gate {
            self.seen.lock().push(gate.state());
        }
        match *self.fail.lock() {
            Some(on) if on == kind || on == FailOn::Any => Err(ArchiveError::Http {
                status: 503,
                body: "service unavailable".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Archive for FlakyArchive {
    fn source_name(&self) -> &'static str {
        "flaky"
    }

    async fn count(&self, sel: &Selection) -> Result<u64, ArchiveError> {
        self.enter(FailOn::Count)?;
        self.inner.count(sel).await
    }

    async fn fetch_names(&self, sel: &Selection) -> Result<Vec<String>, ArchiveError> {
        self.enter(FailOn::Names)?;
        self.inner.fetch_names(sel).await
    }

    async fn fetch_rows(&self, sel: &Selection) -> Result<Vec<Row>, ArchiveError> {
        self.enter(FailOn::Rows)?;
        self.inner.fetch_rows(sel).await
    }
}
