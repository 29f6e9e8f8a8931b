//! lex-schemas
//!
//! Row, selection and catalog types shared by the remote archive client and
//! the local mirror. Both sides describe a record the same way: a positional
//! list of [`Cell`]s whose column order is fixed per [`Table`] by the
//! [`FieldCatalog`].
//!
//! No IO beyond reading the catalog file.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The two logical tables of the mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Full observation table: many rows may share one entity name.
    Observations,
    /// Best-estimate table: exactly one row per entity name.
    Composite,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Observations => "observations",
            Table::Composite => "composite",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observations" | "ps" => Some(Table::Observations),
            "composite" | "pscomppars" => Some(Table::Composite),
            _ => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Cells and rows
// ---------------------------------------------------------------------------

/// One dynamically typed value, mirroring SQLite's storage classes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Type a raw CSV value.
    ///
    /// | raw                                   | cell        |
    /// |---------------------------------------|-------------|
    /// | `""`                                  | `Null`      |
    /// | contains `.` and parses as `f64`      | `Real`      |
    /// | parses as `i64`                       | `Int`       |
    /// | anything else                         | `Text`      |
    pub fn cast(raw: &str) -> Cell {
        if raw.is_empty() {
            return Cell::Null;
        }
        if raw.contains('.') {
            return match raw.parse::<f64>() {
                Ok(v) => Cell::Real(v),
                Err(_) => Cell::Text(raw.to_string()),
            };
        }
        match raw.parse::<i64>() {
            Ok(v) => Cell::Int(v),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Real(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// A positional record. Column order is `FieldCatalog::columns(table)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Build a row from raw CSV strings using [`Cell::cast`].
    pub fn from_raw<'a, I>(raw: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            cells: raw.into_iter().map(Cell::cast).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, idx: usize) -> Option<&Cell> {
        self.cells.get(idx)
    }

    /// The entity name at `name_idx`, rendered as text whatever the cell type.
    pub fn name_at(&self, name_idx: usize) -> Option<String> {
        match self.cells.get(name_idx)? {
            Cell::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Selections
// ---------------------------------------------------------------------------

/// Row predicate of a remote selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowFilter {
    /// Every row of the table.
    All,
    /// Rows whose entity name is one of these.
    Names(Vec<String>),
    /// Rows released or updated on/after this date.
    ChangedSince(NaiveDate),
}

/// A parameterised selection understood by both the archive and the mirror.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub table: Table,
    pub filter: RowFilter,
}

impl Selection {
    pub fn all(table: Table) -> Self {
        Self {
            table,
            filter: RowFilter::All,
        }
    }

    pub fn names(table: Table, names: Vec<String>) -> Self {
        Self {
            table,
            filter: RowFilter::Names(names),
        }
    }

    pub fn changed_since(table: Table, since: NaiveDate) -> Self {
        Self {
            table,
            filter: RowFilter::ChangedSince(since),
        }
    }
}

// ---------------------------------------------------------------------------
// Field catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog line {line}: expected `column:description`")]
    MissingSeparator { line: usize },
    #[error("catalog line {line}: `{name}` is not a plain SQL identifier")]
    InvalidIdentifier { line: usize, name: String },
    #[error("catalog line {line}: duplicate column `{name}`")]
    Duplicate { line: usize, name: String },
    #[error("catalog does not define the entity-name column `{0}`")]
    MissingNameColumn(String),
    #[error("entity-name column `{0}` must not be observation-only")]
    NameColumnObservationOnly(String),
    #[error("catalog io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One catalog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub description: String,
    /// `true` when the column exists only in the observation table.
    pub observation_only: bool,
}

/// Ordered column set of both mirror tables.
///
/// File format: one `column:description` per line; a trailing `~` marks a
/// column that exists only in the observation table. Blank lines and lines
/// starting with `#` are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    fields: Vec<Field>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut fields: Vec<Field> = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let observation_only = line.ends_with('~');
            let body = line.trim_end_matches('~');
            let (name, description) = body
                .split_once(':')
                .ok_or(CatalogError::MissingSeparator { line: line_no })?;
            let name = name.trim();
            if !is_sql_identifier(name) {
                return Err(CatalogError::InvalidIdentifier {
                    line: line_no,
                    name: name.to_string(),
                });
            }
            if fields.iter().any(|f| f.name == name) {
                return Err(CatalogError::Duplicate {
                    line: line_no,
                    name: name.to_string(),
                });
            }
            fields.push(Field {
                name: name.to_string(),
                description: description.trim().to_string(),
                observation_only,
            });
        }
        Ok(Self { fields })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Column names of `table`, in catalog order.
    pub fn columns(&self, table: Table) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| table == Table::Observations || !f.observation_only)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Position of `column` within `columns(table)`.
    pub fn position(&self, table: Table, column: &str) -> Option<usize> {
        self.columns(table).iter().position(|c| *c == column)
    }

    pub fn describe(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == column)
            .map(|f| f.description.as_str())
    }

    /// The name column must exist and be shared by both tables.
    pub fn require_name_column(&self, name_column: &str) -> Result<(), CatalogError> {
        match self.fields.iter().find(|f| f.name == name_column) {
            None => Err(CatalogError::MissingNameColumn(name_column.to_string())),
            Some(f) if f.observation_only => Err(CatalogError::NameColumnObservationOnly(
                name_column.to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
