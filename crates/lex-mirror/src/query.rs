// Read-side queries behind the caller-facing operations.
//
// `keyword` arguments are expected already normalised (spaces removed,
// ASCII lower case); matching compares against the entity name folded the
// same way in SQL. SQLite's `lower()` only folds ASCII.

use anyhow::{bail, Context, Result};
use lex_schemas::{Cell, Row, Table};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, TypeInfo, ValueRef};

use crate::{quote_ident, table_name, Mirror};

/// Composite rows matching a keyword, capped at a limit.
#[derive(Debug, Clone, Serialize)]
pub struct Lookup {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// More rows matched than were returned.
    pub exceeds: bool,
}

/// One observation row with the columns a random pick shows.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub columns: Vec<String>,
    pub row: Row,
}

/// An entity and its system distance in parsecs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distance {
    pub name: String,
    pub parsecs: f64,
}

/// Display columns of a random pick after the entity name. Catalog gaps are
/// skipped.
const SAMPLE_COLUMNS: &[&str] = &[
    "pl_eqt",
    "pl_insol",
    "pl_bmasse",
    "pl_orbper",
    "pl_orbeccen",
    "st_teff",
    "pl_refname",
];

const DISTANCE_COLUMN: &str = "sy_dist";

fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn decode_cell(row: &SqliteRow, idx: usize) -> Result<Cell> {
    let raw = row.try_get_raw(idx).context("read cell failed")?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }
    let kind = raw.type_info().name().to_string();
    let cell = match kind.as_str() {
        "INTEGER" => Cell::Int(row.try_get::<i64, _>(idx)?),
        "REAL" => Cell::Real(row.try_get::<f64, _>(idx)?),
        _ => Cell::Text(row.try_get::<String, _>(idx)?),
    };
    Ok(cell)
}

fn decode_row(row: &SqliteRow, width: usize) -> Result<Row> {
    let cells = (0..width)
        .map(|i| decode_cell(row, i))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(cells))
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Mirror {
    fn keyword_predicate(&self) -> String {
        format!(
            "lower(replace({}, ' ', '')) like ? escape '\\'",
            quote_ident(&self.name_column)
        )
    }

    /// Composite entity names in `[offset, offset + limit)`, ordered by name.
    pub async fn search_names(
        &self,
        keyword: Option<&str>,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<String>> {
        let name = quote_ident(&self.name_column);
        let t = table_name(Table::Composite);
        let select = format!("select cast({name} as text) from {t}");
        let rows: Vec<(String,)> = match keyword {
            Some(kw) => {
                let sql = format!(
                    "{select} where {} order by {name} limit ? offset ?",
                    self.keyword_predicate()
                );
                sqlx::query_as::<_, (String,)>(&sql)
                    .bind(like_pattern(kw))
                    .bind(i64::from(limit))
                    .bind(i64::from(offset))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("{select} order by {name} limit ? offset ?");
                sqlx::query_as::<_, (String,)>(&sql)
                    .bind(i64::from(limit))
                    .bind(i64::from(offset))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("search_names failed")?;
        Ok(rows.into_iter().map(|(n,)| n).collect())
    }

    /// Composite rows matching `keyword`; every row without one.
    pub async fn count_like(&self, keyword: Option<&str>) -> Result<u64> {
        let Some(kw) = keyword else {
            return self.count(Table::Composite).await;
        };
        let sql = format!(
            "select count(*) from {} where {}",
            table_name(Table::Composite),
            self.keyword_predicate()
        );
        let (n,): (i64,) = sqlx::query_as(&sql)
            .bind(like_pattern(kw))
            .fetch_one(&self.pool)
            .await
            .context("count_like failed")?;
        Ok(n.max(0) as u64)
    }

    /// Distinct entities present in the observation table.
    pub async fn count_distinct_names(&self) -> Result<u64> {
        let sql = format!(
            "select count(distinct {}) from {}",
            quote_ident(&self.name_column),
            table_name(Table::Observations)
        );
        let (n,): (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .context("count_distinct_names failed")?;
        Ok(n.max(0) as u64)
    }

    /// Distinct entities whose `disc_year` equals `year`.
    pub async fn discovered_in(&self, year: i32) -> Result<u64> {
        const YEAR_COLUMN: &str = "disc_year";
        if self
            .catalog
            .position(Table::Observations, YEAR_COLUMN)
            .is_none()
        {
            bail!("catalog has no `{YEAR_COLUMN}` column");
        }
        let sql = format!(
            "select count(distinct {}) from {} where {} = ?",
            quote_ident(&self.name_column),
            table_name(Table::Observations),
            quote_ident(YEAR_COLUMN)
        );
        let (n,): (i64,) = sqlx::query_as(&sql)
            .bind(i64::from(year))
            .fetch_one(&self.pool)
            .await
            .context("discovered_in failed")?;
        Ok(n.max(0) as u64)
    }

    /// Up to `limit` composite rows matching `keyword`, catalog columns only.
    pub async fn lookup(&self, keyword: &str, limit: u32) -> Result<Lookup> {
        let columns: Vec<String> = self
            .catalog
            .columns(Table::Composite)
            .into_iter()
            .map(str::to_string)
            .collect();
        let sql = format!(
            "select {} from {} where {} order by {} limit ?",
            column_list(&columns),
            table_name(Table::Composite),
            self.keyword_predicate(),
            quote_ident(&self.name_column)
        );
        let fetched: Vec<SqliteRow> = sqlx::query(&sql)
            .bind(like_pattern(keyword))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .context("lookup failed")?;

        let rows = fetched
            .iter()
            .map(|r| decode_row(r, columns.len()))
            .collect::<Result<Vec<_>>>()?;

        let total = self.count_like(Some(keyword)).await?;
        Ok(Lookup {
            columns,
            rows,
            exceeds: total > u64::from(limit),
        })
    }

    /// One observation row picked at random; `None` on an empty table.
    pub async fn random_entity(&self) -> Result<Option<Sample>> {
        let mut columns = vec![self.name_column.clone()];
        columns.extend(
            SAMPLE_COLUMNS
                .iter()
                .filter(|c| self.catalog.position(Table::Observations, c).is_some())
                .map(|c| c.to_string()),
        );
        let sql = format!(
            "select {} from {} order by random() limit 1",
            column_list(&columns),
            table_name(Table::Observations)
        );
        let picked: Option<SqliteRow> = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .context("random_entity failed")?;
        let Some(r) = picked else {
            return Ok(None);
        };
        let row = decode_row(&r, columns.len())?;
        Ok(Some(Sample { columns, row }))
    }

    /// The `n` composite entities closest to us. Rows without a distance
    /// (NULL or blank) are left out.
    pub async fn nearest(&self, n: u32) -> Result<Vec<Distance>> {
        self.by_distance(n, "asc").await
    }

    /// The `n` composite entities farthest from us.
    pub async fn farthest(&self, n: u32) -> Result<Vec<Distance>> {
        self.by_distance(n, "desc").await
    }

    async fn by_distance(&self, n: u32, order: &'static str) -> Result<Vec<Distance>> {
        if self
            .catalog
            .position(Table::Composite, DISTANCE_COLUMN)
            .is_none()
        {
            bail!("catalog has no `{DISTANCE_COLUMN}` column");
        }
        let name = quote_ident(&self.name_column);
        let dist = quote_ident(DISTANCE_COLUMN);
        let sql = format!(
            "select cast({name} as text), min(cast({dist} as real)) as parsecs from {} \
             where {dist} is not null and trim(cast({dist} as text)) != '' \
             group by {name} order by parsecs {order}, {name} limit ?",
            table_name(Table::Composite)
        );
        let rows: Vec<(String, f64)> = sqlx::query_as(&sql)
            .bind(i64::from(n))
            .fetch_all(&self.pool)
            .await
            .context("distance query failed")?;
        Ok(rows
            .into_iter()
            .map(|(name, parsecs)| Distance { name, parsecs })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("k2"), "%k2%");
        assert_eq!(like_pattern("a_b%"), "%a\\_b\\%%");
    }
}
