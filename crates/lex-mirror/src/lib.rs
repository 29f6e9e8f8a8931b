//! lex-mirror
//!
//! The local relational mirror: an observation table, a composite table and
//! the single-row `mirror_meta` watermark, all in one SQLite database.
//!
//! Column sets come from the [`FieldCatalog`], so table DDL and inserts are
//! assembled at runtime. Catalog names are validated identifiers and are
//! double-quoted on top of that; values are always bound.
//!
//! Reading is unrestricted at this layer. Keeping readers away from a mirror
//! that is being rewritten is the availability gate's job, not the store's.

mod query;

pub use query::{Distance, Lookup, Sample};

use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use lex_schemas::{Cell, FieldCatalog, Row, Table};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

/// Overrides `mirror.database_url` when set.
pub const ENV_DB_URL: &str = "LEX_MIRROR_URL";

/// Open (creating if needed) the SQLite database at `url`.
///
/// `sqlite::memory:` gives every pooled connection its own database, so
/// in-memory callers should pass `max_connections = 1`.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid sqlite url: {url}"))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(opts)
        .await
        .context("failed to open mirror database")?;

    Ok(pool)
}

/// Run embedded SQLx migrations (static bookkeeping tables only).
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("mirror migrate failed")?;
    Ok(())
}

/// Local table name of `table`.
pub fn table_name(table: Table) -> &'static str {
    table.as_str()
}

fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn bind_cell<'q>(
    q: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    cell: &'q Cell,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match cell {
        Cell::Null => q.bind(None::<i64>),
        Cell::Int(v) => q.bind(*v),
        Cell::Real(v) => q.bind(*v),
        Cell::Text(s) => q.bind(s.as_str()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorStatus {
    pub observations: u64,
    pub composite: u64,
    pub watermark: Option<NaiveDate>,
}

/// Handle to the mirror database. Cheap to clone (the pool is shared).
#[derive(Debug, Clone)]
pub struct Mirror {
    pool: SqlitePool,
    catalog: FieldCatalog,
    name_column: String,
}

impl Mirror {
    pub fn new(pool: SqlitePool, catalog: FieldCatalog, name_column: &str) -> Result<Self> {
        catalog
            .require_name_column(name_column)
            .context("field catalog rejected")?;
        Ok(Self {
            pool,
            catalog,
            name_column: name_column.to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn name_column(&self) -> &str {
        &self.name_column
    }

    /// Create the meta table and both mirror tables if they do not exist.
    ///
    /// Existing tables are left alone; a catalog that no longer matches an
    /// existing file is not migrated.
    pub async fn ensure_schema(&self) -> Result<()> {
        migrate(&self.pool).await?;

        for table in [Table::Observations, Table::Composite] {
            let mut cols: Vec<String> = self
                .catalog
                .columns(table)
                .into_iter()
                .map(quote_ident)
                .collect();
            if table == Table::Composite {
                cols.push("last_write text".to_string());
            }
            let t = table_name(table);
            let ddl = format!(
                "create table if not exists {t} (id integer primary key autoincrement, {})",
                cols.join(", ")
            );
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .with_context(|| format!("create table {t} failed"))?;

            let idx = format!(
                "create index if not exists idx_{t}_name on {t} ({})",
                quote_ident(&self.name_column)
            );
            sqlx::query(&idx)
                .execute(&self.pool)
                .await
                .with_context(|| format!("create name index on {t} failed"))?;
        }
        Ok(())
    }

    pub async fn count(&self, table: Table) -> Result<u64> {
        let sql = format!("select count(*) from {}", table_name(table));
        let (n,): (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("count {table} failed"))?;
        Ok(n.max(0) as u64)
    }

    /// Distinct entity names of `table`.
    pub async fn names(&self, table: Table) -> Result<BTreeSet<String>> {
        let sql = format!(
            "select distinct cast({n} as text) from {t} where {n} is not null",
            n = quote_ident(&self.name_column),
            t = table_name(table)
        );
        let names: Vec<(String,)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("names of {table} failed"))?;
        Ok(names.into_iter().map(|(n,)| n).collect())
    }

    async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        table: Table,
        rows: &[Row],
    ) -> Result<u64> {
        let cols = self.catalog.columns(table);
        let sql = format!(
            "insert into {} ({}) values ({})",
            table_name(table),
            cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            vec!["?"; cols.len()].join(", ")
        );

        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols.len() {
                bail!(
                    "{table} row {i} has {} cells, catalog has {} columns",
                    row.len(),
                    cols.len()
                );
            }
            let mut q = sqlx::query(&sql);
            for cell in &row.cells {
                q = bind_cell(q, cell);
            }
            q.execute(&mut **tx)
                .await
                .with_context(|| format!("insert into {table} failed"))?;
        }
        Ok(rows.len() as u64)
    }

    async fn delete_names_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        table: Table,
        names: &[String],
    ) -> Result<u64> {
        let sql = format!(
            "delete from {} where {} = ?",
            table_name(table),
            quote_ident(&self.name_column)
        );
        let mut deleted = 0;
        for name in names {
            let res = sqlx::query(&sql)
                .bind(name)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("delete from {table} failed"))?;
            deleted += res.rows_affected();
        }
        Ok(deleted)
    }

    /// Insert `rows` as new records, all or nothing. Composite rows start
    /// with a NULL `last_write`.
    pub async fn insert_rows(&self, table: Table, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.context("begin insert tx failed")?;
        let n = self.insert_in_tx(&mut tx, table, rows).await?;
        tx.commit().await.context("commit insert tx failed")?;
        debug!(%table, inserted = n, "mirror insert");
        Ok(n)
    }

    /// Remove every record of `names` from both tables in one transaction.
    /// Returns the number of composite rows deleted.
    pub async fn delete_entities(&self, names: &[String]) -> Result<u64> {
        if names.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.context("begin delete tx failed")?;
        self.delete_names_in_tx(&mut tx, Table::Observations, names)
            .await?;
        let n = self
            .delete_names_in_tx(&mut tx, Table::Composite, names)
            .await?;
        tx.commit().await.context("commit delete tx failed")?;
        debug!(entities = names.len(), deleted = n, "mirror delete");
        Ok(n)
    }

    /// Swap the observation rows of `names` for `rows` in one transaction.
    /// Returns `(deleted, inserted)`.
    pub async fn replace_observations(&self, names: &[String], rows: &[Row]) -> Result<(u64, u64)> {
        let mut tx = self.pool.begin().await.context("begin replace tx failed")?;
        let deleted = self
            .delete_names_in_tx(&mut tx, Table::Observations, names)
            .await?;
        let inserted = self.insert_in_tx(&mut tx, Table::Observations, rows).await?;
        tx.commit().await.context("commit replace tx failed")?;
        debug!(entities = names.len(), deleted, inserted, "mirror replace observations");
        Ok((deleted, inserted))
    }

    pub async fn watermark(&self) -> Result<Option<NaiveDate>> {
        let (w,): (Option<NaiveDate>,) =
            sqlx::query_as("select watermark from mirror_meta where id = 1")
                .fetch_optional(&self.pool)
                .await
                .context("read watermark failed")?
                .ok_or_else(|| anyhow!("mirror_meta row missing; run ensure_schema"))?;
        Ok(w)
    }

    /// Move the watermark forward to `to` and copy it onto every composite
    /// row. An older `to` leaves the stored watermark unchanged. Returns the
    /// watermark in effect afterwards.
    pub async fn advance_watermark(&self, to: NaiveDate) -> Result<NaiveDate> {
        let mut tx = self.pool.begin().await.context("begin watermark tx failed")?;

        sqlx::query(
            r#"
            update mirror_meta
               set watermark = ?1
             where id = 1
               and (watermark is null or watermark < ?1)
            "#,
        )
        .bind(to)
        .execute(&mut *tx)
        .await
        .context("advance mirror_meta watermark failed")?;

        let (effective,): (Option<NaiveDate>,) =
            sqlx::query_as("select watermark from mirror_meta where id = 1")
                .fetch_one(&mut *tx)
                .await
                .context("re-read watermark failed")?;
        let effective = effective.ok_or_else(|| anyhow!("watermark still null after advance"))?;

        let sql = format!("update {} set last_write = ?", table_name(Table::Composite));
        sqlx::query(&sql)
            .bind(effective)
            .execute(&mut *tx)
            .await
            .context("copy watermark to composite rows failed")?;

        tx.commit().await.context("commit watermark tx failed")?;
        Ok(effective)
    }

    pub async fn status(&self) -> Result<MirrorStatus> {
        Ok(MirrorStatus {
            observations: self.count(Table::Observations).await?,
            composite: self.count(Table::Composite).await?,
            watermark: self.watermark().await?,
        })
    }
}
