use std::time::Duration;

use lex_schemas::{FieldCatalog, Row, Selection, Table};
use tracing::{debug, warn};

use crate::adql::{self, QueryShape};
use crate::decode::{decode_count, decode_names, decode_rows};
use crate::{Archive, ArchiveError};

/// Connection and naming settings of a TAP endpoint.
#[derive(Debug, Clone)]
pub struct TapConfig {
    pub base_url: String,
    pub sync_path: String,
    pub observation_table: String,
    pub composite_table: String,
    pub name_column: String,
    pub release_column: String,
    pub update_column: String,
    pub names_per_query: usize,
    pub max_attempts: u32,
    pub timeout: Duration,
    /// Delay before attempt `n + 1` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

/// TAP synchronous-query client (`GET {base}{sync_path}?query=..&format=csv`).
#[derive(Debug, Clone)]
pub struct TapArchive {
    cfg: TapConfig,
    catalog: FieldCatalog,
    http: reqwest::Client,
}

impl TapArchive {
    pub fn new(cfg: TapConfig, catalog: FieldCatalog) -> Result<Self, ArchiveError> {
        for t in [Table::Observations, Table::Composite] {
            if catalog.columns(t).is_empty() {
                return Err(ArchiveError::Config(format!("no catalog columns for {t}")));
            }
        }
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ArchiveError::Config(format!("http client build failed: {e}")))?;
        Ok(Self { cfg, catalog, http })
    }

    fn sync_url(&self) -> String {
        format!(
            "{}/{}",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.sync_path.trim_start_matches('/')
        )
    }

    fn shape(&self, table: Table) -> QueryShape {
        let remote = match table {
            Table::Observations => &self.cfg.observation_table,
            Table::Composite => &self.cfg.composite_table,
        };
        QueryShape {
            table: remote.clone(),
            columns: self
                .catalog
                .columns(table)
                .into_iter()
                .map(str::to_string)
                .collect(),
            name_column: self.cfg.name_column.clone(),
            release_column: self.cfg.release_column.clone(),
            update_column: self.cfg.update_column.clone(),
            names_per_query: self.cfg.names_per_query,
        }
    }

    /// One query, retried while the failure is transient.
    async fn run(&self, adql: &str) -> Result<String, ArchiveError> {
        let attempts = self.cfg.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.run_once(adql).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(attempt, max_attempts = attempts, error = %e, "archive query failed; retrying");
                    tokio::time::sleep(self.cfg.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_once(&self, adql: &str) -> Result<String, ArchiveError> {
        debug!(query = adql, "archive query");
        let resp = self
            .http
            .get(self.sync_url())
            .query(&[("query", adql), ("format", "csv")])
            .send()
            .await
            .map_err(|e| ArchiveError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ArchiveError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ArchiveError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl Archive for TapArchive {
    fn source_name(&self) -> &'static str {
        "tap"
    }

    async fn count(&self, sel: &Selection) -> Result<u64, ArchiveError> {
        let mut total = 0;
        for q in adql::count_queries(&self.shape(sel.table), sel) {
            total += decode_count(&self.run(&q).await?)?;
        }
        Ok(total)
    }

    async fn fetch_names(&self, sel: &Selection) -> Result<Vec<String>, ArchiveError> {
        let mut out = Vec::new();
        for q in adql::names_queries(&self.shape(sel.table), sel) {
            out.extend(decode_names(&self.run(&q).await?)?);
        }
        Ok(out)
    }

    async fn fetch_rows(&self, sel: &Selection) -> Result<Vec<Row>, ArchiveError> {
        let shape = self.shape(sel.table);
        let width = shape.columns.len();
        let mut out = Vec::new();
        for q in adql::rows_queries(&shape, sel) {
            out.extend(decode_rows(&self.run(&q).await?, width)?);
        }
        Ok(out)
    }
}
