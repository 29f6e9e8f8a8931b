//! lex-archive
//!
//! Client side of the remote archive: a read-only, idempotent query primitive
//! returning tabular rows, plus a row-count primitive for the same selection.
//!
//! This crate does **not** write to the mirror; the runtime fetches rows and
//! hands them to lex-mirror.

pub mod adql;
mod decode;
mod tap;

pub use decode::{decode_count, decode_names, decode_rows};
pub use tap::{TapArchive, TapConfig};

use lex_schemas::{Row, Selection};
use thiserror::Error;

/// Errors an [`Archive`] implementation may return.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Network failure or timeout.
    #[error("transport error: {0}")]
    Transport(String),
    /// The archive answered with a non-success status.
    #[error("archive http error status={status}: {body}")]
    Http { status: u16, body: String },
    /// The response payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// The client cannot form a request (empty column set, bad base url, ...).
    #[error("config error: {0}")]
    Config(String),
}

impl ArchiveError {
    /// Transport failures and server-side statuses are worth another attempt;
    /// a 4xx or a payload we cannot read will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ArchiveError::Transport(_) => true,
            ArchiveError::Http { status, .. } => *status >= 500 || *status == 429,
            ArchiveError::Decode(_) | ArchiveError::Config(_) => false,
        }
    }
}

/// Remote source-of-truth contract.
///
/// Every method is read-only and may be retried freely. Row cells follow the
/// column order of the mirror's field catalog for `sel.table`.
#[async_trait::async_trait]
pub trait Archive: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Number of rows matching `sel`.
    async fn count(&self, sel: &Selection) -> Result<u64, ArchiveError>;

    /// Distinct entity names of the rows matching `sel`.
    async fn fetch_names(&self, sel: &Selection) -> Result<Vec<String>, ArchiveError>;

    /// Full rows matching `sel`.
    async fn fetch_rows(&self, sel: &Selection) -> Result<Vec<Row>, ArchiveError>;
}
