use lex_archive::ArchiveError;
use lex_subscribers::RegistryError;
use thiserror::Error;

/// Why a reconciliation cycle aborted. The watermark is untouched in every
/// case and the next scheduled cycle starts over.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote archive unavailable: {0}")]
    RemoteUnavailable(#[from] ArchiveError),
    #[error("mirror storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),
    /// An invariant the cycle relies on does not hold. Unreachable unless
    /// the mirror was edited out from under the engine.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

impl SyncError {
    pub fn storage(e: anyhow::Error) -> Self {
        SyncError::StorageUnavailable(e)
    }
}

/// Caller-facing failure. Display strings are what a caller may see; the
/// underlying detail is logged where the error is produced, never carried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The gate is SLEEPING. Same answer for every gated operation.
    #[error("the archive is currently synchronizing, try again in a few minutes")]
    Synchronizing,
    #[error("{0}")]
    InvalidInput(String),
    #[error("something went wrong, try again later")]
    StorageUnavailable,
    #[error("something went wrong, try again later")]
    RemoteUnavailable,
}

impl From<RegistryError> for ServiceError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::InvalidTimeFormat(_) | RegistryError::InvalidSubscriber(_) => {
                ServiceError::InvalidInput(e.to_string())
            }
            RegistryError::StorageUnavailable { .. } => {
                tracing::error!(error = %e, "subscriber storage failure");
                ServiceError::StorageUnavailable
            }
        }
    }
}
