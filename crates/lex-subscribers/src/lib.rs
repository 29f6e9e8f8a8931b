//! lex-subscribers
//!
//! Durable subscriber registry: one notification time-of-day per subscriber,
//! kept in a line-oriented file (`id-HH:MM` per line).
//!
//! The file is the only source of truth. Every operation reads it, and every
//! change rewrites it (temp file + rename) before returning, all under one
//! exclusive lock. Nothing is cached between calls.

mod format;
mod registry;
mod time_of_day;

pub use format::{parse_file, render_file, Line, Subscriber};
pub use registry::{SubscribeOutcome, SubscriberRegistry, UnsubscribeOutcome};
pub use time_of_day::TimeOfDay;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Time is not `HH:MM` with hour in [0,24) and minute in [0,60).
    #[error("invalid time format: {0:?} (expected HH:MM, 00:00-23:59)")]
    InvalidTimeFormat(String),
    /// Identifier cannot be stored on one line of the registry file.
    #[error("invalid subscriber id: {0:?}")]
    InvalidSubscriber(String),
    #[error("subscriber storage unavailable at {path:?}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identifiers are stored verbatim before the last `-` of a line, so they
/// may contain `-` (negative chat ids) but no whitespace or control chars.
pub fn validate_subscriber_id(id: &str) -> Result<(), RegistryError> {
    if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RegistryError::InvalidSubscriber(id.to_string()));
    }
    Ok(())
}
