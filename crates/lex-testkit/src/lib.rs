//! lex-testkit
//!
//! In-process fakes for the collaborators of lex-runtime, plus fixture
//! helpers. Scenario tests that span several crates live in `tests/`.
//!
//! - [`InMemoryArchive`]: remote archive with a per-row change date
//! - [`FlakyArchive`]: wraps an archive, fails selected calls on demand and
//!   records the gate state each call saw
//! - [`RecordingNotifier`]: records deliveries, fails chosen subscribers
//! - [`StaticContentSource`]: content source returning a fixed list

mod archive;
mod fixtures;
mod notify;

pub use archive::{ArchiveCall, FailOn, FlakyArchive, InMemoryArchive};
pub use fixtures::{
    composite_row, composite_row_at, fixture_catalog, memory_mirror, observation_row, CATALOG,
    NAME_COLUMN,
};
pub use notify::{RecordingNotifier, StaticContentSource};
