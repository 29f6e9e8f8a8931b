//! lex-gate
//!
//! Availability gate between reconciliation and mirror readers.
//!
//! Architectural decisions:
//! - One writer (the reconciliation cycle), any number of readers
//! - The state flag is read with acquire ordering, never cached
//! - A reader holds a [`ServingPermit`] for the whole gated read, so a cycle
//!   cannot start writing underneath it
//! - A cycle holds a [`CycleGuard`]; dropping it restores AWAKE on every exit
//!   path (success, error, panic, cancellation)
//! - Gated operations never wait: SLEEPING means deferred, immediately

mod gate;
mod gated;
mod state;

pub use gate::{AvailabilityGate, CycleGuard, ServingPermit};
pub use gated::Gated;
pub use state::Availability;
