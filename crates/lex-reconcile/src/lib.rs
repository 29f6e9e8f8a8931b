//! lex-reconcile
//!
//! Planning half of a mirror reconciliation cycle:
//! - Empty local table => full transfer
//! - Composite counts differ => name-set diff (missing inserted, stale deleted)
//! - Composite counts equal => nothing to do (see [`plan_composite`])
//! - Observations => full transfer when empty, else changed-since-watermark
//! - Watermark only moves forward, and only after a cycle that changed rows
//!
//! Deterministic, pure logic. No IO. The runtime executes the plans.

mod engine;
mod types;
pub mod watermark;

pub use engine::{diff_names, plan_composite, plan_observations};
pub use types::*;
pub use watermark::{Watermark, WatermarkAdvance};
