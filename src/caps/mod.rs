//! Capability module orchestrator.
//!
//! Downstream code imports the capability bitmask and the action enablement
//! engine from here while the implementation details live in the private
//! `core` and `mask` modules.

mod core;
mod mask;

pub use core::{ActionEngine, PartitionCensus};
pub use mask::{BitsDesc, CapMask};
