//! Dock module orchestrator.
//!
//! Public placement types live in the private `core` module; the placement
//! solver and the restacking passes live in their own files. Everything is
//! re-exported from here.

mod core;
mod placement;
mod restack;

pub use core::{
    Area, DockLocation, ExtentAdjustment, MergeInstruction, PanelSnapshot, PlacementDefault,
    Relation,
};
pub use placement::resolve;
pub use restack::{enforce_minimums, restack};
