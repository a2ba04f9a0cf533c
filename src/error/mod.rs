//! Error module orchestrator.
//!
//! The crate-wide error enum and `Result` alias live in the private `types`
//! module; everything downstream imports them from here.

mod types;

pub use types::{DockError, Result};
