//! Berth: capability-gated action enablement and dock panel placement.
//!
//! The crate is an in-process engine with two cooperating halves. The
//! `caps` module maps a process-wide capability bitmask onto the enabled
//! flag of a dynamically registered action set. The `dock` and `runtime`
//! modules compute where dockable panels sit around a central window and
//! keep that arrangement repaired after resizes by merging overlapping
//! panels into tab groups. Rendering, input, and persistence belong to the
//! host; the engine only decides placement and permission.

pub mod caps;
pub mod dock;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod runtime;

pub use caps::{ActionEngine, CapMask, PartitionCensus};
pub use dock::{
    Area, DockLocation, ExtentAdjustment, MergeInstruction, PanelSnapshot, PlacementDefault,
    Relation, enforce_minimums, resolve, restack,
};
pub use error::{DockError, Result};
pub use geometry::{Rect, Size};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink, event_with_fields, json_kv,
};
pub use metrics::{EngineMetrics, MetricSnapshot};
pub use registry::{PanelRecord, PanelRegistry};
pub use runtime::{DeferredScheduler, DockConfig, DockRuntime, GeometryHost};
