use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use crate::dock::{
    Area, DockLocation, PanelSnapshot, PlacementDefault, enforce_minimums, resolve, restack,
};
use crate::error::Result;
use crate::geometry::Rect;
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::EngineMetrics;
use crate::registry::PanelRegistry;

/// Host window collaborator.
///
/// Reads expose the host's current view of each panel; writes are
/// fire-and-forget placement instructions whose effect only becomes
/// observable through later reads. The runtime tolerates reads being stale
/// by one event-loop turn.
pub trait GeometryHost {
    fn window_bounds(&self) -> Rect;
    fn panel_rect(&self, panel: &str) -> Option<Rect>;
    fn panel_area(&self, panel: &str) -> Option<Area>;
    fn is_floating(&self, _panel: &str) -> bool {
        false
    }
    fn is_visible(&self, _panel: &str) -> bool {
        true
    }
    fn attach(&mut self, panel: &str, location: &DockLocation);
    fn tabify(&mut self, merged: &str, survivor: &str);
    fn adjust_extent(&mut self, panel: &str, area: Area, extent: i32);
}

/// Deferred callback collaborator.
///
/// `schedule_once` arms a one-shot timer that eventually re-enters the
/// runtime via `run_settle_pass`. The runtime additionally guards with its
/// own pending flag, so implementations may treat every call as a fresh arm.
pub trait DeferredScheduler {
    fn schedule_once(&mut self, delay: Duration);
}

impl<S: DeferredScheduler> DeferredScheduler for Rc<RefCell<S>> {
    fn schedule_once(&mut self, delay: Duration) {
        self.borrow_mut().schedule_once(delay);
    }
}

/// Configuration knobs for the docking runtime.
#[derive(Clone)]
pub struct DockConfig {
    /// Delay before a settle pass runs, letting the host re-layout first.
    pub settle_delay: Duration,
    /// Cap on consecutive work-producing settle passes. Host geometry can
    /// report transient values during animation; the cap keeps a
    /// misbehaving host from turning the repair loop into a busy loop.
    pub max_settle_passes: u32,
    /// Optional structured logger used by the runtime.
    pub logger: Option<Logger>,
    /// Metrics accumulator used for periodic snapshots.
    pub metrics: Option<Arc<Mutex<EngineMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(50),
            max_settle_passes: 16,
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "berth::runtime.metrics".to_string(),
        }
    }
}

impl DockConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(EngineMetrics::new())));
        }
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<EngineMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Owns panel registration and drives placement against the host window.
///
/// All operations run on the host's event-loop thread. The settle loop never
/// blocks: geometry changes coalesce into at most one pending deferred pass,
/// and each pass re-reads current geometry when it eventually runs.
pub struct DockRuntime<S: DeferredScheduler> {
    registry: PanelRegistry,
    scheduler: S,
    config: DockConfig,
    settle_pending: bool,
    pass_streak: u32,
    start_instant: Instant,
    last_metrics_emit: Option<Instant>,
}

impl<S: DeferredScheduler> DockRuntime<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            registry: PanelRegistry::new(),
            scheduler,
            config: DockConfig::default(),
            settle_pending: false,
            pass_streak: 0,
            start_instant: Instant::now(),
            last_metrics_emit: None,
        }
    }

    pub fn config_mut(&mut self) -> &mut DockConfig {
        &mut self.config
    }

    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    /// True when a deferred settle pass is armed but has not yet run.
    pub fn settle_pending(&self) -> bool {
        self.settle_pending
    }

    /// Register a panel with its declarative placement default. Duplicate
    /// names are a configuration error.
    pub fn register_panel(
        &mut self,
        name: impl Into<String>,
        default: PlacementDefault,
        min_extent: Option<i32>,
    ) -> Result<()> {
        self.registry.register(name, default, min_extent)
    }

    /// Resolve every registered default and attach the panels through the
    /// host. Re-layout is always a full solver run; when it lands on the
    /// arrangement already applied, no attach instructions are issued.
    pub fn apply_default_layout(
        &mut self,
        host: &mut dyn GeometryHost,
    ) -> Result<Vec<(String, DockLocation)>> {
        let arrangement = resolve(&self.registry.defaults())?;
        if let Some(metrics) = self.config.metrics.as_ref()
            && let Ok(mut guard) = metrics.lock()
        {
            guard.record_resolve();
        }

        if self.registry.sync_arrangement(&arrangement) {
            for (name, location) in &arrangement {
                host.attach(name, location);
            }
            self.log_runtime_event(
                LogLevel::Info,
                "layout_applied",
                [json_kv("panels", json!(arrangement.len()))],
            );
            self.pass_streak = 0;
            self.request_settle();
        }
        Ok(arrangement)
    }

    /// Coalescing entry point for resize/redock/tab-activation events.
    pub fn notify_geometry_changed(&mut self) {
        self.pass_streak = 0;
        self.request_settle();
    }

    /// Run one settle pass against current host geometry.
    ///
    /// Invoked by the host when the deferred timer fires. Merges are applied
    /// first; only a merge-free pass runs minimum-extent enforcement. Either
    /// kind of issued work re-arms the timer so the next pass can observe
    /// the host's reaction, subject to the consecutive-pass cap.
    pub fn run_settle_pass(&mut self, host: &mut dyn GeometryHost) {
        self.settle_pending = false;

        let snapshots = self.collect_snapshots(host);
        let window = host.window_bounds();

        let merges = restack(&snapshots, window);
        if !merges.is_empty() {
            for merge in &merges {
                host.tabify(&merge.merged, &merge.survivor);
            }
            self.record_settle_metric(merges.len(), 0);
            self.log_runtime_event(
                LogLevel::Debug,
                "restack_merged",
                [json_kv("merges", json!(merges.len()))],
            );
            self.continue_settling();
            return;
        }

        let adjustments = enforce_minimums(&snapshots, &self.registry.minimums());
        if !adjustments.is_empty() {
            for adjustment in &adjustments {
                host.adjust_extent(&adjustment.panel, adjustment.area, adjustment.extent);
            }
            self.record_settle_metric(0, adjustments.len());
            self.log_runtime_event(
                LogLevel::Debug,
                "minimum_extents_enforced",
                [json_kv("adjustments", json!(adjustments.len()))],
            );
            self.continue_settling();
            return;
        }

        self.record_settle_metric(0, 0);
        self.pass_streak = 0;
        let size = window.size();
        self.log_runtime_event(
            LogLevel::Debug,
            "geometry_settled",
            [
                json_kv("width", json!(size.width)),
                json_kv("height", json!(size.height)),
            ],
        );
        self.maybe_emit_metrics();
    }

    fn collect_snapshots(&self, host: &dyn GeometryHost) -> Vec<PanelSnapshot> {
        let mut snapshots = Vec::with_capacity(self.registry.len());
        for name in self.registry.names() {
            let Some(rect) = host.panel_rect(name) else {
                continue;
            };
            // Prefer the host's live area; fall back to the resolved one.
            let area = host
                .panel_area(name)
                .or_else(|| self.registry.location_of(name).map(|l| l.area));
            let Some(area) = area else {
                continue;
            };
            snapshots.push(PanelSnapshot {
                name: name.to_string(),
                area,
                rect,
                floating: host.is_floating(name),
                visible: host.is_visible(name),
            });
        }
        snapshots
    }

    fn request_settle(&mut self) {
        if self.settle_pending {
            if let Some(metrics) = self.config.metrics.as_ref()
                && let Ok(mut guard) = metrics.lock()
            {
                guard.record_coalesced_request();
            }
            return;
        }
        self.settle_pending = true;
        self.scheduler.schedule_once(self.config.settle_delay);
    }

    fn continue_settling(&mut self) {
        self.pass_streak = self.pass_streak.saturating_add(1);
        if self.pass_streak >= self.config.max_settle_passes {
            self.log_runtime_event(
                LogLevel::Warn,
                "settle_pass_cap_reached",
                [json_kv("passes", json!(self.pass_streak))],
            );
            return;
        }
        self.request_settle();
    }

    fn record_settle_metric(&mut self, merges: usize, adjustments: usize) {
        if let Some(metrics) = self.config.metrics.as_ref()
            && let Ok(mut guard) = metrics.lock()
        {
            guard.record_settle_pass(merges, adjustments);
        }
    }

    fn maybe_emit_metrics(&mut self) {
        if self.config.metrics_interval == Duration::from_millis(0) {
            return;
        }

        let now = Instant::now();
        match self.last_metrics_emit {
            Some(last) if now.duration_since(last) < self.config.metrics_interval => {
                return;
            }
            _ => {
                self.last_metrics_emit = Some(now);
            }
        }

        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
            && let Ok(guard) = metrics.lock()
        {
            let uptime = now.duration_since(self.start_instant);
            let event = guard
                .snapshot(uptime)
                .to_log_event(self.config.metrics_target.as_str());
            let _ = logger.log_event(event);
        }
    }

    fn log_runtime_event<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, "berth::runtime", message, fields);
            let _ = logger.log_event(event);
        }
    }
}
