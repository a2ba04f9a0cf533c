use std::time::Duration;

use serde_json::json;

use crate::logging::{LogEvent, LogFields, LogLevel};

/// Saturating counters for the engine's observable work.
#[derive(Debug, Default, Clone)]
pub struct EngineMetrics {
    state_changes: u64,
    action_flips: u64,
    resolves: u64,
    settle_passes: u64,
    merges: u64,
    extent_adjustments: u64,
    coalesced_requests: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_state_change(&mut self, flipped: usize) {
        self.state_changes = self.state_changes.saturating_add(1);
        self.action_flips = self.action_flips.saturating_add(flipped as u64);
    }

    pub fn record_resolve(&mut self) {
        self.resolves = self.resolves.saturating_add(1);
    }

    pub fn record_settle_pass(&mut self, merges: usize, adjustments: usize) {
        self.settle_passes = self.settle_passes.saturating_add(1);
        self.merges = self.merges.saturating_add(merges as u64);
        self.extent_adjustments = self.extent_adjustments.saturating_add(adjustments as u64);
    }

    pub fn record_coalesced_request(&mut self) {
        self.coalesced_requests = self.coalesced_requests.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            state_changes: self.state_changes,
            action_flips: self.action_flips,
            resolves: self.resolves,
            settle_passes: self.settle_passes,
            merges: self.merges,
            extent_adjustments: self.extent_adjustments,
            coalesced_requests: self.coalesced_requests,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub state_changes: u64,
    pub action_flips: u64,
    pub resolves: u64,
    pub settle_passes: u64,
    pub merges: u64,
    pub extent_adjustments: u64,
    pub coalesced_requests: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("state_changes".to_string(), json!(self.state_changes));
        map.insert("action_flips".to_string(), json!(self.action_flips));
        map.insert("resolves".to_string(), json!(self.resolves));
        map.insert("settle_passes".to_string(), json!(self.settle_passes));
        map.insert("merges".to_string(), json!(self.merges));
        map.insert(
            "extent_adjustments".to_string(),
            json!(self.extent_adjustments),
        );
        map.insert(
            "coalesced_requests".to_string(),
            json!(self.coalesced_requests),
        );
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "engine_metrics", self.as_fields())
    }
}
