use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::caps::CapMask;
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::EngineMetrics;

/// Callback invoked with an action's name and its new enabled flag.
pub type ActionObserver = Box<dyn FnMut(&str, bool)>;

/// Callback invoked with the old and new capability state.
pub type StateObserver = Box<dyn FnMut(CapMask, CapMask)>;

#[derive(Debug, Clone, Copy)]
struct ActionRecord {
    mask: CapMask,
    enabled: bool,
}

/// Partition sizes, exposed for diagnostics and invariant checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionCensus {
    pub single_enabled: usize,
    pub single_disabled: usize,
    pub multi: usize,
}

/// Maps the capability state onto the enabled flag of every registered action.
///
/// Actions governed by a single capability bit vastly outnumber multi-bit
/// actions, so they are kept in two ordered partitions keyed by mask. A state
/// change then only touches the actions whose governing bit actually flipped:
/// the partitions are scanned by range lookup seeded at each changed bit.
/// Multi-bit actions live in a third partition and are re-evaluated by full
/// intersection test on every change, because any one of their bits can
/// independently satisfy or fail the mask.
pub struct ActionEngine {
    state: CapMask,
    actions: HashMap<String, ActionRecord>,
    single_enabled: BTreeSet<(CapMask, String)>,
    single_disabled: BTreeSet<(CapMask, String)>,
    multi: BTreeSet<String>,
    action_observers: Vec<ActionObserver>,
    state_observers: Vec<StateObserver>,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<EngineMetrics>>>,
}

impl Default for ActionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionEngine {
    pub fn new() -> Self {
        Self {
            state: CapMask::EMPTY,
            actions: HashMap::new(),
            single_enabled: BTreeSet::new(),
            single_disabled: BTreeSet::new(),
            multi: BTreeSet::new(),
            action_observers: Vec::new(),
            state_observers: Vec::new(),
            logger: None,
            metrics: None,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<EngineMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current capability state.
    pub fn state(&self) -> CapMask {
        self.state
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Register a per-action observer. Fired once per affected action, before
    /// the aggregate state observers.
    pub fn observe_actions<F>(&mut self, observer: F)
    where
        F: FnMut(&str, bool) + 'static,
    {
        self.action_observers.push(Box::new(observer));
    }

    /// Register an aggregate observer fired once per effective state change.
    pub fn observe_state<F>(&mut self, observer: F)
    where
        F: FnMut(CapMask, CapMask) + 'static,
    {
        self.state_observers.push(Box::new(observer));
    }

    /// Register an action or replace its governing mask.
    ///
    /// The old partition entry is removed before the new one is inserted, so
    /// the action never appears in two partitions. The enabled flag is
    /// recomputed against the current state immediately.
    pub fn set_mask(&mut self, name: &str, mask: CapMask) {
        let previous = self.actions.get(name).map(|r| (r.mask, r.enabled));
        if let Some((old_mask, old_enabled)) = previous {
            self.remove_partition_entry(name, old_mask, old_enabled);
        }

        let enabled = self.state.intersects(mask);
        self.insert_partition_entry(name, mask, enabled);
        self.actions
            .insert(name.to_string(), ActionRecord { mask, enabled });

        if previous.is_some_and(|(_, was)| was != enabled) {
            self.notify_actions(&[(name.to_string(), enabled)]);
        }
    }

    /// Governing mask of an action; `EMPTY` for unknown names.
    pub fn mask_of(&self, name: &str) -> CapMask {
        self.actions
            .get(name)
            .map(|r| r.mask)
            .unwrap_or(CapMask::EMPTY)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.actions.get(name).map(|r| r.enabled).unwrap_or(false)
    }

    /// Forget an action entirely. Unknown names are a no-op.
    pub fn remove_action(&mut self, name: &str) {
        if let Some(record) = self.actions.remove(name) {
            self.remove_partition_entry(name, record.mask, record.enabled);
        }
    }

    /// Replace the capability state wholesale.
    ///
    /// Setting the state to its current value short-circuits and fires no
    /// notifications. Otherwise single-bit partitions are repaired by bit
    /// scans, the multi-bit partition is re-evaluated in full, and observers
    /// fire per affected action followed by one aggregate notification.
    pub fn set_state(&mut self, new_state: CapMask) {
        if new_state == self.state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;

        let mut flips: Vec<(String, bool)> = Vec::new();

        // Bits that went away evict enabled single-bit actions.
        let removed = old_state & !new_state;
        for bit in removed.iter_bits_desc() {
            let key = CapMask::bit(bit);
            for name in Self::drain_single(&mut self.single_enabled, key) {
                if let Some(record) = self.actions.get_mut(&name) {
                    record.enabled = false;
                }
                self.single_disabled.insert((key, name.clone()));
                flips.push((name, false));
            }
        }

        // Bits that appeared promote disabled single-bit actions.
        let added = new_state & !old_state;
        for bit in added.iter_bits_desc() {
            let key = CapMask::bit(bit);
            for name in Self::drain_single(&mut self.single_disabled, key) {
                if let Some(record) = self.actions.get_mut(&name) {
                    record.enabled = true;
                }
                self.single_enabled.insert((key, name.clone()));
                flips.push((name, true));
            }
        }

        // Multi-bit actions get the full intersection test, no shortcut.
        for name in self.multi.iter().cloned().collect::<Vec<_>>() {
            if let Some(record) = self.actions.get_mut(&name) {
                let enabled = new_state.intersects(record.mask);
                if enabled != record.enabled {
                    record.enabled = enabled;
                    flips.push((name, enabled));
                }
            }
        }

        self.notify_actions(&flips);
        for observer in &mut self.state_observers {
            observer(old_state, new_state);
        }

        if let Some(metrics) = self.metrics.as_ref()
            && let Ok(mut guard) = metrics.lock()
        {
            guard.record_state_change(flips.len());
        }

        if let Some(logger) = self.logger.as_ref() {
            let event = event_with_fields(
                LogLevel::Info,
                "berth::caps",
                "capability_state_changed",
                [
                    json_kv("old_state", json!(format!("{old_state}"))),
                    json_kv("new_state", json!(format!("{new_state}"))),
                    json_kv("flipped_actions", json!(flips.len())),
                ],
            );
            let _ = logger.log_event(event);
        }
    }

    pub fn census(&self) -> PartitionCensus {
        PartitionCensus {
            single_enabled: self.single_enabled.len(),
            single_disabled: self.single_disabled.len(),
            multi: self.multi.len(),
        }
    }

    /// Remove and return every entry in `partition` keyed exactly at the
    /// single-bit mask `key`. Entries sort contiguously, so this is a range
    /// scan seeded at the key rather than a walk over the whole partition.
    fn drain_single(partition: &mut BTreeSet<(CapMask, String)>, key: CapMask) -> Vec<String> {
        let names: Vec<String> = partition
            .range((key, String::new())..)
            .take_while(|(mask, _)| mask.intersects(key))
            .map(|(_, name)| name.clone())
            .collect();
        for name in &names {
            partition.remove(&(key, name.clone()));
        }
        names
    }

    fn insert_partition_entry(&mut self, name: &str, mask: CapMask, enabled: bool) {
        if mask.population_count() >= 2 {
            self.multi.insert(name.to_string());
        } else if enabled {
            self.single_enabled.insert((mask, name.to_string()));
        } else {
            // Empty masks land here too: they intersect nothing, and no
            // single-bit scan key can ever reach them.
            self.single_disabled.insert((mask, name.to_string()));
        }
    }

    fn remove_partition_entry(&mut self, name: &str, mask: CapMask, enabled: bool) {
        if mask.population_count() >= 2 {
            self.multi.remove(name);
        } else if enabled {
            self.single_enabled.remove(&(mask, name.to_string()));
        } else {
            self.single_disabled.remove(&(mask, name.to_string()));
        }
    }

    fn notify_actions(&mut self, flips: &[(String, bool)]) {
        for (name, enabled) in flips {
            for observer in &mut self.action_observers {
                observer(name, *enabled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn mask(bits: u128) -> CapMask {
        CapMask::from_bits(bits)
    }

    #[test]
    fn enabled_tracks_state_intersection() {
        let mut engine = ActionEngine::new();
        engine.set_mask("copy", mask(0b001));
        engine.set_mask("paste", mask(0b110));
        assert!(!engine.is_enabled("copy"));
        assert!(!engine.is_enabled("paste"));

        engine.set_state(mask(0b011));
        assert!(engine.is_enabled("copy"));
        assert!(engine.is_enabled("paste"));

        engine.set_state(mask(0b001));
        assert!(engine.is_enabled("copy"));
        assert!(!engine.is_enabled("paste"));
    }

    #[test]
    fn single_and_multi_bit_scenario() {
        let mut engine = ActionEngine::new();
        engine.set_mask("a", mask(0b001));
        engine.set_mask("b", mask(0b010));
        engine.set_mask("c", mask(0b011));

        engine.set_state(mask(0b001));
        assert!(engine.is_enabled("a"));
        assert!(!engine.is_enabled("b"));
        assert!(engine.is_enabled("c"));

        engine.set_state(mask(0b011));
        assert!(engine.is_enabled("a"));
        assert!(engine.is_enabled("b"));
        assert!(engine.is_enabled("c"));
    }

    #[test]
    fn set_state_is_idempotent() {
        let fired = Rc::new(RefCell::new(0usize));
        let mut engine = ActionEngine::new();
        engine.set_mask("a", mask(0b1));

        let per_action = Rc::clone(&fired);
        engine.observe_actions(move |_, _| *per_action.borrow_mut() += 1);
        let aggregate = Rc::clone(&fired);
        engine.observe_state(move |_, _| *aggregate.borrow_mut() += 1);

        engine.set_state(mask(0b1));
        assert_eq!(*fired.borrow(), 2);

        engine.set_state(mask(0b1));
        assert_eq!(*fired.borrow(), 2);
    }

    #[test]
    fn per_action_notifications_fire_before_aggregate() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut engine = ActionEngine::new();
        engine.set_mask("a", mask(0b1));

        let actions = Rc::clone(&order);
        engine.observe_actions(move |name, enabled| {
            actions.borrow_mut().push(format!("action:{name}:{enabled}"));
        });
        let states = Rc::clone(&order);
        engine.observe_state(move |_, _| states.borrow_mut().push("aggregate".to_string()));

        engine.set_state(mask(0b1));
        assert_eq!(
            order.borrow().as_slice(),
            ["action:a:true".to_string(), "aggregate".to_string()]
        );
    }

    #[test]
    fn partition_census_matches_population_counts() {
        let mut engine = ActionEngine::new();
        engine.set_mask("one", mask(0b001));
        engine.set_mask("two", mask(0b010));
        engine.set_mask("both", mask(0b011));
        engine.set_mask("none", CapMask::EMPTY);

        engine.set_state(mask(0b001));
        let census = engine.census();
        assert_eq!(census.single_enabled, 1);
        assert_eq!(census.single_disabled, 2);
        assert_eq!(census.multi, 1);
        assert_eq!(
            census.single_enabled + census.single_disabled + census.multi,
            engine.len()
        );
    }

    #[test]
    fn set_mask_repartitions_atomically() {
        let mut engine = ActionEngine::new();
        engine.set_state(mask(0b001));
        engine.set_mask("a", mask(0b001));
        assert_eq!(engine.census().single_enabled, 1);

        engine.set_mask("a", mask(0b110));
        let census = engine.census();
        assert_eq!(census.single_enabled, 0);
        assert_eq!(census.multi, 1);
        assert!(!engine.is_enabled("a"));
        assert_eq!(engine.mask_of("a"), mask(0b110));
    }

    #[test]
    fn set_mask_notifies_when_flag_flips() {
        let flips = Rc::new(RefCell::new(Vec::new()));
        let mut engine = ActionEngine::new();
        engine.set_state(mask(0b010));
        engine.set_mask("a", mask(0b001));

        let sink = Rc::clone(&flips);
        engine.observe_actions(move |name, enabled| sink.borrow_mut().push((name.to_string(), enabled)));

        engine.set_mask("a", mask(0b010));
        assert_eq!(flips.borrow().as_slice(), [("a".to_string(), true)]);
    }

    #[test]
    fn unknown_action_queries_are_benign() {
        let mut engine = ActionEngine::new();
        assert_eq!(engine.mask_of("ghost"), CapMask::EMPTY);
        assert!(!engine.is_enabled("ghost"));
        engine.remove_action("ghost");
        assert!(engine.is_empty());
    }

    #[test]
    fn removed_action_never_notifies_again() {
        let fired = Rc::new(RefCell::new(0usize));
        let mut engine = ActionEngine::new();
        engine.set_mask("a", mask(0b1));
        engine.remove_action("a");

        let sink = Rc::clone(&fired);
        engine.observe_actions(move |_, _| *sink.borrow_mut() += 1);
        engine.set_state(mask(0b1));
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn empty_mask_stays_disabled_forever() {
        let mut engine = ActionEngine::new();
        engine.set_mask("inert", CapMask::EMPTY);
        engine.set_state(!CapMask::EMPTY);
        assert!(!engine.is_enabled("inert"));
        assert_eq!(engine.census().single_disabled, 1);
    }

    #[test]
    fn state_changes_are_logged_and_counted() {
        use crate::logging::{Logger, MemorySink};
        use std::sync::Arc;

        let sink = Arc::new(MemorySink::new());
        let metrics = Arc::new(std::sync::Mutex::new(EngineMetrics::new()));
        let mut engine = ActionEngine::new()
            .with_logger(Logger::new(Arc::clone(&sink)))
            .with_metrics(Arc::clone(&metrics));
        engine.set_mask("a", mask(0b1));

        engine.set_state(mask(0b1));
        engine.set_state(mask(0b1));

        let events = sink.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "capability_state_changed");

        let snapshot = metrics
            .lock()
            .unwrap()
            .snapshot(std::time::Duration::ZERO);
        assert_eq!(snapshot.state_changes, 1);
        assert_eq!(snapshot.action_flips, 1);
    }

    #[test]
    fn many_actions_on_shared_bit_flip_together() {
        let mut engine = ActionEngine::new();
        for idx in 0..32 {
            engine.set_mask(&format!("action{idx}"), mask(0b100));
        }
        engine.set_mask("other", mask(0b001));

        engine.set_state(mask(0b100));
        for idx in 0..32 {
            assert!(engine.is_enabled(&format!("action{idx}")));
        }
        assert!(!engine.is_enabled("other"));

        engine.set_state(mask(0b001));
        for idx in 0..32 {
            assert!(!engine.is_enabled(&format!("action{idx}")));
        }
        assert!(engine.is_enabled("other"));
    }
}
