use std::collections::HashMap;

use blake3::Hash;

use crate::dock::{DockLocation, PlacementDefault};
use crate::error::{DockError, Result};

/// One registered panel and its last resolved location.
#[derive(Debug, Clone)]
pub struct PanelRecord {
    pub name: String,
    pub default: PlacementDefault,
    pub min_extent: Option<i32>,
    pub location: Option<DockLocation>,
}

/// Registry of dockable panels in registration order.
///
/// Registration order matters: the placement solver sweeps defaults in the
/// order panels were declared. The registry also keeps a fingerprint of the
/// last synced arrangement so a re-resolve that lands on the identical
/// layout is detected without comparing every location.
#[derive(Debug, Default)]
pub struct PanelRegistry {
    panels: Vec<PanelRecord>,
    index: HashMap<String, usize>,
    arrangement_hash: Option<Hash>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Register a panel. Duplicate names are a configuration error.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        default: PlacementDefault,
        min_extent: Option<i32>,
    ) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(DockError::DuplicatePanel(name));
        }
        self.index.insert(name.clone(), self.panels.len());
        self.panels.push(PanelRecord {
            name,
            default,
            min_extent,
            location: None,
        });
        Ok(())
    }

    /// Placement defaults in registration order, as the solver consumes them.
    pub fn defaults(&self) -> Vec<(String, PlacementDefault)> {
        self.panels
            .iter()
            .map(|p| (p.name.clone(), p.default.clone()))
            .collect()
    }

    /// Declared minimum extents, keyed by panel name.
    pub fn minimums(&self) -> HashMap<String, i32> {
        self.panels
            .iter()
            .filter_map(|p| p.min_extent.map(|extent| (p.name.clone(), extent)))
            .collect()
    }

    pub fn location_of(&self, name: &str) -> Option<DockLocation> {
        self.index
            .get(name)
            .and_then(|&idx| self.panels[idx].location)
    }

    pub fn min_extent_of(&self, name: &str) -> Option<i32> {
        self.index
            .get(name)
            .and_then(|&idx| self.panels[idx].min_extent)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.panels.iter().map(|p| p.name.as_str())
    }

    /// Store a resolved arrangement, reporting whether it differs from the
    /// last one. The comparison runs over a blake3 fingerprint of the
    /// serialized arrangement.
    pub fn sync_arrangement(&mut self, arrangement: &[(String, DockLocation)]) -> bool {
        let hash = serde_json::to_vec(arrangement)
            .ok()
            .map(|bytes| blake3::hash(&bytes));
        if hash.is_some() && hash == self.arrangement_hash {
            return false;
        }
        self.arrangement_hash = hash;

        for record in &mut self.panels {
            record.location = None;
        }
        for (name, location) in arrangement {
            if let Some(&idx) = self.index.get(name) {
                self.panels[idx].location = Some(*location);
            }
        }
        true
    }
}
