use std::collections::{BTreeMap, HashMap, HashSet};

use crate::dock::core::{Area, DockLocation, PlacementDefault, Relation};
use crate::error::{DockError, Result};

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    tab_group: usize,
}

/// Resolve declarative placement defaults into concrete dock locations.
///
/// Defaults are swept in declaration order. Explicit entries always resolve;
/// relative entries resolve once their sibling has a slot, so forward
/// references settle on a later sweep. Panel counts are small, which is why
/// an unbounded-pass sweep is used instead of a topological sort — but a
/// sweep that makes no progress means the remaining defaults reference each
/// other in a cycle, and that is reported instead of looping.
///
/// The call is all-or-nothing: any error returns before output is produced.
pub fn resolve(defaults: &[(String, PlacementDefault)]) -> Result<Vec<(String, DockLocation)>> {
    let mut names: HashSet<&str> = HashSet::new();
    for (name, _) in defaults {
        if !names.insert(name.as_str()) {
            return Err(DockError::DuplicatePanel(name.clone()));
        }
    }
    for (name, default) in defaults {
        if let PlacementDefault::Relative { sibling, .. } = default
            && !names.contains(sibling.as_str())
        {
            return Err(DockError::UnknownSibling {
                panel: name.clone(),
                sibling: sibling.clone(),
            });
        }
    }

    let mut arrangement: BTreeMap<Area, Vec<Slot>> = BTreeMap::new();
    let mut placed: HashMap<String, Area> = HashMap::new();
    let mut next_group = 0usize;
    let mut pending: Vec<&(String, PlacementDefault)> = defaults.iter().collect();

    while !pending.is_empty() {
        let before = pending.len();
        let mut unresolved = Vec::new();

        for entry in pending {
            let (name, default) = entry;
            match default {
                PlacementDefault::Explicit(area) => {
                    arrangement.entry(*area).or_default().push(Slot {
                        name: name.clone(),
                        tab_group: next_group,
                    });
                    next_group += 1;
                    placed.insert(name.clone(), *area);
                }
                PlacementDefault::Relative { sibling, relation } => {
                    let Some(area) = placed.get(sibling).copied() else {
                        unresolved.push(entry);
                        continue;
                    };
                    let slots = arrangement.entry(area).or_default();
                    let Some(index) = slots.iter().position(|s| s.name == *sibling) else {
                        unresolved.push(entry);
                        continue;
                    };
                    match relation {
                        Relation::SameTab => {
                            let tab_group = slots[index].tab_group;
                            slots.insert(
                                index + 1,
                                Slot {
                                    name: name.clone(),
                                    tab_group,
                                },
                            );
                        }
                        Relation::Before => {
                            slots.insert(
                                index,
                                Slot {
                                    name: name.clone(),
                                    tab_group: next_group,
                                },
                            );
                            next_group += 1;
                        }
                        Relation::After => {
                            slots.insert(
                                index + 1,
                                Slot {
                                    name: name.clone(),
                                    tab_group: next_group,
                                },
                            );
                            next_group += 1;
                        }
                    }
                    placed.insert(name.clone(), area);
                }
            }
        }

        if unresolved.len() == before {
            let stuck = unresolved.iter().map(|(name, _)| name.clone()).collect();
            return Err(DockError::CyclicPlacement(stuck));
        }
        pending = unresolved;
    }

    let mut resolved = Vec::with_capacity(defaults.len());
    for (area, slots) in &arrangement {
        for (ordinal, slot) in slots.iter().enumerate() {
            resolved.push((
                slot.name.clone(),
                DockLocation {
                    area: *area,
                    ordinal,
                    tab_group: slot.tab_group,
                },
            ));
        }
    }
    Ok(resolved)
}
