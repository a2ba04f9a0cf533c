use std::collections::{HashMap, HashSet};

use crate::dock::core::{Area, ExtentAdjustment, MergeInstruction, PanelSnapshot};
use crate::geometry::Rect;

/// One restacking pass over host-reported geometry.
///
/// Visible docked panels are grouped by area and walked in leading-edge
/// order. A panel overlapping the current survivor is merged into it; a last
/// panel spilling past the window bound is merged into the preceding
/// survivor. Each panel appears in at most one instruction per pass, so the
/// caller can apply all instructions before asking for fresh geometry.
///
/// The pass is pure: convergence is the caller's loop (each merge strictly
/// reduces the number of independent groups in an area, so repeated passes
/// reach a fixed point once host geometry stops shifting).
pub fn restack(snapshots: &[PanelSnapshot], window: Rect) -> Vec<MergeInstruction> {
    let mut merges = Vec::new();

    for area in Area::ALL {
        let mut group: Vec<&PanelSnapshot> = snapshots
            .iter()
            .filter(|s| s.area == area && s.visible && !s.floating)
            .collect();
        if group.len() < 2 {
            continue;
        }
        group.sort_by_key(|s| s.leading_edge());

        let window_bound = if area.is_horizontal() {
            window.right()
        } else {
            window.bottom()
        };

        let mut merged: HashSet<&str> = HashSet::new();
        let mut survivor = group[0];
        let mut prior_survivor: Option<&PanelSnapshot> = None;

        for &candidate in &group[1..] {
            if candidate.rect.intersects(&survivor.rect) {
                merges.push(MergeInstruction {
                    survivor: survivor.name.clone(),
                    merged: candidate.name.clone(),
                    area,
                });
                merged.insert(candidate.name.as_str());
            } else {
                prior_survivor = Some(survivor);
                survivor = candidate;
            }
        }

        // A panel that survived overlap checks can still hang past the
        // window edge; fold it into the group before it.
        let last = group[group.len() - 1];
        if !merged.contains(last.name.as_str())
            && last.trailing_edge() > window_bound
            && let Some(prior) = prior_survivor
        {
            merges.push(MergeInstruction {
                survivor: prior.name.clone(),
                merged: last.name.clone(),
                area,
            });
        }
    }

    merges
}

/// Minimum-extent pass, run once geometry has settled.
///
/// Per area this is a max-reduce over the declared minimum extents; every
/// docked panel currently below that maximum gets one adjustment request.
pub fn enforce_minimums(
    snapshots: &[PanelSnapshot],
    minimums: &HashMap<String, i32>,
) -> Vec<ExtentAdjustment> {
    let mut adjustments = Vec::new();

    for area in Area::ALL {
        let group: Vec<&PanelSnapshot> = snapshots
            .iter()
            .filter(|s| s.area == area && s.visible && !s.floating)
            .collect();

        let Some(required) = group
            .iter()
            .filter_map(|s| minimums.get(&s.name).copied())
            .max()
        else {
            continue;
        };

        for snapshot in group {
            if snapshot.extent() < required {
                adjustments.push(ExtentAdjustment {
                    panel: snapshot.name.clone(),
                    area,
                    extent: required,
                });
            }
        }
    }

    adjustments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Rect {
        Rect::new(0, 0, 800, 600)
    }

    fn left_panel(name: &str, y: i32, height: i32) -> PanelSnapshot {
        PanelSnapshot::docked(name, Area::Left, Rect::new(0, y, 200, height))
    }

    #[test]
    fn disjoint_panels_produce_no_merges() {
        let snapshots = vec![left_panel("a", 0, 200), left_panel("b", 200, 200)];
        assert!(restack(&snapshots, window()).is_empty());
    }

    #[test]
    fn overlapping_pair_merges_follower_into_leader() {
        let snapshots = vec![left_panel("a", 0, 300), left_panel("b", 250, 300)];
        let merges = restack(&snapshots, window());
        assert_eq!(
            merges,
            vec![MergeInstruction {
                survivor: "a".to_string(),
                merged: "b".to_string(),
                area: Area::Left,
            }]
        );
    }

    #[test]
    fn overflowing_last_panel_merges_into_prior_group() {
        let snapshots = vec![left_panel("a", 0, 300), left_panel("b", 300, 400)];
        let merges = restack(&snapshots, window());
        assert_eq!(
            merges,
            vec![MergeInstruction {
                survivor: "a".to_string(),
                merged: "b".to_string(),
                area: Area::Left,
            }]
        );
    }

    #[test]
    fn floating_and_hidden_panels_are_ignored() {
        let mut floating = left_panel("float", 0, 300);
        floating.floating = true;
        let mut hidden = left_panel("hidden", 100, 300);
        hidden.visible = false;
        let snapshots = vec![floating, hidden, left_panel("a", 50, 300)];
        assert!(restack(&snapshots, window()).is_empty());
    }

    #[test]
    fn horizontal_areas_stack_on_the_x_axis() {
        let snapshots = vec![
            PanelSnapshot::docked("a", Area::Top, Rect::new(0, 0, 500, 100)),
            PanelSnapshot::docked("b", Area::Top, Rect::new(400, 0, 500, 100)),
        ];
        let merges = restack(&snapshots, window());
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].merged, "b");
        assert_eq!(merges[0].area, Area::Top);
    }

    #[test]
    fn each_panel_merges_at_most_once_per_pass() {
        let snapshots = vec![
            left_panel("a", 0, 300),
            left_panel("b", 200, 300),
            left_panel("c", 400, 300),
        ];
        let merges = restack(&snapshots, window());
        assert_eq!(merges.len(), 2);
        let merged: Vec<&str> = merges.iter().map(|m| m.merged.as_str()).collect();
        assert_eq!(merged, vec!["b", "c"]);
    }

    #[test]
    fn restack_converges_to_the_fitting_group_count() {
        // Window fits two 300-tall groups; four panels must collapse to two.
        let win = Rect::new(0, 0, 800, 600);
        let panel_height = 300;
        let mut groups: Vec<Vec<String>> = (0..4)
            .map(|idx| vec![format!("panel{idx}")])
            .collect();

        let mut passes = 0;
        loop {
            let snapshots: Vec<PanelSnapshot> = groups
                .iter()
                .enumerate()
                .map(|(idx, group)| {
                    left_panel(&group[0], idx as i32 * panel_height, panel_height)
                })
                .collect();
            let merges = restack(&snapshots, win);
            if merges.is_empty() {
                break;
            }
            passes += 1;
            assert!(passes <= 4, "restack failed to converge");

            for merge in merges {
                let from = groups
                    .iter()
                    .position(|g| g[0] == merge.merged)
                    .expect("merged group");
                let members = groups.remove(from);
                let into = groups
                    .iter()
                    .position(|g| g[0] == merge.survivor)
                    .expect("surviving group");
                groups[into].extend(members);
            }
        }

        assert_eq!(groups.len(), 2);
        let member_count: usize = groups.iter().map(Vec::len).sum();
        assert_eq!(member_count, 4);
    }

    #[test]
    fn minimum_extents_max_reduce_per_area() {
        let snapshots = vec![
            left_panel("narrow", 0, 200),
            left_panel("wide", 200, 200),
            PanelSnapshot::docked("short", Area::Bottom, Rect::new(0, 500, 800, 80)),
        ];
        let mut minimums = HashMap::new();
        minimums.insert("narrow".to_string(), 250);
        minimums.insert("wide".to_string(), 180);
        minimums.insert("short".to_string(), 120);

        let adjustments = enforce_minimums(&snapshots, &minimums);
        assert_eq!(adjustments.len(), 3);

        // Left panels are 200 wide, below the 250 area max.
        for panel in ["narrow", "wide"] {
            let adj = adjustments.iter().find(|a| a.panel == panel).unwrap();
            assert_eq!(adj.area, Area::Left);
            assert_eq!(adj.extent, 250);
        }
        // Bottom panel is 80 tall, below its own 120 minimum.
        let short = adjustments.iter().find(|a| a.panel == "short").unwrap();
        assert_eq!(short.area, Area::Bottom);
        assert_eq!(short.extent, 120);
    }

    #[test]
    fn satisfied_minimums_need_no_adjustment() {
        let snapshots = vec![left_panel("a", 0, 200)];
        let mut minimums = HashMap::new();
        minimums.insert("a".to_string(), 150);
        assert!(enforce_minimums(&snapshots, &minimums).is_empty());
    }
}
