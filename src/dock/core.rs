use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Docking region around the central window.
///
/// The derive order doubles as the canonical output order for resolved
/// arrangements.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Top,
    Left,
    Right,
    Bottom,
}

impl Area {
    pub const ALL: [Area; 4] = [Area::Top, Area::Left, Area::Right, Area::Bottom];

    /// Top and bottom areas span the window width; panels inside them sit
    /// side by side and their adjustable extent is their height. Left and
    /// right areas are the vertical counterpart.
    pub const fn is_horizontal(&self) -> bool {
        matches!(self, Area::Top | Area::Bottom)
    }
}

/// How a relative placement default attaches to its sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    SameTab,
    Before,
    After,
}

/// Declarative description of where a panel should initially go.
///
/// Consumed once per layout run; a re-layout to defaults is a full re-run of
/// the solver, never an incremental patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementDefault {
    Explicit(Area),
    Relative { sibling: String, relation: Relation },
}

impl PlacementDefault {
    pub fn same_tab(sibling: impl Into<String>) -> Self {
        PlacementDefault::Relative {
            sibling: sibling.into(),
            relation: Relation::SameTab,
        }
    }

    pub fn before(sibling: impl Into<String>) -> Self {
        PlacementDefault::Relative {
            sibling: sibling.into(),
            relation: Relation::Before,
        }
    }

    pub fn after(sibling: impl Into<String>) -> Self {
        PlacementDefault::Relative {
            sibling: sibling.into(),
            relation: Relation::After,
        }
    }
}

/// Concrete placement produced by the solver: the sort key for restacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockLocation {
    pub area: Area,
    pub ordinal: usize,
    pub tab_group: usize,
}

/// Tells the host to tabify `merged` under `survivor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeInstruction {
    pub survivor: String,
    pub merged: String,
    pub area: Area,
}

/// Tells the host to grow a panel to the area-wide minimum extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentAdjustment {
    pub panel: String,
    pub area: Area,
    pub extent: i32,
}

/// Host-reported view of one panel, consumed by the restacking passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSnapshot {
    pub name: String,
    pub area: Area,
    pub rect: Rect,
    pub floating: bool,
    pub visible: bool,
}

impl PanelSnapshot {
    /// Snapshot of a visible, docked panel.
    pub fn docked(name: impl Into<String>, area: Area, rect: Rect) -> Self {
        Self {
            name: name.into(),
            area,
            rect,
            floating: false,
            visible: true,
        }
    }

    /// Leading edge along the area's stacking axis.
    pub fn leading_edge(&self) -> i32 {
        if self.area.is_horizontal() {
            self.rect.x
        } else {
            self.rect.y
        }
    }

    /// Trailing edge along the area's stacking axis.
    pub fn trailing_edge(&self) -> i32 {
        if self.area.is_horizontal() {
            self.rect.right()
        } else {
            self.rect.bottom()
        }
    }

    /// Extent along the area's adjustable axis.
    pub fn extent(&self) -> i32 {
        if self.area.is_horizontal() {
            self.rect.height
        } else {
            self.rect.width
        }
    }
}
