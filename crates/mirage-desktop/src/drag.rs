//! Icon drag/drop state machine.
//!
//! `Idle -> Dragging -> Idle`. Pointer-up always returns to `Idle`; there is
//! no cancel state. The geometry of a drop lives in the free functions
//! [`snap`] and [`clamp`] so it can be tested without any pointer plumbing.

use mirage_types::{Point, Size};

use crate::grid::GridMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        name: String,
        /// Pointer position minus the icon's rendered position at pointer-down.
        offset: Point,
        /// Transient, unpersisted position while the pointer moves.
        current: Point,
    },
}

/// A snapped and clamped drop, ready to be stored as an override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropCommit {
    pub name: String,
    pub position: Point,
}

#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Transient position of `name`, if it is the icon being dragged.
    pub fn transient(&self, name: &str) -> Option<Point> {
        match &self.state {
            DragState::Dragging {
                name: dragged,
                current,
                ..
            } if dragged == name => Some(*current),
            _ => None,
        }
    }

    /// Start dragging `name`, currently drawn at `rendered`.
    ///
    /// Returns `false` (and stays put) when the layout is locked or a drag is
    /// already in progress.
    pub fn pointer_down(&mut self, name: &str, pointer: Point, rendered: Point, locked: bool) -> bool {
        if locked {
            log::debug!("Drag of {name} ignored: layout locked");
            return false;
        }
        if self.is_dragging() {
            return false;
        }
        self.state = DragState::Dragging {
            name: name.to_string(),
            offset: pointer - rendered,
            current: rendered,
        };
        true
    }

    /// Track the pointer. Returns the new transient position while dragging.
    pub fn pointer_move(&mut self, pointer: Point) -> Option<Point> {
        match &mut self.state {
            DragState::Dragging {
                offset, current, ..
            } => {
                *current = pointer - *offset;
                Some(*current)
            },
            DragState::Idle => None,
        }
    }

    /// Release the pointer and compute the committed position.
    pub fn pointer_up(
        &mut self,
        pointer: Point,
        container: Size,
        metrics: &GridMetrics,
    ) -> Option<DropCommit> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging { name, offset, .. } => {
                let dropped = pointer - offset;
                let position = clamp(
                    snap(dropped, metrics.cell),
                    container,
                    metrics.icon,
                    metrics.min_edge,
                );
                Some(DropCommit { name, position })
            },
            DragState::Idle => None,
        }
    }
}

/// Round each axis to the nearest half cell (`W/2` horizontally, `H/2`
/// vertically). Halves round up.
pub fn snap(point: Point, cell: Size) -> Point {
    Point::new(
        snap_axis(point.x, f64::from(cell.width) / 2.0),
        snap_axis(point.y, f64::from(cell.height) / 2.0),
    )
}

fn snap_axis(value: i32, step: f64) -> i32 {
    if step <= 0.0 {
        return value;
    }
    let snapped = (f64::from(value) / step + 0.5).floor() * step;
    snapped.round() as i32
}

/// Keep an icon of `icon` size inside `container`, no closer than
/// `min_edge` to the top-left. When the container is smaller than the icon
/// the icon is pinned at `min_edge`.
pub fn clamp(point: Point, container: Size, icon: Size, min_edge: i32) -> Point {
    let max_x = (container.width as i32 - icon.width as i32).max(min_edge);
    let max_y = (container.height as i32 - icon.height as i32).max(min_edge);
    Point::new(
        point.x.clamp(min_edge, max_x),
        point.y.clamp(min_edge, max_y),
    )
}
