//! Desktop layout engine.
//!
//! Holds the current list of desktop entries (in VFS order), the container
//! size and the persisted override map, and merges them into final icon
//! positions. The entry list is replaced wholesale on every refresh; the
//! engine never diffs.

use mirage_types::{Point, Size};
use mirage_vfs::{EntryKind, FsEntry};

use crate::grid::{self, GridMetrics, LayoutMode};
use crate::overrides::IconOverrides;

/// An entry rendered on the desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopIcon {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

impl From<FsEntry> for DesktopIcon {
    fn from(entry: FsEntry) -> Self {
        Self {
            name: entry.name,
            path: entry.path,
            kind: entry.kind,
        }
    }
}

/// A desktop icon with its resolved position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedIcon {
    pub icon: DesktopIcon,
    /// Where the icon is drawn: the override if one exists, else `auto`.
    pub position: Point,
    /// The grid slot the icon would occupy without an override.
    pub auto: Point,
    pub overridden: bool,
}

#[derive(Debug)]
pub struct LayoutEngine {
    metrics: GridMetrics,
    overrides: IconOverrides,
    viewport: Size,
    locked: bool,
    icons: Vec<DesktopIcon>,
}

impl LayoutEngine {
    pub fn new(metrics: GridMetrics, overrides: IconOverrides, viewport: Size) -> Self {
        Self {
            metrics,
            overrides,
            viewport,
            locked: false,
            icons: Vec::new(),
        }
    }

    /// Replace the icon list with a fresh `read_dir` of the desktop root.
    pub fn refresh(&mut self, entries: Vec<FsEntry>) {
        self.icons = entries.into_iter().map(DesktopIcon::from).collect();
        log::trace!("Desktop layout refreshed: {} icon(s)", self.icons.len());
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        if viewport != self.viewport {
            log::debug!("Viewport {}x{}", viewport.width, viewport.height);
            self.viewport = viewport;
        }
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn metrics(&self) -> &GridMetrics {
        &self.metrics
    }

    pub fn mode(&self) -> LayoutMode {
        LayoutMode::for_width(self.viewport.width, &self.metrics)
    }

    pub fn icons(&self) -> &[DesktopIcon] {
        &self.icons
    }

    pub fn overrides(&self) -> &IconOverrides {
        &self.overrides
    }

    /// Final positions for every current entry, in VFS order.
    ///
    /// Overrides whose entry no longer exists are simply never looked up.
    pub fn resolve(&self) -> Vec<PlacedIcon> {
        self.icons
            .iter()
            .enumerate()
            .map(|(index, icon)| self.place(index, icon))
            .collect()
    }

    /// Resolved position of a single entry by name.
    pub fn resolve_one(&self, name: &str) -> Option<PlacedIcon> {
        self.icons
            .iter()
            .enumerate()
            .find(|(_, icon)| icon.name == name)
            .map(|(index, icon)| self.place(index, icon))
    }

    fn place(&self, index: usize, icon: &DesktopIcon) -> PlacedIcon {
        let auto = grid::auto_position(index, self.viewport, &self.metrics);
        let manual = self.overrides.get(&icon.name);
        PlacedIcon {
            icon: icon.clone(),
            position: manual.unwrap_or(auto),
            auto,
            overridden: manual.is_some(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Disable drag initiation. Existing overrides stay in effect.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Forget every manual position and delete the persisted key.
    pub fn reset_layout(&mut self) {
        let dropped = self.overrides.len();
        self.overrides.clear();
        log::info!("Desktop layout reset ({dropped} override(s) cleared)");
    }

    pub fn commit_override(&mut self, name: &str, position: Point) {
        log::debug!("Icon {name} placed at ({}, {})", position.x, position.y);
        self.overrides.set(name, position);
    }
}
