//! The desktop service.
//!
//! Owns the layout engine, the drag controller and the widget store, and
//! keeps the icon list in step with the VFS by listening on the change bus.
//! The bus never replays, so the icon list is also read once at
//! construction.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use mirage_bus::Subscription;
use mirage_platform::StorageService;
use mirage_types::config::MirageConfig;
use mirage_types::error::{MirageError, Result};
use mirage_types::{ChangeEvent, Point, Size, WidgetRequest};
use mirage_vfs::{EntryKind, VfsStore};

use crate::drag::DragController;
use crate::grid::{GridMetrics, LayoutMode};
use crate::layout::LayoutEngine;
use crate::overrides::IconOverrides;
use crate::widgets::{Widget, WidgetStore};

/// One icon as it should be drawn right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconView {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub position: Point,
    pub auto: Point,
    pub overridden: bool,
    pub dragging: bool,
}

/// A full render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DesktopView {
    pub icons: Vec<IconView>,
    pub widgets: Vec<Widget>,
    pub wallpaper: String,
    pub locked: bool,
    pub mode: LayoutMode,
    pub viewport: Size,
}

impl DesktopView {
    pub fn icon(&self, name: &str) -> Option<&IconView> {
        self.icons.iter().find(|i| i.name == name)
    }
}

#[derive(Debug)]
struct DesktopState {
    layout: LayoutEngine,
    drag: DragController,
}

/// What the bus handler needs, held weakly so the subscription does not
/// keep the desktop alive.
struct Watch {
    state: Weak<RefCell<DesktopState>>,
    vfs: Weak<VfsStore>,
    widgets: Weak<WidgetStore>,
    stale: Rc<Cell<bool>>,
    root: String,
}

impl Watch {
    fn on_event(&self, event: &ChangeEvent) -> Result<()> {
        match event {
            ChangeEvent::FileChange { .. } => {
                let (Some(state), Some(vfs)) = (self.state.upgrade(), self.vfs.upgrade()) else {
                    return Ok(());
                };
                match state.try_borrow_mut() {
                    Ok(mut state) => state.layout.refresh(vfs.read_dir(&self.root)),
                    // Picked up on the next render.
                    Err(_) => self.stale.set(true),
                }
                Ok(())
            },
            ChangeEvent::AgentCreateWidget(request) => {
                let (Some(state), Some(widgets)) = (self.state.upgrade(), self.widgets.upgrade())
                else {
                    return Ok(());
                };
                let viewport = state
                    .try_borrow()
                    .map(|s| s.layout.viewport())
                    .map_err(|_| MirageError::InvalidOperation("desktop busy".into()))?;
                let id = widgets.spawn(request, viewport);
                log::info!("Agent placed widget {id}");
                Ok(())
            },
            _ => Ok(()),
        }
    }
}

pub struct Desktop {
    state: Rc<RefCell<DesktopState>>,
    vfs: Rc<VfsStore>,
    widgets: Rc<WidgetStore>,
    stale: Rc<Cell<bool>>,
    root: String,
    _subscription: Subscription<ChangeEvent>,
}

impl std::fmt::Debug for Desktop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Desktop")
            .field("root", &self.root)
            .field("state", &self.state)
            .finish()
    }
}

impl Desktop {
    pub fn new(
        config: &MirageConfig,
        vfs: Rc<VfsStore>,
        storage: Rc<dyn StorageService>,
        viewport: Size,
    ) -> Self {
        let overrides = IconOverrides::load(
            Rc::clone(&storage),
            config.storage.icon_positions_key.as_str(),
        );
        let widgets = Rc::new(WidgetStore::load(storage, config.storage.decor_key.as_str()));
        let mut layout = LayoutEngine::new(GridMetrics::from(&config.grid), overrides, viewport);
        layout.refresh(vfs.read_dir(&config.desktop_root));

        let state = Rc::new(RefCell::new(DesktopState {
            layout,
            drag: DragController::new(),
        }));
        let stale = Rc::new(Cell::new(false));
        let watch = Watch {
            state: Rc::downgrade(&state),
            vfs: Rc::downgrade(&vfs),
            widgets: Rc::downgrade(&widgets),
            stale: Rc::clone(&stale),
            root: config.desktop_root.clone(),
        };
        let subscription = vfs.bus().subscribe(move |event| watch.on_event(event));
        log::debug!("Desktop watching {}", config.desktop_root);

        Self {
            state,
            vfs,
            widgets,
            stale,
            root: config.desktop_root.clone(),
            _subscription: subscription,
        }
    }

    pub fn vfs(&self) -> &Rc<VfsStore> {
        &self.vfs
    }

    pub fn widgets(&self) -> &Rc<WidgetStore> {
        &self.widgets
    }

    pub fn desktop_root(&self) -> &str {
        &self.root
    }

    /// Re-read the desktop directory.
    pub fn refresh(&self) {
        self.stale.set(false);
        let entries = self.vfs.read_dir(&self.root);
        self.state.borrow_mut().layout.refresh(entries);
    }

    /// Merge automatic slots, overrides and any in-flight drag.
    pub fn render(&self) -> DesktopView {
        if self.stale.get() {
            self.refresh();
        }
        let state = self.state.borrow();
        let icons = state
            .layout
            .resolve()
            .into_iter()
            .map(|placed| {
                let transient = state.drag.transient(&placed.icon.name);
                IconView {
                    name: placed.icon.name,
                    path: placed.icon.path,
                    kind: placed.icon.kind,
                    position: transient.unwrap_or(placed.position),
                    auto: placed.auto,
                    overridden: placed.overridden,
                    dragging: transient.is_some(),
                }
            })
            .collect();
        let decor = self.widgets.get();
        DesktopView {
            icons,
            widgets: decor.widgets,
            wallpaper: decor.wallpaper,
            locked: state.layout.is_locked(),
            mode: state.layout.mode(),
            viewport: state.layout.viewport(),
        }
    }

    pub fn viewport(&self) -> Size {
        self.state.borrow().layout.viewport()
    }

    pub fn set_viewport(&self, width: u32, height: u32) {
        self.state
            .borrow_mut()
            .layout
            .set_viewport(Size::new(width, height));
    }

    /// Topmost icon whose box contains `point`.
    pub fn icon_at(&self, point: Point) -> Option<String> {
        let state = self.state.borrow();
        let icon = state.layout.metrics().icon;
        state
            .layout
            .resolve()
            .into_iter()
            .rev()
            .find(|placed| {
                let p = state.drag.transient(&placed.icon.name).unwrap_or(placed.position);
                point.x >= p.x
                    && point.y >= p.y
                    && point.x < p.x + icon.width as i32
                    && point.y < p.y + icon.height as i32
            })
            .map(|placed| placed.icon.name)
    }

    /// Begin dragging the icon called `name`. Returns `false` if the layout
    /// is locked, the icon does not exist or another drag is running.
    pub fn pointer_down(&self, name: &str, pointer: Point) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(placed) = state.layout.resolve_one(name) else {
            return false;
        };
        let locked = state.layout.is_locked();
        state.drag.pointer_down(name, pointer, placed.position, locked)
    }

    pub fn pointer_move(&self, pointer: Point) -> Option<Point> {
        self.state.borrow_mut().drag.pointer_move(pointer)
    }

    /// Finish a drag and persist the snapped position. Returns where the
    /// icon landed.
    pub fn pointer_up(&self, pointer: Point) -> Option<Point> {
        let mut state = self.state.borrow_mut();
        let viewport = state.layout.viewport();
        let metrics = *state.layout.metrics();
        let commit = state.drag.pointer_up(pointer, viewport, &metrics)?;
        state.layout.commit_override(&commit.name, commit.position);
        Some(commit.position)
    }

    /// Convenience for a complete press-move-release gesture.
    pub fn drag_icon(&self, name: &str, from: Point, to: Point) -> Option<Point> {
        if !self.pointer_down(name, from) {
            return None;
        }
        self.pointer_move(to);
        self.pointer_up(to)
    }

    pub fn is_locked(&self) -> bool {
        self.state.borrow().layout.is_locked()
    }

    pub fn lock_layout(&self) {
        self.state.borrow_mut().layout.lock();
    }

    pub fn unlock_layout(&self) {
        self.state.borrow_mut().layout.unlock();
    }

    pub fn reset_layout(&self) {
        self.state.borrow_mut().layout.reset_layout();
    }

    /// Place a widget as if requested over the bus.
    pub fn spawn_widget(&self, request: &WidgetRequest) -> String {
        self.widgets.spawn(request, self.viewport())
    }
}
