//! Wallpaper and floating desktop widgets.
//!
//! A small observable store, independent of the VFS. Every change is
//! announced on the store's own [`EventBus`] as a [`DecorChange`] and the
//! whole [`Decor`] is written back to storage under one key. Storage
//! failures are logged and otherwise ignored.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mirage_bus::{EventBus, Subscription};
use mirage_platform::StorageService;
use mirage_types::error::{MirageError, Result};
use mirage_types::{Point, Size, WidgetRequest};
use serde::{Deserialize, Serialize};

use crate::drag;

pub const DEFAULT_WALLPAPER: &str = "aurora";
pub const DEFAULT_WIDGET_TYPE: &str = "note";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub x: i32,
    pub y: i32,
    /// Widget-specific payload, opaque to the store.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Widget {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Everything the store persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decor {
    pub wallpaper: String,
    pub widgets: Vec<Widget>,
}

impl Default for Decor {
    fn default() -> Self {
        Self {
            wallpaper: DEFAULT_WALLPAPER.to_string(),
            widgets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecorChange {
    WallpaperChanged(String),
    WidgetAdded(String),
    WidgetUpdated(String),
    WidgetMoved(String),
    WidgetRemoved(String),
}

/// Footprint of a widget type, used to keep spawned widgets on screen.
pub fn widget_size(kind: &str) -> Size {
    match kind {
        "clock" => Size::new(200, 120),
        "note" => Size::new(220, 220),
        "weather" => Size::new(240, 140),
        "calendar" => Size::new(260, 240),
        _ => Size::new(220, 160),
    }
}

pub struct WidgetStore {
    decor: RefCell<Decor>,
    next_id: Cell<u64>,
    changes: EventBus<DecorChange>,
    storage: Rc<dyn StorageService>,
    key: String,
}

impl std::fmt::Debug for WidgetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetStore")
            .field("key", &self.key)
            .field("decor", &self.decor)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl WidgetStore {
    /// Open the store persisted under `key`. A missing or unreadable blob
    /// starts from the default decor.
    pub fn load(storage: Rc<dyn StorageService>, key: impl Into<String>) -> Self {
        let key = key.into();
        let decor = match storage.get(&key) {
            Ok(Some(json)) => serde_json::from_str::<Decor>(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt decor in {key}: {e}");
                Decor::default()
            }),
            Ok(None) => Decor::default(),
            Err(e) => {
                log::warn!("Decor unavailable ({key}): {e}");
                Decor::default()
            },
        };
        let next_id = decor
            .widgets
            .iter()
            .filter_map(|w| w.id.strip_prefix("widget-")?.parse::<u64>().ok())
            .max()
            .map_or(1, |n| n + 1);
        Self {
            decor: RefCell::new(decor),
            next_id: Cell::new(next_id),
            changes: EventBus::new(),
            storage,
            key,
        }
    }

    pub fn get(&self) -> Decor {
        self.decor.borrow().clone()
    }

    pub fn wallpaper(&self) -> String {
        self.decor.borrow().wallpaper.clone()
    }

    pub fn widgets(&self) -> Vec<Widget> {
        self.decor.borrow().widgets.clone()
    }

    pub fn widget(&self, id: &str) -> Option<Widget> {
        self.decor.borrow().widgets.iter().find(|w| w.id == id).cloned()
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription<DecorChange>
    where
        F: FnMut(&DecorChange) -> Result<()> + 'static,
    {
        self.changes.subscribe(handler)
    }

    /// Add a widget exactly where asked. Returns its id.
    pub fn add(&self, kind: &str, position: Point, data: serde_json::Value) -> String {
        let id = format!("widget-{}", self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.decor.borrow_mut().widgets.push(Widget {
            id: id.clone(),
            kind: kind.to_string(),
            x: position.x,
            y: position.y,
            data,
        });
        log::debug!("Widget {id} ({kind}) added at ({}, {})", position.x, position.y);
        self.commit(DecorChange::WidgetAdded(id.clone()));
        id
    }

    /// Add a widget on behalf of a producer such as an agent.
    ///
    /// Requested coordinates are clamped into `container` once, here.
    /// Missing coordinates fall back to a cascade so that repeated spawns
    /// do not stack exactly on top of each other.
    pub fn spawn(&self, request: &WidgetRequest, container: Size) -> String {
        let kind = request
            .widget_type
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_WIDGET_TYPE);
        let cascade = self.cascade_position();
        let wanted = Point::new(
            request.x.unwrap_or(cascade.x),
            request.y.unwrap_or(cascade.y),
        );
        let position = drag::clamp(wanted, container, widget_size(kind), 0);
        self.add(kind, position, serde_json::Value::Null)
    }

    fn cascade_position(&self) -> Point {
        let step = (self.decor.borrow().widgets.len() % 8) as i32 * 30;
        Point::new(120 + step, 120 + step)
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut decor = self.decor.borrow_mut();
            let before = decor.widgets.len();
            decor.widgets.retain(|w| w.id != id);
            decor.widgets.len() != before
        };
        if removed {
            self.commit(DecorChange::WidgetRemoved(id.to_string()));
        }
        removed
    }

    /// Replace a widget's payload.
    pub fn update(&self, id: &str, data: serde_json::Value) -> Result<()> {
        self.with_widget(id, |w| w.data = data)?;
        self.commit(DecorChange::WidgetUpdated(id.to_string()));
        Ok(())
    }

    /// Pixel-exact move. No snapping and no clamping.
    pub fn move_widget(&self, id: &str, position: Point) -> Result<()> {
        self.with_widget(id, |w| {
            w.x = position.x;
            w.y = position.y;
        })?;
        self.commit(DecorChange::WidgetMoved(id.to_string()));
        Ok(())
    }

    pub fn set_wallpaper(&self, wallpaper: &str) {
        {
            let mut decor = self.decor.borrow_mut();
            if decor.wallpaper == wallpaper {
                return;
            }
            decor.wallpaper = wallpaper.to_string();
        }
        log::info!("Wallpaper set to {wallpaper}");
        self.commit(DecorChange::WallpaperChanged(wallpaper.to_string()));
    }

    fn with_widget(&self, id: &str, apply: impl FnOnce(&mut Widget)) -> Result<()> {
        let mut decor = self.decor.borrow_mut();
        let widget = decor
            .widgets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| MirageError::NotFound(format!("widget {id}")))?;
        apply(widget);
        Ok(())
    }

    // Persist, then notify. No borrow is held here, so subscribers may read
    // the store (or change it; the bus queues the follow-up event).
    fn commit(&self, change: DecorChange) {
        let json = serde_json::to_string(&*self.decor.borrow());
        let result = match json {
            Ok(json) => self.storage.set(&self.key, &json),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            log::warn!("Could not persist decor to {}: {e}", self.key);
        }
        self.changes.emit(change);
    }
}
