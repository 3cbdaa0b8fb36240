//! Desktop shell core for mirage.
//!
//! Projects the direct children of the Desktop directory onto a 2-D icon
//! grid, lets the user drag icons to manual positions, and keeps the
//! wallpaper and floating widgets. [`Desktop`] ties the pieces to a
//! [`mirage_vfs::VfsStore`] and its change bus.

pub mod desktop;
pub mod drag;
pub mod grid;
pub mod layout;
pub mod overrides;
pub mod widgets;

pub use desktop::{Desktop, DesktopView, IconView};
pub use drag::{DragController, DragState, DropCommit};
pub use grid::{GridMetrics, LayoutMode};
pub use layout::{DesktopIcon, LayoutEngine, PlacedIcon};
pub use overrides::IconOverrides;
pub use widgets::{Decor, DecorChange, Widget, WidgetStore};
