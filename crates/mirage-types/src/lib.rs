//! Foundation types for mirage.
//!
//! This crate contains the types shared by every mirage crate: the error
//! taxonomy, the change events carried on the bus, screen geometry, and the
//! TOML configuration.

pub mod config;
pub mod error;
pub mod event;
pub mod geometry;

pub use error::{ErrorKind, MirageError, Result};
pub use event::{ChangeEvent, FileOp, WidgetRequest};
pub use geometry::{Point, Size};
