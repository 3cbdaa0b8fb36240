//! Platform services for mirage.
//!
//! The engine never touches browser storage or wall-clock time directly;
//! it goes through these traits so tests can substitute in-memory fakes.

mod services;

pub use services::*;
