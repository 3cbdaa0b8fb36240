//! Automatic icon grid.
//!
//! Wide containers fill column by column (top to bottom, then the next
//! column to the right). Narrow containers fill row by row beneath the fixed
//! mobile header. Everything here is a pure function of the entry index,
//! the container size and the metrics.

use mirage_types::config::GridConfig;
use mirage_types::{Point, Size};

/// Cell and padding sizes for the icon grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMetrics {
    pub cell: Size,
    pub icon: Size,
    pub padding: u32,
    pub mobile_breakpoint: u32,
    pub mobile_top_padding: u32,
    pub min_edge: i32,
}

impl Default for GridMetrics {
    fn default() -> Self {
        Self::from(&GridConfig::default())
    }
}

impl From<&GridConfig> for GridMetrics {
    fn from(config: &GridConfig) -> Self {
        Self {
            cell: config.cell_size(),
            icon: config.icon_size(),
            padding: config.padding,
            mobile_breakpoint: config.mobile_breakpoint,
            mobile_top_padding: config.mobile_top_padding,
            min_edge: config.min_edge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    /// Column-major fill.
    Desktop,
    /// Row-major fill under the mobile header.
    Mobile,
}

impl LayoutMode {
    pub fn for_width(width: u32, metrics: &GridMetrics) -> Self {
        if width < metrics.mobile_breakpoint {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }
}

/// Icons that fit in one column of the wide layout (at least one).
pub fn rows_per_column(container: Size, metrics: &GridMetrics) -> u32 {
    let usable = container.height.saturating_sub(2 * metrics.padding);
    (usable / metrics.cell.height).max(1)
}

/// Icons that fit in one row of the mobile layout (at least one).
pub fn columns_per_row(container: Size, metrics: &GridMetrics) -> u32 {
    (container.width / metrics.cell.width).max(1)
}

/// Automatic position of the `index`-th icon.
pub fn auto_position(index: usize, container: Size, metrics: &GridMetrics) -> Point {
    let index = index as u32;
    let cell = metrics.cell;
    let pad = metrics.padding as i32;
    match LayoutMode::for_width(container.width, metrics) {
        LayoutMode::Desktop => {
            let rows = rows_per_column(container, metrics);
            let column = index / rows;
            let row = index % rows;
            Point::new(
                pad + (column * cell.width) as i32,
                pad + (row * cell.height) as i32,
            )
        },
        LayoutMode::Mobile => {
            let columns = columns_per_row(container, metrics);
            let column = index % columns;
            let row = index / columns;
            Point::new(
                pad + (column * cell.width) as i32,
                metrics.mobile_top_padding as i32 + (row * cell.height) as i32,
            )
        },
    }
}

/// Automatic positions for `count` icons, in order.
pub fn auto_layout(count: usize, container: Size, metrics: &GridMetrics) -> Vec<Point> {
    (0..count)
        .map(|i| auto_position(i, container, metrics))
        .collect()
}
