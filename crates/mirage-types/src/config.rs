//! Workspace configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration:
//!
//! ```toml
//! desktop_root = "/home/aussie/Desktop"
//!
//! [grid]
//! cell_width = 90
//! cell_height = 100
//!
//! [storage]
//! dir = "/var/lib/mirage"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MirageError, Result};
use crate::geometry::Size;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MirageConfig {
    /// VFS directory whose direct children are rendered as desktop icons.
    pub desktop_root: String,
    /// VFS directory holding project workspaces.
    pub workspace_root: String,
    pub grid: GridConfig,
    pub storage: StorageConfig,
}

impl Default for MirageConfig {
    fn default() -> Self {
        Self {
            desktop_root: "/home/aussie/Desktop".to_string(),
            workspace_root: "/home/aussie/workspace".to_string(),
            grid: GridConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Icon grid metrics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cell_width: u32,
    pub cell_height: u32,
    /// Edge padding around the grid.
    pub padding: u32,
    pub icon_width: u32,
    pub icon_height: u32,
    /// Viewports narrower than this use the mobile (row-major) layout.
    pub mobile_breakpoint: u32,
    /// Top padding on mobile, clearing the fixed header.
    pub mobile_top_padding: u32,
    /// Smallest coordinate a dropped icon may land on.
    pub min_edge: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_width: 90,
            cell_height: 100,
            padding: 20,
            icon_width: 80,
            icon_height: 90,
            mobile_breakpoint: 768,
            mobile_top_padding: 80,
            min_edge: 10,
        }
    }
}

impl GridConfig {
    pub fn cell_size(&self) -> Size {
        Size::new(self.cell_width, self.cell_height)
    }

    pub fn icon_size(&self) -> Size {
        Size::new(self.icon_width, self.icon_height)
    }
}

/// Persisted-storage settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for on-disk storage. `None` keeps everything in memory.
    pub dir: Option<PathBuf>,
    pub icon_positions_key: String,
    pub decor_key: String,
    pub vfs_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            icon_positions_key: "mirage.desktop.icon-positions".to_string(),
            decor_key: "mirage.desktop.decor".to_string(),
            vfs_key: "mirage.vfs".to_string(),
        }
    }
}

impl MirageConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)?;
        log::debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&src)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, root) in [
            ("desktop_root", &self.desktop_root),
            ("workspace_root", &self.workspace_root),
        ] {
            if !root.starts_with('/') {
                return Err(MirageError::Config(format!(
                    "{field} must be an absolute path: {root}"
                )));
            }
        }
        let g = &self.grid;
        if g.cell_width == 0 || g.cell_height == 0 {
            return Err(MirageError::Config(
                "grid cell size must be non-zero".to_string(),
            ));
        }
        if g.icon_width == 0 || g.icon_height == 0 {
            return Err(MirageError::Config(
                "icon size must be non-zero".to_string(),
            ));
        }
        for (field, key) in [
            ("icon_positions_key", &self.storage.icon_positions_key),
            ("decor_key", &self.storage.decor_key),
            ("vfs_key", &self.storage.vfs_key),
        ] {
            if key.is_empty() {
                return Err(MirageError::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}
