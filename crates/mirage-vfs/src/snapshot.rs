//! Serializable image of a whole VFS tree.

use serde::{Deserialize, Serialize};

use mirage_types::error::Result;

use crate::FsEntry;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfsSnapshot {
    pub version: u32,
    /// Every entry except the root.
    pub entries: Vec<FsEntry>,
}

impl VfsSnapshot {
    pub fn new(entries: Vec<FsEntry>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Entries ordered so that every parent precedes its children.
    pub fn into_sorted_entries(mut self) -> Vec<FsEntry> {
        self.entries
            .sort_by(|a, b| depth(&a.path).cmp(&depth(&b.path)).then_with(|| a.path.cmp(&b.path)));
        self.entries
    }
}

fn depth(path: &str) -> usize {
    path.bytes().filter(|&b| b == b'/').count()
}
