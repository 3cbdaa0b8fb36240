//! Virtual file system for mirage.
//!
//! [`Vfs`] is the storage contract, [`MemoryVfs`] the in-memory engine, and
//! [`VfsStore`] the shared, change-notifying front that every consumer
//! (explorer, editor, desktop) reads and writes through.

pub mod memory;
pub mod path;
pub mod seed;
pub mod snapshot;
pub mod store;

pub use memory::MemoryVfs;
pub use snapshot::VfsSnapshot;
pub use store::VfsStore;

use mirage_types::FileOp;
use mirage_types::error::Result;
use serde::{Deserialize, Serialize};

/// Kind of a VFS entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A file or directory as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsEntry {
    /// Absolute, normalized path.
    pub path: String,
    /// Last path segment.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// File content. Always `None` for directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
}

impl FsEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Storage contract for a hierarchical, path-keyed file tree.
///
/// Every entry except `/` has an existing directory as its parent.
pub trait Vfs {
    fn exists(&self, path: &str) -> bool;

    /// Metadata for one entry. File content is included.
    fn stat(&self, path: &str) -> Result<FsEntry>;

    /// Direct children, directories first, then by name. A missing path (or
    /// a file) yields an empty list rather than an error.
    fn read_dir(&self, path: &str) -> Vec<FsEntry>;

    /// All descendants of `path` in path order, excluding `path` itself.
    fn walk(&self, path: &str) -> Vec<FsEntry>;

    fn read_file(&self, path: &str) -> Result<String>;

    /// Create or overwrite a file. Reports whether it was created or
    /// modified.
    fn write_file(&mut self, path: &str, content: &str) -> Result<FileOp>;

    /// Create a directory and any missing ancestors.
    fn mkdir(&mut self, path: &str) -> Result<()>;

    /// Remove an entry and all of its descendants. Returns how many entries
    /// were removed.
    fn delete(&mut self, path: &str) -> Result<usize>;

    /// Relocate an entry and its subtree.
    fn move_entry(&mut self, source: &str, dest: &str) -> Result<()>;

    /// Drop everything except the root.
    fn clear(&mut self);

    /// Insert an entry verbatim (timestamp included). The parent must
    /// already exist.
    fn restore_entry(&mut self, entry: FsEntry) -> Result<()>;
}
