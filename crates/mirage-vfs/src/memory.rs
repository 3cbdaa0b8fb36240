//! In-memory VFS implementation.
//!
//! The whole tree lives in a `BTreeMap<String, Node>` keyed by normalized
//! absolute path. Because keys sort lexicographically, the descendants of a
//! directory `/a` are exactly the contiguous run of keys starting with `/a/`,
//! so subtree operations are range scans.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use mirage_platform::{Clock, SystemClock};
use mirage_types::FileOp;
use mirage_types::error::{MirageError, Result};

use crate::path::{self, ROOT, child_prefix, normalize, parent_of};
use crate::{EntryKind, FsEntry, Vfs};

#[derive(Debug, Clone)]
enum NodeData {
    File(String),
    Dir,
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    modified: u64,
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self.data {
            NodeData::File(_) => EntryKind::File,
            NodeData::Dir => EntryKind::Directory,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self.data, NodeData::Dir)
    }

    fn to_entry(&self, path: &str) -> FsEntry {
        FsEntry {
            path: path.to_string(),
            name: path::file_name(path).to_string(),
            kind: self.kind(),
            content: match &self.data {
                NodeData::File(content) => Some(content.clone()),
                NodeData::Dir => None,
            },
            last_modified: self.modified,
        }
    }
}

/// A fully in-memory virtual file system.
pub struct MemoryVfs {
    nodes: BTreeMap<String, Node>,
    clock: Rc<dyn Clock>,
}

impl std::fmt::Debug for MemoryVfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVfs")
            .field("entries", &self.nodes.len())
            .finish()
    }
}

impl MemoryVfs {
    /// Create a VFS holding only the root directory, stamped by the system
    /// clock.
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            ROOT.to_string(),
            Node {
                data: NodeData::Dir,
                modified: clock.now_millis(),
            },
        );
        Self { nodes, clock }
    }

    /// Number of entries below the root. The root itself always exists and
    /// is not counted.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the strict descendants of a normalized directory.
    fn descendant_keys(&self, dir: &str) -> Vec<String> {
        let prefix = child_prefix(dir);
        self.nodes
            .range::<str, _>((
                std::ops::Bound::Included(prefix.as_ref()),
                std::ops::Bound::Unbounded,
            ))
            .take_while(|(k, _)| k.starts_with(prefix.as_ref()))
            .filter(|(k, _)| k.as_str() != ROOT)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Fail unless the parent of `path` exists and is a directory.
    fn require_parent_dir(&self, path: &str) -> Result<()> {
        let par = parent_of(path);
        match self.nodes.get(par) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(MirageError::InvalidOperation(format!(
                "parent is not a directory: {par}"
            ))),
            None => Err(MirageError::InvalidOperation(format!(
                "parent directory does not exist: {par}"
            ))),
        }
    }
}

impl Default for MemoryVfs {
    fn default() -> Self {
        Self::new()
    }
}

/// Directories before files, then case-insensitive by name with a
/// byte-order tiebreak so the ordering is total.
fn listing_order(a: &FsEntry, b: &FsEntry) -> Ordering {
    let rank = |e: &FsEntry| match e.kind {
        EntryKind::Directory => 0,
        EntryKind::File => 1,
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

impl Vfs for MemoryVfs {
    fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(normalize(path).as_ref())
    }

    fn stat(&self, path: &str) -> Result<FsEntry> {
        let path = normalize(path);
        self.nodes
            .get(path.as_ref())
            .map(|node| node.to_entry(&path))
            .ok_or_else(|| MirageError::NotFound(format!("no such path: {path}")))
    }

    fn read_dir(&self, path: &str) -> Vec<FsEntry> {
        let path = normalize(path);
        match self.nodes.get(path.as_ref()) {
            Some(node) if node.is_dir() => {},
            _ => return Vec::new(),
        }

        let prefix = child_prefix(&path);
        let mut entries: Vec<FsEntry> = self
            .descendant_keys(&path)
            .into_iter()
            .filter(|key| !key[prefix.len()..].contains('/'))
            .filter_map(|key| self.nodes.get(&key).map(|node| node.to_entry(&key)))
            .collect();
        entries.sort_by(listing_order);
        entries
    }

    fn walk(&self, path: &str) -> Vec<FsEntry> {
        let path = normalize(path);
        self.descendant_keys(&path)
            .into_iter()
            .filter_map(|key| self.nodes.get(&key).map(|node| node.to_entry(&key)))
            .collect()
    }

    fn read_file(&self, path: &str) -> Result<String> {
        let path = normalize(path);
        match self.nodes.get(path.as_ref()).map(|n| &n.data) {
            Some(NodeData::File(content)) => Ok(content.clone()),
            Some(NodeData::Dir) => Err(MirageError::NotFound(format!(
                "is a directory, not a file: {path}"
            ))),
            None => Err(MirageError::NotFound(format!("no such file: {path}"))),
        }
    }

    fn write_file(&mut self, path: &str, content: &str) -> Result<FileOp> {
        let path = normalize(path);
        if path.as_ref() == ROOT {
            return Err(MirageError::InvalidOperation(
                "cannot write to the root directory".to_string(),
            ));
        }
        let op = match self.nodes.get(path.as_ref()) {
            Some(node) if node.is_dir() => {
                return Err(MirageError::InvalidOperation(format!(
                    "is a directory: {path}"
                )));
            },
            Some(_) => FileOp::Modified,
            None => {
                self.require_parent_dir(&path)?;
                FileOp::Created
            },
        };
        let node = Node {
            data: NodeData::File(content.to_string()),
            modified: self.clock.now_millis(),
        };
        self.nodes.insert(path.into_owned(), node);
        Ok(op)
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        let path = normalize(path);
        if self.nodes.contains_key(path.as_ref()) {
            return Err(MirageError::AlreadyExists(path.into_owned()));
        }

        // Validate the whole ancestor chain before creating anything, so a
        // failure leaves the tree untouched.
        let mut missing = vec![path.to_string()];
        let mut cursor = parent_of(&path);
        loop {
            match self.nodes.get(cursor) {
                Some(node) if node.is_dir() => break,
                Some(_) => {
                    return Err(MirageError::InvalidOperation(format!(
                        "not a directory: {cursor}"
                    )));
                },
                None => {
                    missing.push(cursor.to_string());
                    cursor = parent_of(cursor);
                },
            }
        }

        let now = self.clock.now_millis();
        for dir in missing.into_iter().rev() {
            self.nodes.insert(
                dir,
                Node {
                    data: NodeData::Dir,
                    modified: now,
                },
            );
        }
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<usize> {
        let path = normalize(path);
        if path.as_ref() == ROOT {
            return Err(MirageError::InvalidOperation(
                "cannot delete the root directory".to_string(),
            ));
        }
        let Some(node) = self.nodes.remove(path.as_ref()) else {
            return Err(MirageError::NotFound(format!("no such path: {path}")));
        };
        let mut removed = 1;
        if node.is_dir() {
            for key in self.descendant_keys(&path) {
                self.nodes.remove(&key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn move_entry(&mut self, source: &str, dest: &str) -> Result<()> {
        let source = normalize(source);
        let dest = normalize(dest);
        if source.as_ref() == ROOT {
            return Err(MirageError::InvalidOperation(
                "cannot move the root directory".to_string(),
            ));
        }
        if !self.nodes.contains_key(source.as_ref()) {
            return Err(MirageError::NotFound(format!("no such path: {source}")));
        }
        if path::is_within(&dest, &source) {
            return Err(MirageError::InvalidOperation(format!(
                "cannot move {source} into its own subtree ({dest})"
            )));
        }
        if self.nodes.contains_key(dest.as_ref()) {
            return Err(MirageError::AlreadyExists(dest.into_owned()));
        }
        self.require_parent_dir(&dest)?;

        let mut keys = vec![source.to_string()];
        keys.extend(self.descendant_keys(&source));
        for key in keys {
            if let Some(node) = self.nodes.remove(&key) {
                let moved = format!("{dest}{}", &key[source.len()..]);
                self.nodes.insert(moved, node);
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.nodes.retain(|k, _| k == ROOT);
    }

    fn restore_entry(&mut self, entry: FsEntry) -> Result<()> {
        let path = normalize(&entry.path).into_owned();
        if path == ROOT {
            return Err(MirageError::InvalidOperation(
                "cannot restore over the root directory".to_string(),
            ));
        }
        if self.nodes.contains_key(&path) {
            return Err(MirageError::AlreadyExists(path));
        }
        self.require_parent_dir(&path)?;
        let data = match entry.kind {
            EntryKind::Directory => NodeData::Dir,
            EntryKind::File => NodeData::File(entry.content.unwrap_or_default()),
        };
        self.nodes.insert(
            path,
            Node {
                data,
                modified: entry.last_modified,
            },
        );
        Ok(())
    }
}
