//! The shared, change-notifying VFS front.
//!
//! Every mutation is applied to the underlying [`Vfs`] first and then
//! announced with exactly one `file-change` event, so subscribers can always
//! treat the event as "re-read current state".
//!
//! Handlers run synchronously inside `emit`. They may read the store (the
//! mutable borrow is released before the event goes out). A mutation
//! attempted while a `file-change` event is being delivered is refused with
//! `InvalidOperation`; handlers for other events may write freely, and their
//! `file-change` is queued behind the event being delivered.

use std::cell::RefCell;

use mirage_bus::ChangeBus;
use mirage_platform::StorageService;
use mirage_types::error::{MirageError, Result};
use mirage_types::{ChangeEvent, FileOp};

use crate::path::normalize;
use crate::snapshot::VfsSnapshot;
use crate::{FsEntry, MemoryVfs, Vfs};

pub struct VfsStore {
    vfs: RefCell<Box<dyn Vfs>>,
    bus: ChangeBus,
}

impl std::fmt::Debug for VfsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VfsStore").field("bus", &self.bus).finish()
    }
}

impl VfsStore {
    /// An empty in-memory store publishing on `bus`.
    pub fn new(bus: ChangeBus) -> Self {
        Self::with_backend(Box::new(MemoryVfs::new()), bus)
    }

    pub fn with_backend(vfs: Box<dyn Vfs>, bus: ChangeBus) -> Self {
        Self {
            vfs: RefCell::new(vfs),
            bus,
        }
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    // -- reads ------------------------------------------------------------

    pub fn exists(&self, path: &str) -> bool {
        self.vfs.borrow().exists(path)
    }

    pub fn stat(&self, path: &str) -> Result<FsEntry> {
        self.vfs.borrow().stat(path)
    }

    pub fn read_dir(&self, path: &str) -> Vec<FsEntry> {
        self.vfs.borrow().read_dir(path)
    }

    pub fn walk(&self, path: &str) -> Vec<FsEntry> {
        self.vfs.borrow().walk(path)
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        self.vfs.borrow().read_file(path)
    }

    // -- mutations --------------------------------------------------------

    pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let path = normalize(path).into_owned();
        self.mutate("write", |vfs| {
            let op = vfs.write_file(&path, content)?;
            Ok(((), file_change(op, &path, None)))
        })
    }

    pub fn mkdir(&self, path: &str) -> Result<()> {
        let path = normalize(path).into_owned();
        self.mutate("mkdir", |vfs| {
            vfs.mkdir(&path)?;
            Ok(((), file_change(FileOp::Created, &path, None)))
        })
    }

    /// Delete an entry (recursively for directories). One event per call,
    /// however many entries go. Returns the number removed.
    pub fn delete(&self, path: &str) -> Result<usize> {
        let path = normalize(path).into_owned();
        self.mutate("delete", |vfs| {
            let removed = vfs.delete(&path)?;
            Ok((removed, file_change(FileOp::Deleted, &path, None)))
        })
    }

    pub fn move_entry(&self, source: &str, dest: &str) -> Result<()> {
        let source = normalize(source).into_owned();
        let dest = normalize(dest).into_owned();
        self.mutate("move", |vfs| {
            vfs.move_entry(&source, &dest)?;
            Ok(((), file_change(FileOp::Moved, &source, Some(&dest))))
        })
    }

    // -- snapshots --------------------------------------------------------

    pub fn snapshot(&self) -> VfsSnapshot {
        VfsSnapshot::new(self.walk("/"))
    }

    /// Replace the whole tree with `snapshot`. Entries whose parent is
    /// missing are skipped with a warning. Returns how many were restored.
    pub fn restore(&self, snapshot: VfsSnapshot) -> Result<usize> {
        self.mutate("restore", |vfs| {
            vfs.clear();
            let mut restored = 0;
            for entry in snapshot.into_sorted_entries() {
                let path = entry.path.clone();
                match vfs.restore_entry(entry) {
                    Ok(()) => restored += 1,
                    Err(e) => log::warn!("Skipping snapshot entry {path}: {e}"),
                }
            }
            Ok((restored, file_change(FileOp::Restored, "/", None)))
        })
    }

    /// Persist the whole tree as JSON under `key`.
    pub fn save_to(&self, storage: &dyn StorageService, key: &str) -> Result<()> {
        let json = self.snapshot().to_json()?;
        storage.set(key, &json)?;
        log::debug!("Saved VFS snapshot ({} bytes) to {key}", json.len());
        Ok(())
    }

    /// Restore from `key` if present. A missing or corrupt blob leaves the
    /// current tree alone and returns `Ok(false)`.
    pub fn restore_from(&self, storage: &dyn StorageService, key: &str) -> Result<bool> {
        let Some(json) = storage.get(key)? else {
            return Ok(false);
        };
        let snapshot = match VfsSnapshot::from_json(&json) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Ignoring corrupt VFS snapshot in {key}: {e}");
                return Ok(false);
            },
        };
        let restored = self.restore(snapshot)?;
        log::info!("Restored {restored} VFS entries from {key}");
        Ok(true)
    }

    fn mutate<T>(
        &self,
        what: &str,
        apply: impl FnOnce(&mut dyn Vfs) -> Result<(T, ChangeEvent)>,
    ) -> Result<T> {
        if self.bus.is_dispatching_where(ChangeEvent::is_file_change) {
            return Err(MirageError::InvalidOperation(format!(
                "{what} refused: change notifications are being delivered"
            )));
        }
        let (value, event) = {
            let mut vfs = self.vfs.try_borrow_mut().map_err(|_| {
                MirageError::InvalidOperation(format!("{what} refused: store is busy"))
            })?;
            apply(&mut **vfs)?
        };
        log::debug!("vfs {what}: {event:?}");
        self.bus.emit(event);
        Ok(value)
    }
}

fn file_change(op: FileOp, path: &str, dest: Option<&str>) -> ChangeEvent {
    ChangeEvent::FileChange {
        op,
        path: path.to_string(),
        dest: dest.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use mirage_platform::MemoryStorage;
    use mirage_types::ErrorKind;

    use super::*;

    fn counting_store() -> (VfsStore, Rc<Cell<usize>>, mirage_bus::Subscription<ChangeEvent>) {
        let bus = ChangeBus::new();
        let count = Rc::new(Cell::new(0));
        let count2 = Rc::clone(&count);
        let sub = bus.subscribe(move |e: &ChangeEvent| {
            if e.is_file_change() {
                count2.set(count2.get() + 1);
            }
            Ok(())
        });
        (VfsStore::new(bus), count, sub)
    }

    #[test]
    fn each_mutation_emits_one_event() {
        let (store, count, _sub) = counting_store();
        store.mkdir("/a").unwrap();
        store.write_file("/a/f.txt", "x").unwrap();
        store.write_file("/a/f.txt", "y").unwrap();
        store.move_entry("/a/f.txt", "/a/g.txt").unwrap();
        store.delete("/a/g.txt").unwrap();
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn failed_mutation_emits_nothing() {
        let (store, count, _sub) = counting_store();
        assert!(store.write_file("/missing/f", "x").is_err());
        assert!(store.delete("/ghost").is_err());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn recursive_delete_emits_exactly_one_event() {
        let (store, count, _sub) = counting_store();
        store.mkdir("/tree/a/b").unwrap();
        store.write_file("/tree/a/b/c.txt", "").unwrap();
        store.write_file("/tree/d.txt", "").unwrap();
        count.set(0);
        assert_eq!(store.delete("/tree").unwrap(), 5);
        assert_eq!(count.get(), 1);
        assert!(store.walk("/").is_empty());
    }

    #[test]
    fn event_payload_describes_mutation() {
        let bus = ChangeBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        let _sub = bus.subscribe(move |e: &ChangeEvent| {
            seen2.borrow_mut().push(e.clone());
            Ok(())
        });
        let store = VfsStore::new(bus);
        store.write_file("//notes.txt", "hi").unwrap();
        store.move_entry("/notes.txt", "/renamed.txt").unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                ChangeEvent::FileChange {
                    op: FileOp::Created,
                    path: "/notes.txt".into(),
                    dest: None,
                },
                ChangeEvent::FileChange {
                    op: FileOp::Moved,
                    path: "/notes.txt".into(),
                    dest: Some("/renamed.txt".into()),
                },
            ]
        );
    }

    #[test]
    fn handlers_can_read_mid_emit() {
        let bus = ChangeBus::new();
        let store = Rc::new(VfsStore::new(bus.clone()));
        let weak = Rc::downgrade(&store);
        let observed = Rc::new(RefCell::new(Vec::new()));
        let observed2 = Rc::clone(&observed);
        let _sub = bus.subscribe(move |_| {
            if let Some(store) = weak.upgrade() {
                let names: Vec<String> = store.read_dir("/").into_iter().map(|e| e.name).collect();
                observed2.borrow_mut().push(names);
            }
            Ok(())
        });
        store.mkdir("/one").unwrap();
        store.write_file("/two.txt", "").unwrap();
        assert_eq!(
            *observed.borrow(),
            vec![vec!["one".to_string()], vec!["one".to_string(), "two.txt".to_string()]]
        );
    }

    #[test]
    fn handlers_cannot_mutate_mid_emit() {
        let bus = ChangeBus::new();
        let store = Rc::new(VfsStore::new(bus.clone()));
        let weak = Rc::downgrade(&store);
        let outcome = Rc::new(RefCell::new(None));
        let outcome2 = Rc::clone(&outcome);
        let _sub = bus.subscribe(move |_| {
            if let Some(store) = weak.upgrade() {
                if outcome2.borrow().is_none() {
                    let result = store.mkdir("/sneaky").map_err(|e| e.kind());
                    *outcome2.borrow_mut() = Some(result);
                }
            }
            Ok(())
        });
        store.mkdir("/legit").unwrap();
        assert_eq!(*outcome.borrow(), Some(Err(ErrorKind::InvalidOperation)));
        assert!(!store.exists("/sneaky"));
        assert!(store.exists("/legit"));
    }

    #[test]
    fn handlers_of_other_events_may_write() {
        let bus = ChangeBus::new();
        let store = Rc::new(VfsStore::new(bus.clone()));
        let weak = Rc::downgrade(&store);
        let outcome = Rc::new(RefCell::new(None));
        let outcome2 = Rc::clone(&outcome);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        let _sub = bus.subscribe(move |event| {
            seen2.borrow_mut().push(event.type_name());
            if let ChangeEvent::AppInstalled { app_id } = event {
                if let Some(store) = weak.upgrade() {
                    let path = format!("/{app_id}.app");
                    *outcome2.borrow_mut() = Some(store.write_file(&path, "x").map_err(|e| e.kind()));
                }
            }
            Ok(())
        });

        bus.emit(ChangeEvent::AppInstalled {
            app_id: "notes".into(),
        });
        assert_eq!(*outcome.borrow(), Some(Ok(())));
        assert_eq!(store.read_file("/notes.app").unwrap(), "x");
        assert_eq!(*seen.borrow(), vec!["app-installed", "file-change"]);
    }

    #[test]
    fn write_queued_by_other_event_still_guards_its_own_delivery() {
        let bus = ChangeBus::new();
        let store = Rc::new(VfsStore::new(bus.clone()));
        let weak = Rc::downgrade(&store);
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let outcomes2 = Rc::clone(&outcomes);
        let _sub = bus.subscribe(move |event| {
            let Some(store) = weak.upgrade() else {
                return Ok(());
            };
            let result = match event {
                ChangeEvent::WindowOpen { .. } => store.mkdir("/from-window"),
                _ if event.is_file_change() => store.mkdir("/from-file-change"),
                _ => return Ok(()),
            };
            outcomes2.borrow_mut().push(result.map_err(|e| e.kind()));
            Ok(())
        });

        bus.emit(ChangeEvent::WindowOpen {
            app_id: "editor".into(),
        });
        assert_eq!(
            *outcomes.borrow(),
            vec![Ok(()), Err(ErrorKind::InvalidOperation)]
        );
        assert!(store.exists("/from-window"));
        assert!(!store.exists("/from-file-change"));
    }

    #[test]
    fn snapshot_roundtrip_through_storage() {
        let storage = MemoryStorage::new();
        let (store, _count, _sub) = counting_store();
        store.mkdir("/home/aussie/Desktop").unwrap();
        store.write_file("/home/aussie/Desktop/todo.md", "- ship").unwrap();
        store.save_to(&storage, "mirage.vfs").unwrap();

        let (fresh, count, _sub2) = counting_store();
        assert!(fresh.restore_from(&storage, "mirage.vfs").unwrap());
        assert_eq!(count.get(), 1);
        assert_eq!(fresh.read_file("/home/aussie/Desktop/todo.md").unwrap(), "- ship");
        assert_eq!(fresh.walk("/"), store.walk("/"));
    }

    #[test]
    fn restore_from_missing_key_is_noop() {
        let storage = MemoryStorage::new();
        let (store, count, _sub) = counting_store();
        store.mkdir("/keep").unwrap();
        assert!(!store.restore_from(&storage, "mirage.vfs").unwrap());
        assert!(store.exists("/keep"));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn restore_from_corrupt_blob_is_noop() {
        let storage = MemoryStorage::new();
        storage.set("mirage.vfs", "{not json").unwrap();
        let (store, _count, _sub) = counting_store();
        store.mkdir("/keep").unwrap();
        assert!(!store.restore_from(&storage, "mirage.vfs").unwrap());
        assert!(store.exists("/keep"));
    }

    #[test]
    fn save_reports_storage_failure() {
        let storage = MemoryStorage::with_quota(4);
        let (store, _count, _sub) = counting_store();
        store.write_file("/big.txt", "0123456789").unwrap();
        let err = store.save_to(&storage, "mirage.vfs").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }
}
