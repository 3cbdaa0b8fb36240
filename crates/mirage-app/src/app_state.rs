use std::rc::Rc;

use anyhow::{Context, Result};
use mirage_bus::{ChangeBus, Subscription};
use mirage_desktop::Desktop;
use mirage_platform::{FileStorage, MemoryStorage, StorageService};
use mirage_types::config::MirageConfig;
use mirage_types::{ChangeEvent, Size};
use mirage_vfs::VfsStore;
use mirage_vfs::seed::populate_default_workspace;

/// Viewport used until the user issues `viewport`.
pub const DEFAULT_VIEWPORT: Size = Size::new(1280, 800);

/// Everything the command loop operates on.
pub struct AppState {
    pub config: MirageConfig,
    pub storage: Rc<dyn StorageService>,
    pub vfs: Rc<VfsStore>,
    pub desktop: Desktop,
    _notifications: Subscription<ChangeEvent>,
}

impl AppState {
    /// Build storage from config, restore the saved tree, seed anything
    /// missing and bring up the desktop.
    pub fn boot(config: MirageConfig) -> Result<Self> {
        let storage: Rc<dyn StorageService> = match &config.storage.dir {
            Some(dir) => {
                let storage = FileStorage::open(dir)
                    .with_context(|| format!("opening storage at {}", dir.display()))?;
                log::info!("Persisting to {}", dir.display());
                Rc::new(storage)
            },
            None => {
                log::info!("No storage directory configured; state is kept in memory");
                Rc::new(MemoryStorage::new())
            },
        };
        Self::boot_with(config, storage)
    }

    pub fn boot_with(config: MirageConfig, storage: Rc<dyn StorageService>) -> Result<Self> {
        let bus = ChangeBus::new();
        let notifications = bus.subscribe(|event| {
            if let ChangeEvent::Notification { title, message } = event {
                log::info!("[{title}] {message}");
            }
            Ok(())
        });

        let vfs = Rc::new(VfsStore::new(bus));
        if !vfs.restore_from(storage.as_ref(), &config.storage.vfs_key)? {
            log::info!("No saved workspace, starting fresh");
        }
        populate_default_workspace(&vfs, &config).context("seeding workspace")?;

        let desktop = Desktop::new(&config, Rc::clone(&vfs), Rc::clone(&storage), DEFAULT_VIEWPORT);
        Ok(Self {
            config,
            storage,
            vfs,
            desktop,
            _notifications: notifications,
        })
    }

    /// Write the whole VFS tree to storage.
    pub fn save(&self) -> Result<()> {
        self.vfs
            .save_to(self.storage.as_ref(), &self.config.storage.vfs_key)
            .context("saving workspace")?;
        Ok(())
    }

    /// Resolve a command argument: absolute paths pass through, anything
    /// else is taken relative to the desktop directory.
    pub fn resolve(&self, arg: &str) -> String {
        if arg.starts_with('/') {
            arg.to_string()
        } else {
            mirage_vfs::path::join(&self.config.desktop_root, arg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MirageConfig::default();
        config.storage.dir = Some(dir.path().to_path_buf());

        let app = AppState::boot(config.clone()).unwrap();
        app.vfs
            .write_file("/home/aussie/Desktop/plan.md", "ship it")
            .unwrap();
        app.desktop.widgets().set_wallpaper("dunes");
        app.save().unwrap();
        drop(app);

        let again = AppState::boot(config).unwrap();
        assert_eq!(
            again.vfs.read_file("/home/aussie/Desktop/plan.md").unwrap(),
            "ship it"
        );
        assert_eq!(again.desktop.render().wallpaper, "dunes");
    }

    #[test]
    fn relative_arguments_resolve_under_desktop() {
        let app = AppState::boot_with(MirageConfig::default(), Rc::new(MemoryStorage::new())).unwrap();
        assert_eq!(app.resolve("notes.txt"), "/home/aussie/Desktop/notes.txt");
        assert_eq!(app.resolve("/etc/hosts"), "/etc/hosts");
    }
}
