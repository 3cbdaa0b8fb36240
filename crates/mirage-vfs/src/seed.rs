//! First-boot workspace content.

use mirage_types::config::MirageConfig;
use mirage_types::error::Result;

use crate::VfsStore;
use crate::path::join;

const WELCOME: &str = "Welcome to mirage!\n\n\
Everything you see lives in an in-memory workspace.\n\
Drag icons around the desktop; use \"reset\" to restore the grid.\n";

const WORKSPACE_README: &str = "# Workspace\n\nProjects created here show up in the project manager.\n";

/// Create the home, desktop and workspace directories plus a few starter
/// files. Anything that already exists is left alone, so this is safe to
/// run after restoring a snapshot.
pub fn populate_default_workspace(store: &VfsStore, config: &MirageConfig) -> Result<()> {
    ensure_dir(store, &config.desktop_root)?;
    ensure_dir(store, &config.workspace_root)?;

    ensure_file(store, &join(&config.desktop_root, "Welcome.txt"), WELCOME)?;
    ensure_dir(store, &join(&config.desktop_root, "Projects"))?;
    ensure_file(
        store,
        &join(&config.workspace_root, "README.md"),
        WORKSPACE_README,
    )?;
    log::info!(
        "Workspace ready: desktop at {}, projects at {}",
        config.desktop_root,
        config.workspace_root
    );
    Ok(())
}

fn ensure_dir(store: &VfsStore, path: &str) -> Result<()> {
    if store.exists(path) {
        return Ok(());
    }
    store.mkdir(path)
}

fn ensure_file(store: &VfsStore, path: &str, content: &str) -> Result<()> {
    if store.exists(path) {
        return Ok(());
    }
    store.write_file(path, content)
}
