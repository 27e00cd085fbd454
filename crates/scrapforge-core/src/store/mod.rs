//! Persistence layer: sqlite-backed repository for sessions, scraps,
//! votes, and point transactions.
//!
//! A [`Store`] is constructed explicitly and passed down to the services
//! that need it; there are no module-level singletons.

mod database;

pub use database::Store;

use std::path::PathBuf;

/// Directory holding the on-disk database, created on first use.
///
/// Defaults to `~/.config/scrapforge/`. With `SCRAPFORGE_ENV=dev` it
/// becomes `~/.config/scrapforge-dev/`, keeping development data away
/// from the real ledger.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let name = match std::env::var("SCRAPFORGE_ENV").as_deref() {
        Ok("dev") => "scrapforge-dev",
        _ => "scrapforge",
    };
    let dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
