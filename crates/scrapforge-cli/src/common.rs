//! Shared helpers for CLI commands.

use scrapforge_core::{Session, SessionEngine};

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The user's open session, or a readable error when there is none.
pub fn require_open_session(
    engine: &SessionEngine,
    user: &str,
) -> Result<Session, Box<dyn std::error::Error>> {
    Ok(engine
        .current(user)?
        .ok_or_else(|| format!("no open session for '{user}'"))?)
}
