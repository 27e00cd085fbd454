//! Pure active-duration accounting.
//!
//! There is no running clock anywhere in the engine: elapsed time is
//! recomputed from stored timestamps on every read, so the math here is
//! the single source of truth for "how long has this session worked".

use chrono::{DateTime, Utc};

use super::SessionStatus;

/// Active (non-paused) seconds a session has accrued.
///
/// The wall-clock endpoint is picked in priority order: `completed_at`
/// when set, the pause start when the session is paused (time stops the
/// instant a pause begins), otherwise `reference`. Already-banked pause
/// time is then subtracted and the result clamped at zero. Sub-second
/// remainders floor.
pub fn elapsed_active_seconds(
    started_at: DateTime<Utc>,
    status: SessionStatus,
    last_paused_at: Option<DateTime<Utc>>,
    total_paused_secs: i64,
    reference: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
) -> i64 {
    let end = match (completed_at, status) {
        (Some(done), _) => done,
        (None, SessionStatus::Paused) => last_paused_at.unwrap_or(reference),
        (None, _) => reference,
    };
    let wall_secs = end.signed_duration_since(started_at).num_seconds();
    (wall_secs - total_paused_secs).max(0)
}
