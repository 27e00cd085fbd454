//! Scrapping sessions: status, record type, duration accounting, and the
//! lifecycle state machine.

mod duration;
mod engine;

pub use duration::elapsed_active_seconds;
pub use engine::SessionEngine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Open sessions are the ones still accruing or holding time.
    /// At most one open session exists per owner.
    pub fn is_open(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timed work interval during which the owner accrues points
/// proportional to active (non-paused) duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub owner_id: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    /// Set iff the session is currently paused.
    pub last_paused_at: Option<DateTime<Utc>>,
    /// Whole seconds spent in already-closed pause intervals. Only ever
    /// grows; the interval of an open pause is folded in on resume.
    pub total_paused_secs: i64,
    /// Set iff the session is completed or cancelled.
    pub completed_at: Option<DateTime<Utc>>,
    /// Hourly rate snapshotted at creation; later rate changes do not
    /// apply retroactively.
    pub points_per_hour: i64,
}

impl Session {
    /// Active (non-paused) duration in whole seconds as of `reference`.
    pub fn active_secs(&self, reference: DateTime<Utc>) -> i64 {
        elapsed_active_seconds(
            self.started_at,
            self.status,
            self.last_paused_at,
            self.total_paused_secs,
            reference,
            self.completed_at,
        )
    }

    /// Total paused seconds with any still-open pause interval included,
    /// as of `reference`.
    pub fn paused_secs(&self, reference: DateTime<Utc>) -> i64 {
        match (self.status, self.last_paused_at) {
            (SessionStatus::Paused, Some(since)) => {
                self.total_paused_secs
                    + reference.signed_duration_since(since).num_seconds().max(0)
            }
            _ => self.total_paused_secs,
        }
    }
}
