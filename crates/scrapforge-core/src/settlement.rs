//! Canonical point-rate table and settlement math.
//!
//! Rates live here and only here; other modules import them instead of
//! keeping local copies. All duration-to-point conversions floor toward
//! zero, done in integer arithmetic so sub-point remainders are dropped
//! exactly rather than through float rounding.

/// Points credited per hour of active session time.
pub const BASE_POINTS_PER_HOUR: i64 = 100;

/// Flat points credited to the voter for each vote cast.
pub const VOTER_POINTS_PER_VOTE: i64 = 1;

/// Points credited to a scrap's creator per vote received, per hour of
/// active time in the session that produced the scrap.
pub const CREATOR_POINTS_PER_HOUR_PER_VOTE: i64 = 2;

/// Votes allowed per user in any trailing 60-minute window.
pub const MAX_VOTES_PER_HOUR: i64 = 5;

/// Minimum active session time before a scrap may be submitted.
pub const MIN_SCRAP_SESSION_SECS: i64 = 15 * 60;

/// `floor(active_secs / 3600 * points_per_hour)` without going through
/// floats. Non-positive inputs settle zero points.
pub fn session_points(active_secs: i64, points_per_hour: i64) -> i64 {
    if active_secs <= 0 || points_per_hour <= 0 {
        return 0;
    }
    active_secs * points_per_hour / 3600
}

/// Creator-side award for one vote on a scrap whose producing session had
/// `session_active_secs` of active time.
pub fn creator_vote_points(session_active_secs: i64) -> i64 {
    session_points(session_active_secs, CREATOR_POINTS_PER_HOUR_PER_VOTE)
}

/// Fractional hours, for human-readable settlement reasons.
pub fn active_hours(active_secs: i64) -> f64 {
    active_secs.max(0) as f64 / 3600.0
}
