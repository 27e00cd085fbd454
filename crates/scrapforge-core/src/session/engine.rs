//! Session lifecycle state machine.
//!
//! ## State Transitions
//!
//! ```text
//! start -> Active <-> Paused -> (Completed | Cancelled)
//! ```
//!
//! Transitions are validated against the stored status and timed by the
//! injected clock. Completing a session folds any pending pause interval
//! and settles points in the same storage transaction that finalizes the
//! row, so a crash cannot leave points settled against a stale duration.

use tracing::debug;

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::ledger::{NewTransaction, PointTransaction};
use crate::settlement::{self, BASE_POINTS_PER_HOUR};
use crate::store::Store;

use super::{elapsed_active_seconds, Session, SessionStatus};

/// Lifecycle state machine over an injected store and clock.
pub struct SessionEngine<'a> {
    store: &'a Store,
    clock: &'a dyn Clock,
    points_per_hour: i64,
}

impl<'a> SessionEngine<'a> {
    pub fn new(store: &'a Store, clock: &'a dyn Clock) -> Self {
        Self::with_rate(store, clock, BASE_POINTS_PER_HOUR)
    }

    /// Override the hourly rate snapshotted onto new sessions.
    pub fn with_rate(store: &'a Store, clock: &'a dyn Clock, points_per_hour: i64) -> Self {
        Self {
            store,
            clock,
            points_per_hour,
        }
    }

    /// Start a session for `owner_id`. Fails when the owner already has
    /// an open (active or paused) one.
    pub fn start(&self, owner_id: &str) -> Result<Session> {
        if self.store.find_open_session(owner_id)?.is_some() {
            return Err(EngineError::SessionAlreadyStarted(owner_id.to_string()));
        }
        match self
            .store
            .insert_session(owner_id, self.clock.now(), self.points_per_hour)
        {
            Ok(session) => {
                debug!(session = session.id, owner = owner_id, "session started");
                Ok(session)
            }
            // Lost the race against a concurrent start; the partial
            // unique index over open sessions is the arbiter.
            Err(e) if Store::is_unique_violation(&e) => {
                Err(EngineError::SessionAlreadyStarted(owner_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The owner's open session, if any.
    pub fn current(&self, owner_id: &str) -> Result<Option<Session>> {
        Ok(self.store.find_open_session(owner_id)?)
    }

    pub fn pause(&self, id: i64) -> Result<Session> {
        let session = self.load(id)?;
        if session.status != SessionStatus::Active {
            return Err(EngineError::InvalidSessionState {
                id,
                status: session.status,
                action: "pause",
            });
        }
        let paused = self.store.set_paused(id, self.clock.now())?;
        debug!(session = id, "session paused");
        Ok(paused)
    }

    /// Resume a paused session, banking the pause interval. Resuming an
    /// already-active session is a no-op.
    pub fn resume(&self, id: i64) -> Result<Session> {
        let session = self.load(id)?;
        match session.status {
            SessionStatus::Active => Ok(session),
            SessionStatus::Paused => {
                let folded = session.paused_secs(self.clock.now());
                let resumed = self.store.set_resumed(id, folded)?;
                debug!(session = id, total_paused_secs = folded, "session resumed");
                Ok(resumed)
            }
            status => Err(EngineError::InvalidSessionState {
                id,
                status,
                action: "resume",
            }),
        }
    }

    /// Complete an open session and settle its points.
    ///
    /// A pending pause interval is folded first, then the active duration
    /// is converted at the session's snapshotted rate. A duration worth
    /// zero points settles no transaction at all.
    pub fn complete(&self, id: i64) -> Result<(Session, Option<PointTransaction>)> {
        let session = self.load(id)?;
        if !session.status.is_open() {
            return Err(EngineError::InvalidSessionState {
                id,
                status: session.status,
                action: "complete",
            });
        }
        let now = self.clock.now();
        let total_paused = session.paused_secs(now);
        let active_secs = elapsed_active_seconds(
            session.started_at,
            SessionStatus::Active,
            None,
            total_paused,
            now,
            None,
        );
        let points = settlement::session_points(active_secs, session.points_per_hour);
        let entry = (points > 0).then(|| {
            NewTransaction::approved(
                session.owner_id.clone(),
                points,
                format!(
                    "scrapping session ({:.2}h active)",
                    settlement::active_hours(active_secs)
                ),
                session.owner_id.clone(),
            )
        });
        // The store only finalizes a still-open row, so a finalization
        // that raced past the status check above loses here instead of
        // settling twice.
        let Some((session, settled)) = self.store.finalize_session(
            id,
            SessionStatus::Completed,
            total_paused,
            now,
            entry.as_ref(),
        )?
        else {
            return Err(self.already_finalized(id, "complete"));
        };
        debug!(session = id, points, "session completed");
        Ok((session, settled))
    }

    /// Cancel an open session. No points are settled.
    pub fn cancel(&self, id: i64) -> Result<Session> {
        let session = self.load(id)?;
        if !session.status.is_open() {
            return Err(EngineError::InvalidSessionState {
                id,
                status: session.status,
                action: "cancel",
            });
        }
        let now = self.clock.now();
        let total_paused = session.paused_secs(now);
        let Some((session, _)) =
            self.store
                .finalize_session(id, SessionStatus::Cancelled, total_paused, now, None)?
        else {
            return Err(self.already_finalized(id, "cancel"));
        };
        debug!(session = id, "session cancelled");
        Ok(session)
    }

    fn load(&self, id: i64) -> Result<Session> {
        self.store
            .session(id)?
            .ok_or(EngineError::SessionNotFound(id))
    }

    /// Error for a finalization that found the row already terminal,
    /// reported with whatever status the winner left behind.
    fn already_finalized(&self, id: i64, action: &'static str) -> EngineError {
        match self.store.session(id) {
            Ok(Some(session)) => EngineError::InvalidSessionState {
                id,
                status: session.status,
                action,
            },
            Ok(None) => EngineError::SessionNotFound(id),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use crate::clock::ManualClock;
    use crate::ledger::TransactionStatus;

    use super::*;

    fn setup() -> (Store, ManualClock) {
        let store = Store::open_memory().unwrap();
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        (store, clock)
    }

    #[test]
    fn lifecycle_with_pause_settles_floored_points() {
        let (store, clock) = setup();
        let engine = SessionEngine::with_rate(&store, &clock, 10);

        let session = engine.start("ada").unwrap();
        clock.advance_secs(30 * 60);
        engine.pause(session.id).unwrap();
        clock.advance_secs(5 * 60);
        engine.resume(session.id).unwrap();
        clock.advance_secs(60 * 60);

        // 95 min wall, 5 min paused -> 90 min active -> floor(1.5 * 10).
        let (done, settled) = engine.complete(session.id).unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.total_paused_secs, 300);
        assert!(done.completed_at.is_some());
        assert_eq!(done.active_secs(clock.now()), 90 * 60);

        let tx = settled.unwrap();
        assert_eq!(tx.amount, 15);
        assert_eq!(tx.status, TransactionStatus::Approved);
        assert_eq!(tx.user_id, "ada");
        assert_eq!(tx.author_id, "ada");
        assert_eq!(store.balance("ada").unwrap(), 15);
    }

    #[test]
    fn zero_duration_completion_settles_nothing() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        let (done, settled) = engine.complete(session.id).unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert!(settled.is_none());
        assert!(store.transactions_by_user("ada").unwrap().is_empty());
    }

    #[test]
    fn second_start_rejected_while_open() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        engine.start("ada").unwrap();
        assert!(matches!(
            engine.start("ada"),
            Err(EngineError::SessionAlreadyStarted(_))
        ));
        // Other owners are unaffected.
        engine.start("grace").unwrap();
    }

    #[test]
    fn start_allowed_again_after_terminal() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let first = engine.start("ada").unwrap();
        engine.cancel(first.id).unwrap();
        engine.start("ada").unwrap();
    }

    #[test]
    fn double_pause_rejected() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        engine.pause(session.id).unwrap();
        assert!(matches!(
            engine.pause(session.id),
            Err(EngineError::InvalidSessionState { action: "pause", .. })
        ));
    }

    #[test]
    fn resume_of_active_session_is_noop() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        clock.advance_secs(60);
        let resumed = engine.resume(session.id).unwrap();
        assert_eq!(resumed.total_paused_secs, 0);
        assert!(resumed.last_paused_at.is_none());
        assert_eq!(resumed.status, SessionStatus::Active);
    }

    #[test]
    fn repeated_pause_resume_accumulates() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        for _ in 0..3 {
            clock.advance_secs(100);
            engine.pause(session.id).unwrap();
            clock.advance_secs(40);
            engine.resume(session.id).unwrap();
        }
        let current = engine.current("ada").unwrap().unwrap();
        assert_eq!(current.total_paused_secs, 120);
        assert_eq!(current.active_secs(clock.now()), 300);
    }

    #[test]
    fn complete_while_paused_folds_pending_interval() {
        let (store, clock) = setup();
        let engine = SessionEngine::with_rate(&store, &clock, 3600);
        let session = engine.start("ada").unwrap();
        clock.advance_secs(600);
        engine.pause(session.id).unwrap();
        clock.advance_secs(300);
        let (done, settled) = engine.complete(session.id).unwrap();
        assert_eq!(done.total_paused_secs, 300);
        // 600s active at 3600 points/hour.
        assert_eq!(settled.unwrap().amount, 600);
    }

    #[test]
    fn transitions_on_missing_session() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        assert!(matches!(
            engine.pause(404),
            Err(EngineError::SessionNotFound(404))
        ));
        assert!(matches!(
            engine.complete(404),
            Err(EngineError::SessionNotFound(404))
        ));
    }

    #[test]
    fn terminal_sessions_are_immutable() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        engine.complete(session.id).unwrap();
        assert!(matches!(
            engine.resume(session.id),
            Err(EngineError::InvalidSessionState { .. })
        ));
        assert!(matches!(
            engine.cancel(session.id),
            Err(EngineError::InvalidSessionState { .. })
        ));
        assert!(matches!(
            engine.complete(session.id),
            Err(EngineError::InvalidSessionState { .. })
        ));
    }

    #[test]
    fn racing_completion_settles_once() {
        let (store, clock) = setup();
        let engine = SessionEngine::with_rate(&store, &clock, 3600);
        let session = engine.start("ada").unwrap();
        clock.advance_secs(600);
        engine.complete(session.id).unwrap();
        assert_eq!(store.balance("ada").unwrap(), 600);

        // A rival that read the row open before the winner committed
        // finds nothing left to finalize and settles no second award.
        let entry = NewTransaction::approved("ada", 600, "session", "ada");
        let rival = store
            .finalize_session(
                session.id,
                SessionStatus::Completed,
                0,
                clock.now(),
                Some(&entry),
            )
            .unwrap();
        assert!(rival.is_none());
        assert_eq!(store.balance("ada").unwrap(), 600);
        assert!(matches!(
            engine.complete(session.id),
            Err(EngineError::InvalidSessionState { action: "complete", .. })
        ));
    }

    #[test]
    fn cancel_settles_no_points() {
        let (store, clock) = setup();
        let engine = SessionEngine::with_rate(&store, &clock, 100);
        let session = engine.start("ada").unwrap();
        clock.advance_secs(7200);
        let cancelled = engine.cancel(session.id).unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());
        assert_eq!(store.balance("ada").unwrap(), 0);
    }

    #[test]
    fn current_returns_open_session_only() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        assert!(engine.current("ada").unwrap().is_none());
        let session = engine.start("ada").unwrap();
        engine.pause(session.id).unwrap();
        assert_eq!(engine.current("ada").unwrap().unwrap().id, session.id);
        engine.complete(session.id).unwrap();
        assert!(engine.current("ada").unwrap().is_none());
    }

    #[test]
    fn concurrent_start_loses_to_unique_index() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        engine.start("ada").unwrap();
        // Simulate a racing start that passed the existence check before
        // the first insert landed: the index rejects the second row.
        let err = store
            .insert_session("ada", clock.now(), BASE_POINTS_PER_HOUR)
            .unwrap_err();
        assert!(Store::is_unique_violation(&err));
    }
}
