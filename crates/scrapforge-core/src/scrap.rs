//! Scraps: work artifacts produced inside a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::settlement::{self, MIN_SCRAP_SESSION_SECS};
use crate::store::Store;

/// A submitted work artifact, eligible for comparison voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scrap {
    pub id: i64,
    pub session_id: i64,
    pub title: String,
    pub description: String,
    pub attachment_urls: Vec<String>,
    /// Settlement value of the producing session at submission time.
    pub base_points: i64,
    /// Base plus accumulated vote bonuses; never drops below
    /// `base_points`. Mutated only by vote settlement and invalidation.
    pub total_points: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new scrap.
#[derive(Debug, Clone)]
pub struct NewScrap {
    pub session_id: i64,
    pub title: String,
    pub description: String,
    pub attachment_urls: Vec<String>,
}

/// Scrap submission and lookup over an injected store and clock.
pub struct ScrapBoard<'a> {
    store: &'a Store,
    clock: &'a dyn Clock,
}

impl<'a> ScrapBoard<'a> {
    pub fn new(store: &'a Store, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Submit a scrap against a session, which must have accrued at least
    /// [`MIN_SCRAP_SESSION_SECS`] of active time.
    pub fn submit(&self, scrap: NewScrap) -> Result<Scrap> {
        let session = self
            .store
            .session(scrap.session_id)?
            .ok_or(EngineError::SessionNotFound(scrap.session_id))?;
        let now = self.clock.now();
        let active_secs = session.active_secs(now);
        if active_secs < MIN_SCRAP_SESSION_SECS {
            return Err(EngineError::InsufficientSessionDuration {
                id: session.id,
                active_secs,
                required_secs: MIN_SCRAP_SESSION_SECS,
            });
        }
        let base_points = settlement::session_points(active_secs, session.points_per_hour);
        Ok(self.store.insert_scrap(&scrap, base_points, now)?)
    }

    pub fn get(&self, id: i64) -> Result<Scrap> {
        self.store.scrap(id)?.ok_or(EngineError::ScrapNotFound(id))
    }

    pub fn by_session(&self, session_id: i64) -> Result<Vec<Scrap>> {
        Ok(self.store.scraps_by_session(session_id)?)
    }

    /// Two distinct random scraps not owned by `voter_id`, for a
    /// comparison vote. `None` when fewer than two candidates exist.
    /// Self-voting is prevented here, at the query level.
    pub fn random_pair_for(&self, voter_id: &str) -> Result<Option<(Scrap, Scrap)>> {
        Ok(self.store.random_scrap_pair(voter_id)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use crate::clock::ManualClock;
    use crate::session::SessionEngine;

    use super::*;

    fn setup() -> (Store, ManualClock) {
        let store = Store::open_memory().unwrap();
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        (store, clock)
    }

    fn new_scrap(session_id: i64, title: &str) -> NewScrap {
        NewScrap {
            session_id,
            title: title.to_string(),
            description: String::new(),
            attachment_urls: vec!["https://example.test/shot.png".to_string()],
        }
    }

    #[test]
    fn short_session_rejected() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let board = ScrapBoard::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        clock.advance_secs(MIN_SCRAP_SESSION_SECS - 1);
        assert!(matches!(
            board.submit(new_scrap(session.id, "too soon")),
            Err(EngineError::InsufficientSessionDuration { .. })
        ));
        clock.advance_secs(1);
        board.submit(new_scrap(session.id, "just enough")).unwrap();
    }

    #[test]
    fn paused_time_does_not_count_toward_gate() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let board = ScrapBoard::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        clock.advance_secs(60);
        engine.pause(session.id).unwrap();
        clock.advance_secs(MIN_SCRAP_SESSION_SECS * 2);
        assert!(matches!(
            board.submit(new_scrap(session.id, "mostly paused")),
            Err(EngineError::InsufficientSessionDuration { .. })
        ));
    }

    #[test]
    fn base_points_snapshot_current_settlement_value() {
        let (store, clock) = setup();
        let engine = SessionEngine::with_rate(&store, &clock, 100);
        let board = ScrapBoard::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        clock.advance_secs(1800);
        let scrap = board.submit(new_scrap(session.id, "half hour in")).unwrap();
        assert_eq!(scrap.base_points, 50);
        assert_eq!(scrap.total_points, 50);
        assert_eq!(board.get(scrap.id).unwrap().attachment_urls.len(), 1);
    }

    #[test]
    fn random_pair_excludes_own_scraps() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let board = ScrapBoard::new(&store, &clock);
        for owner in ["ada", "bob", "eve"] {
            let session = engine.start(owner).unwrap();
            clock.advance_secs(MIN_SCRAP_SESSION_SECS);
            board
                .submit(new_scrap(session.id, &format!("{owner}'s work")))
                .unwrap();
            engine.complete(session.id).unwrap();
        }
        let ada_sessions: Vec<i64> = board
            .random_pair_for("ada")
            .unwrap()
            .map(|(a, b)| vec![a.session_id, b.session_id])
            .unwrap();
        for session_id in ada_sessions {
            let session = store.session(session_id).unwrap().unwrap();
            assert_ne!(session.owner_id, "ada");
        }
        // Only two foreign scraps exist for bob's pair as well.
        assert!(board.random_pair_for("bob").unwrap().is_some());
    }

    #[test]
    fn no_pair_with_fewer_than_two_candidates() {
        let (store, clock) = setup();
        let engine = SessionEngine::new(&store, &clock);
        let board = ScrapBoard::new(&store, &clock);
        let session = engine.start("ada").unwrap();
        clock.advance_secs(MIN_SCRAP_SESSION_SECS);
        board.submit(new_scrap(session.id, "only scrap")).unwrap();
        // One candidate for bob, zero for ada.
        assert!(board.random_pair_for("bob").unwrap().is_none());
        assert!(board.random_pair_for("ada").unwrap().is_none());
    }
}
