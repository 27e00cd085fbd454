//! Comparison voting: rate limiting, settlement, and invalidation.
//!
//! A vote settles two independent ledger entries so the voter's and the
//! creator's awards can be reviewed or voided separately. The rate limit
//! is a trailing 60-minute sliding window recomputed from vote timestamps
//! on every call, not a fixed bucket.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::actor::Actor;
use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::ledger::{Ledger, NewTransaction, PointTransaction, ReviewDecision};
use crate::settlement::{self, MAX_VOTES_PER_HOUR, VOTER_POINTS_PER_VOTE};
use crate::store::Store;

/// A recorded comparison vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub voter_id: String,
    /// The scrap the voter picked.
    pub scrap_id: i64,
    /// The paired alternative shown alongside it.
    pub other_scrap_id: i64,
    /// Creator-side award this vote settled onto the scrap.
    pub points_awarded: i64,
    pub created_at: DateTime<Utc>,
    pub voter_tx_id: Option<i64>,
    pub creator_tx_id: Option<i64>,
}

/// Result of casting a vote: the vote row plus the ledger entries it
/// settled.
#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub vote: Vote,
    pub voter_tx: PointTransaction,
    pub creator_tx: Option<PointTransaction>,
}

/// Outcome of invalidating a vote.
///
/// Settlement entries that could not be voided are reported here rather
/// than aborting the cleanup; the vote row is removed regardless, so
/// callers can decide whether partial cleanup deserves a warning.
#[derive(Debug)]
pub struct VoteInvalidation {
    pub vote_id: i64,
    pub deleted_vote: bool,
    pub transaction_errors: Vec<(i64, EngineError)>,
}

/// Voting workflows over an injected store and clock.
pub struct VotingDesk<'a> {
    store: &'a Store,
    clock: &'a dyn Clock,
}

impl<'a> VotingDesk<'a> {
    pub fn new(store: &'a Store, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Votes cast by `user_id` in the trailing 60-minute window.
    pub fn votes_in_last_hour(&self, user_id: &str) -> Result<i64> {
        let since = self.clock.now() - Duration::hours(1);
        Ok(self.store.count_votes_since(user_id, since)?)
    }

    /// Oldest in-window vote time, for "next vote available at"
    /// countdowns. `None` when the window is empty.
    pub fn oldest_vote_in_last_hour(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let since = self.clock.now() - Duration::hours(1);
        Ok(self.store.oldest_vote_since(user_id, since)?)
    }

    /// Cast a vote for `scrap_id` over `other_scrap_id`.
    ///
    /// The voter earns a flat [`VOTER_POINTS_PER_VOTE`]; the scrap's
    /// creator earns points proportional to the active duration of the
    /// session that produced the scrap. Both entries are pre-approved and
    /// written, together with the vote row and the scrap's bonus bump, in
    /// one storage transaction. A creator award of zero settles no entry,
    /// same as session settlement.
    pub fn cast(&self, voter: &Actor, scrap_id: i64, other_scrap_id: i64) -> Result<VoteOutcome> {
        let votes = self.votes_in_last_hour(&voter.user_id)?;
        if votes >= MAX_VOTES_PER_HOUR {
            return Err(EngineError::VoteLimitReached {
                user_id: voter.user_id.clone(),
                votes,
                limit: MAX_VOTES_PER_HOUR,
            });
        }
        let scrap = self
            .store
            .scrap(scrap_id)?
            .ok_or(EngineError::ScrapNotFound(scrap_id))?;
        let session = self
            .store
            .session(scrap.session_id)?
            .ok_or(EngineError::SessionNotFound(scrap.session_id))?;
        let now = self.clock.now();
        let creator_points = settlement::creator_vote_points(session.active_secs(now));
        let voter_entry = NewTransaction::approved(
            voter.user_id.clone(),
            VOTER_POINTS_PER_VOTE,
            format!("vote on scrap {scrap_id}"),
            voter.user_id.clone(),
        );
        let creator_entry = (creator_points > 0).then(|| {
            NewTransaction::approved(
                session.owner_id.clone(),
                creator_points,
                format!("vote received on scrap {scrap_id}"),
                voter.user_id.clone(),
            )
        });
        Ok(self.store.record_vote(
            &voter.user_id,
            scrap_id,
            other_scrap_id,
            creator_points,
            now,
            &voter_entry,
            creator_entry.as_ref(),
        )?)
    }

    /// Void an incorrect vote: mark its linked ledger entries deleted,
    /// roll the creator bonus back off the scrap, and remove the vote
    /// row. Entry deletions that fail are logged and collected, not
    /// fatal, so the cleanup always finishes.
    pub fn invalidate(&self, vote_id: i64, reviewer: &Actor) -> Result<VoteInvalidation> {
        reviewer.require_organizer()?;
        let vote = self
            .store
            .vote(vote_id)?
            .ok_or(EngineError::VoteNotFound(vote_id))?;
        let ledger = Ledger::new(self.store, self.clock);
        let mut transaction_errors = Vec::new();
        for tx_id in [vote.voter_tx_id, vote.creator_tx_id].into_iter().flatten() {
            if let Err(e) = ledger.review(tx_id, reviewer, ReviewDecision::Delete, None) {
                warn!(
                    vote = vote_id,
                    transaction = tx_id,
                    error = %e,
                    "failed to void settlement entry during vote invalidation"
                );
                transaction_errors.push((tx_id, e));
            }
        }
        self.store.remove_vote(&vote)?;
        Ok(VoteInvalidation {
            vote_id,
            deleted_vote: true,
            transaction_errors,
        })
    }
}
