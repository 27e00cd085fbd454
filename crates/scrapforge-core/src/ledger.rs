//! Append-only points ledger with a review workflow.
//!
//! Entries are never removed from storage; "deleted" is a status. A
//! balance is always derived by aggregation over the non-rejected,
//! non-deleted entries at read time, never kept as a cached running
//! total, so independent workflows writing concurrently cannot produce
//! lost-update drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actor::Actor;
use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Deleted,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Deleted => "deleted",
        }
    }

    /// Once an entry leaves `Pending` it is terminal, with one exception:
    /// `Deleted` may supersede `Approved` (see [`Ledger::review`]).
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Pending and approved entries count toward a balance.
    pub fn counts_toward_balance(self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Approved)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer decision applied to a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
    Delete,
}

impl ReviewDecision {
    pub fn resulting_status(self) -> TransactionStatus {
        match self {
            ReviewDecision::Approve => TransactionStatus::Approved,
            ReviewDecision::Reject => TransactionStatus::Rejected,
            ReviewDecision::Delete => TransactionStatus::Deleted,
        }
    }
}

/// One point credit or debit in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: i64,
    /// Beneficiary of the entry.
    pub user_id: String,
    /// Signed; negative amounts model debits such as shop purchases.
    pub amount: i64,
    pub reason: String,
    /// Who or what caused the entry; equals `user_id` for self-awarded
    /// session and vote settlements.
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub status: TransactionStatus,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

/// Insert payload for a new ledger entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub amount: i64,
    pub reason: String,
    pub author_id: String,
    pub status: TransactionStatus,
}

impl NewTransaction {
    /// Entry awaiting organizer review (awards, quests, purchases).
    pub fn pending(
        user_id: impl Into<String>,
        amount: i64,
        reason: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            reason: reason.into(),
            author_id: author_id.into(),
            status: TransactionStatus::Pending,
        }
    }

    /// Self-awarded entry the system already judged correct (session or
    /// vote settlement); bypasses review entirely.
    pub fn approved(
        user_id: impl Into<String>,
        amount: i64,
        reason: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            reason: reason.into(),
            author_id: author_id.into(),
            status: TransactionStatus::Approved,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub balance: i64,
}

/// Ledger service over an injected store and clock.
pub struct Ledger<'a> {
    store: &'a Store,
    clock: &'a dyn Clock,
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a Store, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Append an entry. The amount's sign is not validated.
    pub fn record(&self, entry: NewTransaction) -> Result<PointTransaction> {
        let recorded = self.store.insert_transaction(&entry, self.clock.now())?;
        debug!(
            transaction = recorded.id,
            user = %recorded.user_id,
            amount = recorded.amount,
            status = %recorded.status,
            "transaction recorded"
        );
        Ok(recorded)
    }

    /// Live aggregate over all non-rejected, non-deleted entries.
    pub fn balance(&self, user_id: &str) -> Result<i64> {
        Ok(self.store.balance(user_id)?)
    }

    /// Apply an organizer decision to an entry.
    ///
    /// Reviewing your own entry fails with `SelfReview` regardless of
    /// status or decision. Terminal entries cannot be re-reviewed, except
    /// that `Delete` may supersede `Approved` to retroactively void an
    /// incorrect award (vote invalidation relies on this).
    pub fn review(
        &self,
        transaction_id: i64,
        reviewer: &Actor,
        decision: ReviewDecision,
        rejection_reason: Option<&str>,
    ) -> Result<PointTransaction> {
        reviewer.require_organizer()?;
        let tx = self
            .store
            .transaction(transaction_id)?
            .ok_or(EngineError::TransactionNotFound(transaction_id))?;
        if tx.user_id == reviewer.user_id {
            return Err(EngineError::SelfReview(reviewer.user_id.clone()));
        }
        let supersedes_approved =
            tx.status == TransactionStatus::Approved && decision == ReviewDecision::Delete;
        if tx.status.is_terminal() && !supersedes_approved {
            return Err(EngineError::TransactionNotPending {
                id: tx.id,
                status: tx.status,
            });
        }
        let updated = self.store.apply_review(
            transaction_id,
            decision.resulting_status(),
            &reviewer.user_id,
            self.clock.now(),
            rejection_reason,
        )?;
        debug!(
            transaction = transaction_id,
            reviewer = %reviewer.user_id,
            status = %updated.status,
            "transaction reviewed"
        );
        Ok(updated)
    }

    /// Entries awaiting review, oldest first.
    pub fn pending(&self) -> Result<Vec<PointTransaction>> {
        Ok(self.store.pending_transactions()?)
    }

    /// A user's full transaction history, newest first.
    pub fn history(&self, user_id: &str) -> Result<Vec<PointTransaction>> {
        Ok(self.store.transactions_by_user(user_id)?)
    }

    /// All users ranked by balance, highest first.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        Ok(self.store.leaderboard()?)
    }
}
