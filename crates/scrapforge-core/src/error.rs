//! Engine error taxonomy.
//!
//! Domain failures are typed so the (out-of-scope) transport layer can map
//! them to user-facing responses. Storage failures pass through the
//! transparent variant unwrapped, so callers can tell a domain violation
//! from infrastructure trouble.

use thiserror::Error;

use crate::ledger::TransactionStatus;
use crate::session::SessionStatus;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("user '{0}' already has an active or paused session")]
    SessionAlreadyStarted(String),

    #[error("session {id} is {status}; cannot {action}")]
    InvalidSessionState {
        id: i64,
        status: SessionStatus,
        action: &'static str,
    },

    #[error("session {id} has {active_secs}s of active time; {required_secs}s required")]
    InsufficientSessionDuration {
        id: i64,
        active_secs: i64,
        required_secs: i64,
    },

    #[error("scrap {0} not found")]
    ScrapNotFound(i64),

    #[error("transaction {0} not found")]
    TransactionNotFound(i64),

    #[error("user '{0}' may not review their own transaction")]
    SelfReview(String),

    #[error("transaction {id} is {status}; only pending transactions can be reviewed")]
    TransactionNotPending { id: i64, status: TransactionStatus },

    #[error("vote {0} not found")]
    VoteNotFound(i64),

    #[error("user '{user_id}' has cast {votes} votes in the last hour (limit {limit})")]
    VoteLimitReached {
        user_id: String,
        votes: i64,
        limit: i64,
    },

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("user '{0}' is not an organizer")]
    NotOrganizer(String),

    /// Unexpected persistence failure, propagated unwrapped.
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
