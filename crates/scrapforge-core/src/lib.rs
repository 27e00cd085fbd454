//! # Scrapforge Core Library
//!
//! This library provides the engine for a gamified event platform: users
//! run timed "scrapping" sessions, submit scraps (work artifacts), vote
//! on each other's work, and accrue points in a reviewed ledger. A thin
//! request layer (CLI here, HTTP in a deployment) drives the engine; the
//! engine itself owns no transport.
//!
//! ## Architecture
//!
//! - **Session engine**: a wall-clock state machine. There are no
//!   background timers; elapsed and paused time are recomputed from
//!   stored timestamps on every read or transition.
//! - **Points ledger**: append-only entries with a review workflow
//!   (pending/approved/rejected/deleted). Balances are derived by
//!   aggregation at read time, never cached.
//! - **Voting**: sliding-window rate limit and independent voter/creator
//!   settlement, so either side can be voided on its own.
//! - **Store**: sqlite repository, constructed explicitly and passed to
//!   each service (no global instances).
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: session lifecycle state machine
//! - [`Ledger`]: transaction log, review workflow, balances, leaderboard
//! - [`ScrapBoard`]: scrap submission and comparison-pair selection
//! - [`VotingDesk`]: vote casting, rate limiting, invalidation
//! - [`Clock`]: injectable time source for deterministic tests

pub mod actor;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod scrap;
pub mod session;
pub mod settlement;
pub mod store;
pub mod voting;

pub use actor::Actor;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, Result};
pub use ledger::{
    Ledger, LeaderboardEntry, NewTransaction, PointTransaction, ReviewDecision, TransactionStatus,
};
pub use scrap::{NewScrap, Scrap, ScrapBoard};
pub use session::{elapsed_active_seconds, Session, SessionEngine, SessionStatus};
pub use settlement::{
    BASE_POINTS_PER_HOUR, CREATOR_POINTS_PER_HOUR_PER_VOTE, MAX_VOTES_PER_HOUR,
    MIN_SCRAP_SESSION_SECS, VOTER_POINTS_PER_VOTE,
};
pub use store::Store;
pub use voting::{Vote, VoteInvalidation, VoteOutcome, VotingDesk};
