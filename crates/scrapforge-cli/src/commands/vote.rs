use chrono::Duration;
use clap::Subcommand;
use scrapforge_core::{Actor, Store, SystemClock, VotingDesk, MAX_VOTES_PER_HOUR};
use serde_json::json;

use crate::common::print_json;

#[derive(Subcommand)]
pub enum VoteAction {
    /// Cast a vote for one scrap of a comparison pair
    Cast {
        #[arg(long)]
        user: String,
        /// The scrap being voted for
        #[arg(long)]
        scrap: i64,
        /// The paired alternative it was shown against
        #[arg(long)]
        other: i64,
    },
    /// Void a vote and its settlement entries (organizer only)
    Invalidate {
        /// Acting organizer
        #[arg(long = "as")]
        reviewer: String,
        #[arg(long)]
        vote: i64,
    },
    /// Show the user's remaining votes in the current window
    Status {
        #[arg(long)]
        user: String,
    },
}

pub fn run(action: VoteAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;
    let clock = SystemClock;
    let desk = VotingDesk::new(&store, &clock);

    match action {
        VoteAction::Cast { user, scrap, other } => {
            let outcome = desk.cast(&Actor::user(user), scrap, other)?;
            print_json(&outcome)?;
        }
        VoteAction::Invalidate { reviewer, vote } => {
            let result = desk.invalidate(vote, &Actor::organizer(reviewer))?;
            print_json(&json!({
                "vote_id": result.vote_id,
                "deleted_vote": result.deleted_vote,
                "transaction_errors": result
                    .transaction_errors
                    .iter()
                    .map(|(id, e)| json!({ "transaction": id, "error": e.to_string() }))
                    .collect::<Vec<_>>(),
            }))?;
        }
        VoteAction::Status { user } => {
            let used = desk.votes_in_last_hour(&user)?;
            let next_slot_at = desk
                .oldest_vote_in_last_hour(&user)?
                .filter(|_| used >= MAX_VOTES_PER_HOUR)
                .map(|oldest| (oldest + Duration::hours(1)).to_rfc3339());
            print_json(&json!({
                "votes_in_last_hour": used,
                "limit": MAX_VOTES_PER_HOUR,
                "next_slot_at": next_slot_at,
            }))?;
        }
    }
    Ok(())
}
