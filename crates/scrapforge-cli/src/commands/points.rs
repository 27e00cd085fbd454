use clap::Subcommand;
use scrapforge_core::{Actor, Ledger, NewTransaction, ReviewDecision, Store, SystemClock};
use serde_json::json;

use crate::common::print_json;

#[derive(Subcommand)]
pub enum PointsAction {
    /// Current balance of a user
    Balance {
        #[arg(long)]
        user: String,
    },
    /// Full transaction history of a user
    History {
        #[arg(long)]
        user: String,
    },
    /// Transactions awaiting review
    Pending,
    /// Record a pending award for later review (organizer only)
    Award {
        /// Acting organizer
        #[arg(long = "as")]
        author: String,
        #[arg(long)]
        user: String,
        /// Signed amount; negative models a debit
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
        #[arg(long)]
        reason: String,
    },
    /// Approve, reject, or delete a transaction (organizer only)
    Review {
        /// Acting organizer
        #[arg(long = "as")]
        reviewer: String,
        #[arg(long)]
        transaction: i64,
        /// approve | reject | delete
        #[arg(long)]
        decision: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// All users ranked by balance
    Leaderboard,
}

fn parse_decision(decision: &str) -> Result<ReviewDecision, Box<dyn std::error::Error>> {
    match decision {
        "approve" => Ok(ReviewDecision::Approve),
        "reject" => Ok(ReviewDecision::Reject),
        "delete" => Ok(ReviewDecision::Delete),
        other => Err(format!("unknown decision '{other}' (approve|reject|delete)").into()),
    }
}

pub fn run(action: PointsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;
    let clock = SystemClock;
    let ledger = Ledger::new(&store, &clock);

    match action {
        PointsAction::Balance { user } => {
            print_json(&json!({ "user": user, "balance": ledger.balance(&user)? }))?;
        }
        PointsAction::History { user } => print_json(&ledger.history(&user)?)?,
        PointsAction::Pending => print_json(&ledger.pending()?)?,
        PointsAction::Award {
            author,
            user,
            amount,
            reason,
        } => {
            let tx = ledger.record(NewTransaction::pending(user, amount, reason, author))?;
            print_json(&tx)?;
        }
        PointsAction::Review {
            reviewer,
            transaction,
            decision,
            reason,
        } => {
            let decision = parse_decision(&decision)?;
            let tx = ledger.review(
                transaction,
                &Actor::organizer(reviewer),
                decision,
                reason.as_deref(),
            )?;
            print_json(&tx)?;
        }
        PointsAction::Leaderboard => print_json(&ledger.leaderboard()?)?,
    }
    Ok(())
}
