use clap::Subcommand;
use scrapforge_core::{Clock, SessionEngine, Store, SystemClock};
use serde_json::json;

use crate::common::{print_json, require_open_session};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a scrapping session
    Start {
        #[arg(long)]
        user: String,
    },
    /// Pause the running session
    Pause {
        #[arg(long)]
        user: String,
    },
    /// Resume a paused session
    Resume {
        #[arg(long)]
        user: String,
    },
    /// Complete the session and settle points
    Complete {
        #[arg(long)]
        user: String,
    },
    /// Cancel the session without settling points
    Cancel {
        #[arg(long)]
        user: String,
    },
    /// Print the current session as JSON
    Status {
        #[arg(long)]
        user: String,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;
    let clock = SystemClock;
    let engine = SessionEngine::new(&store, &clock);

    match action {
        SessionAction::Start { user } => {
            let session = engine.start(&user)?;
            print_json(&session)?;
        }
        SessionAction::Pause { user } => {
            let session = require_open_session(&engine, &user)?;
            print_json(&engine.pause(session.id)?)?;
        }
        SessionAction::Resume { user } => {
            let session = require_open_session(&engine, &user)?;
            print_json(&engine.resume(session.id)?)?;
        }
        SessionAction::Complete { user } => {
            let session = require_open_session(&engine, &user)?;
            let (session, settled) = engine.complete(session.id)?;
            print_json(&json!({
                "session": session,
                "settled": settled,
            }))?;
        }
        SessionAction::Cancel { user } => {
            let session = require_open_session(&engine, &user)?;
            print_json(&engine.cancel(session.id)?)?;
        }
        SessionAction::Status { user } => match engine.current(&user)? {
            Some(session) => {
                let now = clock.now();
                print_json(&json!({
                    "session": session,
                    "active_secs": session.active_secs(now),
                    "paused_secs": session.paused_secs(now),
                }))?;
            }
            None => println!("no open session"),
        },
    }
    Ok(())
}
