use clap::Subcommand;
use scrapforge_core::{NewScrap, ScrapBoard, SessionEngine, Store, SystemClock};

use crate::common::{print_json, require_open_session};

#[derive(Subcommand)]
pub enum ScrapAction {
    /// Submit a scrap against the user's open session
    Submit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Attachment URL, repeatable
        #[arg(long = "attachment")]
        attachments: Vec<String>,
    },
    /// Print one scrap as JSON
    Show { id: i64 },
    /// List the scraps of a session
    List {
        #[arg(long)]
        session: i64,
    },
    /// Draw a random comparison pair for a voter
    Pair {
        #[arg(long)]
        user: String,
    },
}

pub fn run(action: ScrapAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;
    let clock = SystemClock;
    let board = ScrapBoard::new(&store, &clock);

    match action {
        ScrapAction::Submit {
            user,
            title,
            description,
            attachments,
        } => {
            let engine = SessionEngine::new(&store, &clock);
            let session = require_open_session(&engine, &user)?;
            let scrap = board.submit(NewScrap {
                session_id: session.id,
                title,
                description,
                attachment_urls: attachments,
            })?;
            print_json(&scrap)?;
        }
        ScrapAction::Show { id } => print_json(&board.get(id)?)?,
        ScrapAction::List { session } => print_json(&board.by_session(session)?)?,
        ScrapAction::Pair { user } => match board.random_pair_for(&user)? {
            Some(pair) => print_json(&pair)?,
            None => println!("not enough scraps to pair"),
        },
    }
    Ok(())
}
