use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "scrapforge-cli", version, about = "Scrapforge CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Session control
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Scrap submission and browsing
    Scrap {
        #[command(subcommand)]
        action: commands::scrap::ScrapAction,
    },
    /// Comparison voting
    Vote {
        #[command(subcommand)]
        action: commands::vote::VoteAction,
    },
    /// Points ledger and review
    Points {
        #[command(subcommand)]
        action: commands::points::PointsAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Scrap { action } => commands::scrap::run(action),
        Commands::Vote { action } => commands::vote::run(action),
        Commands::Points { action } => commands::points::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
