//! Waypoint CLI Application
//!
//! Command-line interface for PDDL plan parsing, happenings conversion, and
//! ValStep replay.

mod args;
mod cli;

use anyhow::Result;
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args { epsilon, command } = Args::parse();
    let cli = Cli::new(epsilon);

    info!("Waypoint started");

    match command {
        Commands::Parse(args) => cli.handle_parse(&args),
        Commands::Happenings(args) => cli.handle_happenings(&args),
        Commands::Plan(args) => cli.handle_plan(&args),
        Commands::Evaluate(args) => cli.handle_evaluate(&args).await,
    }
}
