//! modbuild CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("modbuild=debug")
    } else {
        EnvFilter::new("modbuild=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color;
    match cli.command {
        Commands::Configure(args) => commands::configure::execute(args, cli.verbose),
        Commands::Plan(args) => commands::plan::execute(args, color),
        Commands::Linkorder(args) => commands::linkorder::execute(args),
        Commands::Test(args) => commands::test::execute(args),
        Commands::Header(args) => commands::header::execute(args),
    }
}
