//! bridgekit command-line tool.
//!
//! Usage:
//!   bridgekit --db bridge.db link --local '!room:example.org' --remote '#room'
//!   bridgekit --db bridge.db by-local '!room:example.org'

use anyhow::Result;
use bridgekit_cli::{run, Args};
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!("Using entry store {}", args.db);
    let output = run(&args)?;
    println!("{output}");
    Ok(())
}
