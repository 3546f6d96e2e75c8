// Desktop/tooling crate — unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "TriBoy protocol workspace development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every node crate builds for both `hardware` and `sim` targets
    Check,
    /// Run all tests (unit, proto-core, and sim end-to-end scenarios)
    Test {
        /// Run only unit tests (protocol + proto-core)
        #[arg(long)]
        unit: bool,
        /// Run only the sim-backed end-to-end scenarios
        #[arg(long)]
        scenarios: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check => check::run(),
        Commands::Test { unit, scenarios } => test::run(unit, scenarios),
    }
}
