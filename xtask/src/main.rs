// Desktop/tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;
mod chip;
mod flash;

use anyhow::Result;
use clap::{Parser, Subcommand};

use chip::Chip;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "STM32 bring-up development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the firmware for a board and flash it via probe-rs
    Flash {
        /// Board chip family
        #[arg(value_enum)]
        chip: Chip,
        /// Build and flash release version
        #[arg(short, long)]
        release: bool,
    },
    /// Check firmware builds for every chip, plus the no_std platform crate
    Check {
        /// Check only this chip
        #[arg(long, value_enum)]
        chip: Option<Chip>,
    },
    /// Run all host tests (unit, integration, doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Flash { chip, release } => flash::run(chip, release),
        Commands::Check { chip } => match chip {
            Some(chip) => check::run(&[chip]),
            None => check::run(&Chip::ALL),
        },
        Commands::Test { unit, integration } => test::run(unit, integration),
    }
}
