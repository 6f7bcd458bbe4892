//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod discover;
pub mod run;
pub mod selftest;
pub mod stats;

use crate::app::AppContext;
use crate::error::Result;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the enclosure and run the control loop
    Run(run::RunArgs),

    /// Probe serial ports for the enclosure firmware
    Discover(discover::DiscoverArgs),

    /// Warm-start the model offline and report per-action statistics
    Stats(stats::StatsArgs),

    /// Exercise readout and light commands on the connected device
    Selftest(selftest::SelftestArgs),
}

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run::run(ctx, args),
        Commands::Discover(args) => discover::run(ctx, args),
        Commands::Stats(args) => stats::run(ctx, args),
        Commands::Selftest(args) => selftest::run(ctx, args),
    }
}
