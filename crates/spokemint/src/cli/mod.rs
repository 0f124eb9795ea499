//! cli subcommands for spokemint.
//!
//! - `spokemint serve` - run the rotation agent

pub mod serve;

pub use serve::ServeCommand;

use clap::{Parser, Subcommand};

/// spokemint - hub-and-spoke bounded-token rotation agent
#[derive(Parser, Debug)]
#[command(name = "spokemint")]
#[command(about = "Hub-and-spoke bounded-token rotation agent", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run the rotation agent
    Serve(ServeCommand),
}
