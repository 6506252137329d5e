//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{FactsCommand, RunCommand, ValidateCommand};

/// Preflight validation for VCD NSX-V to NSX-T migrations
#[derive(Debug, Parser, Clone)]
#[command(name = "vcd-preflight")]
#[command(version = "0.1.0")]
#[command(
    about = "Validates that a VCD org VDC is eligible for NSX-V to NSX-T migration",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the preflight validation pipeline
    Run(RunCommand),

    /// Validate a migration configuration file
    Validate(ValidateCommand),

    /// Show the accumulated fact document
    Facts(FactsCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }
}
