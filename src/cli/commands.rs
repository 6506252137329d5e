//! CLI command definitions

use clap::Args;

/// Run the preflight validation pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the migration YAML file
    #[arg(short, long)]
    pub file: String,

    /// Print the resulting fact document after the run
    #[arg(long)]
    pub show_facts: bool,
}

/// Validate a migration configuration file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the migration YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the accumulated fact document
#[derive(Debug, Args, Clone)]
pub struct FactsCommand {
    /// Migration YAML file used to locate the fact document
    #[arg(short, long)]
    pub file: Option<String>,
}
