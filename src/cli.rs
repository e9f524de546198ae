//! CLI argument parsing.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "graxy",
    version,
    about = "Chat proxy for an OpenAI-compatible completion API",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Arguments for the implicit `run` when no subcommand is given
    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The subcommand to execute; bare `graxy` means `run`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Run(self.run))
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the proxy server (default when no subcommand is given)
    Run(RunArgs),
    /// Load and validate the config file, then print the effective settings
    CheckConfig(RunArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long, default_value = "graxy.yaml", env = "GRAXY_CONFIG")]
    pub config: String,

    /// Listen host
    #[arg(long, env = "GRAXY_HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(long, env = "GRAXY_PORT")]
    pub port: Option<u16>,

    /// Log level
    #[arg(long, default_value = "info", env = "GRAXY_LOG_LEVEL")]
    pub log_level: String,
}
