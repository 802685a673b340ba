//! CLI module for amtctl
//!
//! Argument parsing for the `status` and `set` subcommands.

pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command completed
pub const EXIT_OK: i32 = 0;

/// Command failed
pub const EXIT_ERROR: i32 = 1;

/// `set --wait` gave up before the host reached the state
pub const EXIT_TIMEOUT: i32 = 2;

/// amtctl - Intel AMT power control
///
/// Query and change the power state of machines through their AMT
/// management engine.
#[derive(Parser, Debug, Clone)]
#[command(name = "amtctl")]
#[command(author = "amtctl Contributors")]
#[command(version)]
#[command(about = "Out-of-band power control for Intel AMT hosts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "AMTCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// AMT user name
    #[arg(short = 'u', long, global = true, env = "AMT_USERNAME")]
    pub username: Option<String>,

    /// AMT password
    #[arg(
        short = 'p',
        long,
        global = true,
        env = "AMT_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Accept self-signed TLS certificates
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the current power state
    Status(StatusArgs),

    /// Request a power state
    Set(SetArgs),
}

/// Arguments for status command
#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    /// Profile name or [scheme://]host[:port]
    pub host: String,
}

/// Arguments for set command
#[derive(Parser, Debug, Clone)]
pub struct SetArgs {
    /// Profile name or [scheme://]host[:port]
    pub host: String,

    /// Target state: on, cycle, off, reset or nmi
    pub state: String,

    /// Wait until the host reports the new state
    #[arg(short = 'w', long)]
    pub wait: bool,

    /// Seconds to wait before giving up
    #[arg(short = 't', long, default_value = "30", requires = "wait")]
    pub timeout: u64,

    /// Seconds between polls while waiting
    #[arg(long, default_value = "1", requires = "wait")]
    pub poll_interval: u64,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
