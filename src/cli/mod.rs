//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pixy fleet controller - camera identity checks, mode dispatch, and
/// parameter sync.
///
/// Robot Mode: Use --robot or --format json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "pf", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (text for humans, json for scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "PF_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: JSON reports on stdout and JSON log lines on stderr
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/pixy-fleet/config.toml)
    #[arg(long, short = 'c', global = true, env = "PF_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Control Loop ===
    /// Run the periodic controller against the simulated camera bus
    Run(RunArgs),

    // === Operator Commands ===
    /// List cameras on the bus with slot and firmware version
    Enumerate,

    /// Read camera parameters into the settings store
    #[command(visible_alias = "get-parameters")]
    GetParams,

    /// Apply settings-store parameters to the cameras
    #[command(visible_alias = "set-parameters")]
    SetParams,

    // === Configuration ===
    /// Print the effective configuration as TOML
    Config(ConfigArgs),

    // === Utilities ===
    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// === Argument Structs ===

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Start with the robot enabled (Active mode)
    #[arg(long)]
    pub enabled: bool,

    /// Stop after this many control cycles
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Override the configured cycle period in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub period_ms: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show configuration file path only
    #[arg(long)]
    pub path: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
