//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// pumpsync - mirror insulin pump history logs to Nightscout
#[derive(Parser, Debug)]
#[command(name = "pumpsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.pumpsync/data/pumpsync.db)
    #[arg(long, global = true, env = "PUMPSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Pump serial number to operate on
    #[arg(long, global = true, env = "PUMPSYNC_DEVICE")]
    pub device: Option<u32>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local database and a default config file
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Mirror the local log to Nightscout
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Local history log mirror
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },

    /// Remote sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Run one sync pass now
    Run,

    /// Show cursor, remote and pending entries
    Status {
        /// Number of cursor changes to show
        #[arg(long, default_value = "5")]
        history: u32,
    },

    /// Re-upload entries from a past time window on the next pass
    Retroactive {
        /// Window start (RFC 3339, YYYY-MM-DD, or relative like 6h, 2d)
        #[arg(long)]
        start: String,

        /// Window end (default: now)
        #[arg(long, default_value = "now")]
        end: String,

        /// Only record the window; let the next scheduled pass run it
        #[arg(long)]
        defer: bool,
    },

    /// Forget the cursor; the next pass starts from the lookback window
    Reset,

    /// Run passes in the foreground on the configured interval
    Daemon {
        /// Minutes between passes (overrides config)
        #[arg(long)]
        interval: Option<u32>,
    },
}

// ============================================================================
// Log Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// Import captured history log entries from a JSONL file
    Import {
        /// Path to the JSONL file
        file: PathBuf,
    },

    /// Summarize stored entries
    Stats,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current settings (secret masked)
    Show,

    /// Change settings
    Set(ConfigSetArgs),

    /// Check connectivity and credentials against the remote
    Test,
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    /// Nightscout base URL
    #[arg(long)]
    pub url: Option<String>,

    /// Nightscout API secret (plain text; hashed on the wire)
    #[arg(long)]
    pub secret: Option<String>,

    /// Enable or disable sync
    #[arg(long)]
    pub enabled: Option<bool>,

    /// Comma-separated categories to mirror, or "all"
    #[arg(long)]
    pub categories: Option<String>,

    /// Minutes between daemon passes
    #[arg(long)]
    pub interval: Option<u32>,

    /// Hours of history the first pass looks back
    #[arg(long)]
    pub lookback: Option<u32>,

    /// Default pump serial number
    #[arg(long)]
    pub device: Option<u32>,
}

impl ConfigSetArgs {
    /// Whether any setting was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.secret.is_none()
            && self.enabled.is_none()
            && self.categories.is_none()
            && self.interval.is_none()
            && self.lookback.is_none()
            && self.device.is_none()
    }
}
