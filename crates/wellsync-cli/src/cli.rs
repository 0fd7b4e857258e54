use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use wellsync_core::models::ResolutionStrategy;

use crate::commands::common::parse_check_item;

#[derive(Parser)]
#[command(name = "wellsync")]
#[command(about = "Capture well production data offline and sync it when connectivity returns")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for sync configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

/// Captured values shared by `add` and `edit`.
#[derive(Args, Debug, Default, Clone)]
pub struct EntryFieldArgs {
    /// Oil volume (bbl)
    #[arg(long)]
    pub oil: Option<f64>,
    /// Gas volume (mcf)
    #[arg(long)]
    pub gas: Option<f64>,
    /// Water volume (bbl)
    #[arg(long)]
    pub water: Option<f64>,
    /// Pressure reading (psi)
    #[arg(long)]
    pub pressure: Option<f64>,
    /// Temperature reading (°F)
    #[arg(long)]
    pub temperature: Option<f64>,
    /// Free-text notes
    #[arg(long)]
    pub notes: Option<String>,
    /// Photo reference (repeatable)
    #[arg(long = "photo", value_name = "REF")]
    pub photos: Vec<String>,
    /// Checklist item (repeatable)
    #[arg(long = "check", value_name = "NAME=BOOL", value_parser = parse_check_item)]
    pub checks: Vec<(String, bool)>,
    /// GPS latitude
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,
    /// GPS longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,
    /// GPS accuracy in metres
    #[arg(long, requires = "lat")]
    pub accuracy: Option<f64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a new field entry
    #[command(alias = "new")]
    Add {
        /// Well reference
        #[arg(long)]
        well: String,
        /// Production day (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: NaiveDate,
        #[command(flatten)]
        fields: EntryFieldArgs,
    },
    /// List recent entries
    List {
        /// Only entries in this sync status
        #[arg(long, value_name = "STATUS")]
        status: Option<String>,
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one entry with its event history
    Show {
        /// Entry ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing entry
    Edit {
        /// Entry ID or unique ID prefix
        id: String,
        /// Well reference
        #[arg(long)]
        well: Option<String>,
        /// Production day (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        #[command(flatten)]
        fields: EntryFieldArgs,
        /// Remove the pressure reading
        #[arg(long, conflicts_with = "pressure")]
        clear_pressure: bool,
        /// Remove the temperature reading
        #[arg(long, conflicts_with = "temperature")]
        clear_temperature: bool,
        /// Remove the whole checklist
        #[arg(long, conflicts_with = "checks")]
        clear_checklist: bool,
        /// Remove the GPS fix
        #[arg(long, conflicts_with = "lat")]
        clear_location: bool,
    },
    /// Delete an existing entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Show queued changes in drain order
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync pass against the configured server
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
        /// Treat the device as offline (nothing is sent; no profile or secret needed)
        #[arg(long)]
        offline: bool,
        /// Output the pass report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List unresolved conflicts with their differing fields
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflicted entry
    Resolve {
        /// Entry ID or unique ID prefix
        id: String,
        /// Which version wins
        #[arg(long, value_enum)]
        strategy: StrategyArg,
        /// Name recorded in the event log
        #[arg(long, value_name = "NAME")]
        by: Option<String>,
    },
    /// Show the event log
    Events {
        /// Only events for this entry (ID or unique prefix)
        #[arg(long, value_name = "ID")]
        entity: Option<String>,
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export entries and the event log as JSON
    Export {
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI sync profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    /// Keep the device's version
    Local,
    /// Accept the server's version
    Server,
    /// Safety-biased field merge
    Merge,
}

impl From<StrategyArg> for ResolutionStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Local => Self::Local,
            StrategyArg::Server => Self::Server,
            StrategyArg::Merge => Self::Merge,
        }
    }
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Make a held-back or backing-off change eligible again
    Retry {
        /// Entry ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Base URL of the field data API
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Tenant identifier
        #[arg(long, value_name = "ID")]
        tenant_id: Option<String>,
        /// Per-request timeout in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
