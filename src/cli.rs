//! Command-line surface of `ag`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "ag",
    version,
    about = "Read, store and alert on a local AirGradient air-quality monitor"
)]
pub struct Cli {
    /// Config file (default: $AIRGRADIENT_CONFIG, else config/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Device name or hostname from the config file
    #[arg(long, global = true, value_name = "NAME")]
    pub device: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Current readings with air-quality and threshold indicators
    Status,
    /// Raw device document
    Readings(ReadingsArgs),
    /// Stored readings for the selected device
    History(HistoryArgs),
    /// Evaluate thresholds; exit 0 ok, 1 warning, 2 critical
    Alerts,
    /// Show or edit the config file
    Config(ConfigArgs),
    /// Fetch one reading and append it to the history database
    Store,
}

#[derive(Debug, Args)]
pub struct ReadingsArgs {
    /// Print the device JSON document
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// How many days back to look
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=3650))]
    pub days: u32,

    /// Print full records as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigAction {
    Show,
    Set,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(value_enum, default_value_t = ConfigAction::Show)]
    pub action: ConfigAction,

    /// Dotted key, e.g. thresholds.pm25.warn
    pub key: Option<String>,

    pub value: Option<String>,
}
