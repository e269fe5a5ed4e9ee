//! Clap derive structures for the `unipoll` CLI.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// unipoll -- poll a UniFi Network controller through its Integration API
#[derive(Debug, Parser)]
#[command(
    name = "unipoll",
    version,
    about = "Poll UniFi network controllers for devices, clients and WANs",
    long_about = "Polls one site of a UniFi Network controller through the official\n\
        Integration API and prints aggregated snapshots of its devices,\n\
        clients and WAN links.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Controller profile to use
    #[arg(long, short = 'p', env = "UNIPOLL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller host, optionally with port (overrides profile)
    #[arg(long, short = 'H', env = "UNIPOLL_HOST", global = true)]
    pub host: Option<String>,

    /// Site id, name or internal reference
    #[arg(long, short = 's', env = "UNIPOLL_SITE", global = true)]
    pub site: Option<String>,

    /// Integration API key
    #[arg(long, env = "UNIPOLL_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "UNIPOLL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "UNIPOLL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "UNIPOLL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output, Color & Log Enums ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the API key and list the sites it can see
    Probe,

    /// Run one refresh cycle and print the snapshot
    #[command(alias = "snap")]
    Snapshot(SnapshotArgs),

    /// Poll on an interval and print a line per cycle until Ctrl-C
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Cap concurrent per-device requests
    #[arg(long)]
    pub max_device_fetches: Option<usize>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval (e.g. 30s, 2m); overrides the profile
    #[arg(long, short = 'i', value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Cap concurrent per-device requests
    #[arg(long)]
    pub max_device_fetches: Option<usize>,
}

fn parse_interval(raw: &str) -> Result<Duration, String> {
    unipoll_config::parse_interval("interval", raw).map_err(|e| e.to_string())
}
