//! Clap derive structures for the `softap` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this module may
//! only depend on clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// softap -- run a hostapd soft access point
#[derive(Debug, Parser)]
#[command(
    name = "softap",
    version,
    about = "Run a hostapd soft access point and manage who may join it",
    long_about = "Brings up a Wi-Fi hotspot through hostapd from a configuration profile,\n\
        tracks the stations that join it and maintains the MAC allow-list.\n\n\
        `softap run` stays in the foreground and accepts commands on stdin.",
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
    /// Hotspot profile to use
    #[arg(long, short = 'p', env = "SOFTAP_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "SOFTAP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SOFTAP_OUTPUT",
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

    /// Also write logs to this file
    #[arg(long, env = "SOFTAP_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the hotspot and stay in the foreground
    #[command(alias = "up")]
    Run(RunArgs),

    /// Manage the MAC allow-list while the hotspot is down
    Acl(AclArgs),

    /// Show DHCP leases handed out on the hotspot
    Leases(LeasesArgs),

    /// Print the hostapd configuration a profile would produce
    RenderConf(RenderConfArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Stop after this long without clients, e.g. "10m" ("0s" never stops)
    #[arg(long)]
    pub auto_disable: Option<String>,

    /// Seconds to wait for the interface to come up
    #[arg(long, default_value = "30")]
    pub start_timeout: u64,

    /// Ignore stdin; only Ctrl-C or auto-disable stop the hotspot
    #[arg(long)]
    pub no_stdin: bool,
}

// ── ACL ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AclArgs {
    #[command(subcommand)]
    pub command: AclCommand,
}

#[derive(Debug, Subcommand)]
pub enum AclCommand {
    /// List allow-list entries
    #[command(alias = "ls")]
    List,

    /// Add a device to the allow-list
    Allow {
        /// Station MAC address
        mac: String,

        /// Display name
        #[arg(long, short = 'n')]
        name: Option<String>,
    },

    /// Remove a device from the allow-list
    #[command(alias = "rm")]
    Disallow {
        /// Station MAC address
        mac: String,
    },

    /// Show or set who may join
    Policy {
        /// New policy; omit to show the current one
        #[arg(value_enum)]
        policy: Option<AclPolicy>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AclPolicy {
    /// Every device may join
    AllowAll,
    /// Only devices on the allow-list may join
    AllowList,
}

// ── Leases ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LeasesArgs {
    /// Lease file (overrides the profile)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Only show the lease of this MAC address
    pub mac: Option<String>,
}

// ── Render conf ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RenderConfArgs {
    /// Write to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Print the passphrase instead of masking it
    #[arg(long)]
    pub show_psk: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the loaded configuration (passphrases masked)
    Show,

    /// Print the configuration file path
    Path,

    /// List profile names
    Profiles,

    /// Set the passphrase of the active profile
    SetPsk {
        /// Store in the config file instead of the system keyring
        #[arg(long)]
        plaintext: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
