//! Clap derive structures for the `homelink` CLI.
//!
//! Compiled twice: by the binary and by `build.rs` for man pages, so this
//! module must only depend on clap and `clap_complete`.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homelink -- read, write and watch home-automation controller values
#[derive(Debug, Parser)]
#[command(
    name = "homelink",
    version,
    about = "Read, write and watch point values on a home-automation controller",
    long_about = "Talks to a home-automation controller over its JSON API.\n\n\
        Sessions are opened per command and logged out on exit; `watch`\n\
        keeps a live subscription open until interrupted.",
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
    #[arg(long, short = 'p', env = "HOMELINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller URL (overrides profile)
    #[arg(long, short = 'c', env = "HOMELINK_CONTROLLER", global = true)]
    pub controller: Option<String>,

    /// Login name (overrides profile)
    #[arg(long, short = 'u', env = "HOMELINK_USERNAME", global = true)]
    pub username: Option<String>,

    /// Application role requested at login
    #[arg(long, env = "HOMELINK_ROLE", global = true)]
    pub role: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMELINK_OUTPUT",
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

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "HOMELINK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "HOMELINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
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

#[derive(Debug, Clone, Copy, ValueEnum)]
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
    /// Log in, print the session details and log out again
    Login,

    /// Read or write point values
    #[command(alias = "v")]
    Values(ValuesArgs),

    /// Stream value changes for points until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Values ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ValuesArgs {
    #[command(subcommand)]
    pub command: ValuesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ValuesCommand {
    /// Read the current value of one or more points
    Get {
        /// Point IDs
        #[arg(required = true, num_args = 1..)]
        ids: Vec<u32>,
    },

    /// Write a value to a point
    Set {
        /// Point ID
        id: u32,

        /// New value (booleans and numbers are detected)
        value: String,

        /// Send the value as text without type detection
        #[arg(long)]
        text: bool,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Point IDs to subscribe to
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<u32>,

    /// Server-side wait per poll in seconds (overrides profile)
    #[arg(long)]
    pub wait_timeout: Option<u64>,

    /// Stop after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration (passwords redacted)
    Show,

    /// Print the config file location
    Path,

    /// Set a profile field (e.g. `house.controller https://10.0.0.20`)
    Set {
        /// `<profile>.<field>`
        key: String,
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },

    /// Store a profile's password in the system keyring
    SetPassword {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
