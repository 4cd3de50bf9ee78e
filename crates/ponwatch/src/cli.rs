//! Clap derive structures for the `ponwatch` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ponwatch -- poll EPON/GPON OLTs and track their terminals
#[derive(Debug, Parser)]
#[command(
    name = "ponwatch",
    version,
    about = "Poll EPON/GPON OLTs and track their ONUs",
    long_about = "Polls optical line terminals over SNMP, falls back to their CLI over SSH\n\
        when telemetry comes back empty, and reconciles the subscriber terminals\n\
        found on each PON port: online state, optical levels and traffic rates.",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "PONWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PONWATCH_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// SNMP request timeout in seconds (overrides the config file)
    #[arg(long, env = "PONWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
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
    /// List configured OLTs
    Olts(OltsArgs),

    /// Poll one OLT or all of them and report what changed
    #[command(alias = "p")]
    Poll(PollArgs),

    /// Poll an OLT and list its terminals
    Onus(OnusArgs),

    /// Act on a single terminal
    Onu(OnuArgs),

    /// Run a read-only CLI command on an OLT
    Exec(ExecArgs),

    /// Persist the running configuration of an OLT
    Save(SaveArgs),

    /// Stream live per-terminal bandwidth for an OLT
    Live(LiveArgs),

    /// Poll continuously and print notifications
    Run(RunArgs),

    /// Manage configuration and stored secrets
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Slot argument ────────────────────────────────────────────────────

/// A terminal position given as `PORT:ONU` (also `PORT/ONU`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotArg {
    pub port: u16,
    pub onu_id: u16,
}

pub fn parse_slot(raw: &str) -> Result<SlotArg, String> {
    let (port, onu) = raw
        .split_once([':', '/'])
        .ok_or_else(|| format!("expected PORT:ONU, got '{raw}'"))?;
    let port = port
        .trim()
        .parse()
        .map_err(|_| format!("invalid port '{port}'"))?;
    let onu_id = onu
        .trim()
        .parse()
        .map_err(|_| format!("invalid ONU id '{onu}'"))?;
    Ok(SlotArg { port, onu_id })
}

// ── OLTs ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct OltsArgs {
    /// Poll every OLT first and show live status and health
    #[arg(long)]
    pub poll: bool,
}

// ── Poll ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PollArgs {
    /// OLT name (all OLTs when omitted)
    pub olt: Option<String>,

    /// Manual poll: clear optics on terminals that dropped and delete
    /// terminals missing for several consecutive manual polls
    #[arg(long, requires = "olt")]
    pub manual: bool,
}

// ── ONUs ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct OnusArgs {
    /// OLT name
    pub olt: String,

    /// Only show offline terminals
    #[arg(long, conflicts_with = "online")]
    pub offline: bool,

    /// Only show online terminals
    #[arg(long)]
    pub online: bool,

    /// Only show terminals on this PON port
    #[arg(long)]
    pub port: Option<u16>,

    /// Only show terminals whose receive power is below this level (dBm)
    #[arg(long, allow_negative_numbers = true)]
    pub weaker_than: Option<f64>,

    /// Keep polling and redraw the list whenever a terminal changes
    #[arg(long, short = 'w')]
    pub watch: bool,
}

#[derive(Debug, Args)]
pub struct OnuArgs {
    #[command(subcommand)]
    pub command: OnuCommand,
}

#[derive(Debug, Subcommand)]
pub enum OnuCommand {
    /// Show one terminal after a fresh poll
    Show {
        olt: String,
        #[arg(value_parser = parse_slot)]
        slot: SlotArg,
    },

    /// Set the terminal description
    Describe {
        olt: String,
        #[arg(value_parser = parse_slot)]
        slot: SlotArg,
        /// New description (letters, digits, `-`, `_`, `.`, spaces)
        description: String,
    },

    /// Reboot the terminal
    Reboot {
        olt: String,
        #[arg(value_parser = parse_slot)]
        slot: SlotArg,
    },

    /// Tag a UNI port with a VLAN
    Vlan {
        olt: String,
        #[arg(value_parser = parse_slot)]
        slot: SlotArg,
        /// UNI (Ethernet) port on the terminal
        #[arg(long, default_value = "1")]
        uni_port: u8,
        /// VLAN id (1-4094)
        vlan: u16,
    },

    /// Enable a UNI port
    EnablePort {
        olt: String,
        #[arg(value_parser = parse_slot)]
        slot: SlotArg,
        #[arg(long, default_value = "1")]
        uni_port: u8,
    },

    /// Disable a UNI port
    DisablePort {
        olt: String,
        #[arg(value_parser = parse_slot)]
        slot: SlotArg,
        #[arg(long, default_value = "1")]
        uni_port: u8,
    },
}

// ── Exec / Save ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// OLT name
    pub olt: String,

    /// Command text, e.g. `show onu info epon 0/1`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// OLT name
    pub olt: String,
}

// ── Live ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LiveArgs {
    /// OLT name
    pub olt: String,

    /// Stop after this many updates (runs until interrupted when omitted)
    #[arg(long, short = 'n')]
    pub updates: Option<u64>,
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Write a daily rolling log file into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Emit log lines as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Skip the immediate first cycle and wait one interval
    #[arg(long)]
    pub no_initial_poll: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup: add an OLT profile
    Init,

    /// Show the effective configuration with secrets masked
    Show,

    /// Print the configuration file path
    Path,

    /// Store a secret for an OLT in the system keyring
    SetSecret {
        /// OLT name
        olt: String,
        /// Which secret to store
        #[arg(long, value_enum)]
        kind: SecretArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretArg {
    Community,
    SshPassword,
    EnablePassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
