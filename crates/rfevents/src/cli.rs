//! Clap derive structures for the `rfevents` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// rfevents -- Redfish event subscriptions and notification routing
#[derive(Debug, Parser)]
#[command(
    name = "rfevents",
    version,
    about = "Manage Redfish event subscriptions from the command line",
    long_about = "Operates the event subscription service over a JSON store file.\n\n\
        Subscriptions are registered on devices through their plugins; inbound\n\
        events are filtered and delivered to subscriber destinations.",
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
    /// Service config file (defaults to the platform config path)
    #[arg(long, env = "RFEVENTS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// JSON store file holding subscriptions, targets and plugins
    #[arg(
        long,
        short = 's',
        env = "RFEVENTS_STORE",
        default_value = "rfevents-store.json",
        global = true
    )]
    pub store: PathBuf,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RFEVENTS_OUTPUT",
        default_value = "json",
        global = true
    )]
    pub output: OutputFormat,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage event subscriptions
    #[command(alias = "subs")]
    Subscriptions(SubscriptionsArgs),

    /// Route an inbound event envelope from a device
    Publish(PublishArgs),

    /// Submit a test event to a user's subscriptions
    TestEvent(TestEventArgs),

    /// Plugin status checks
    Plugins(PluginsArgs),

    /// Inspect the service configuration
    Config(ConfigArgs),
}

// ── Subscriptions ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SubscriptionsArgs {
    #[command(subcommand)]
    pub command: SubscriptionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubscriptionsCommand {
    /// List the subscription collection
    #[command(alias = "ls")]
    List,

    /// Show one subscription
    Get {
        /// Subscription ID
        id: String,
    },

    /// Create a subscription from a Redfish request body
    Create {
        /// JSON request body file (`-` for stdin)
        #[arg(long, short = 'f')]
        file: PathBuf,

        /// Requesting user
        #[arg(long, short = 'u', default_value = "admin")]
        user: String,
    },

    /// Delete a subscription and re-register what remains on each device
    #[command(alias = "rm")]
    Delete {
        /// Subscription ID
        id: String,
    },

    /// Remove every subscription on a device's resources
    DeleteByDevice {
        /// Device UUID
        uuid: String,
    },
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Address of the device that raised the events
    #[arg(long)]
    pub host: String,

    /// JSON event envelope file (`-` for stdin)
    #[arg(long, short = 'f')]
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct TestEventArgs {
    /// JSON test event file (`-` for stdin)
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Owner of the subscriptions that receive the event
    #[arg(long, short = 'u', default_value = "admin")]
    pub user: String,
}

// ── Plugins ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PluginsArgs {
    #[command(subcommand)]
    pub command: PluginsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PluginsCommand {
    /// Probe plugin status and share inventory with plugins that came up
    Probe {
        /// Probe only this plugin
        id: Option<String>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print the default config file path
    Path,
}
