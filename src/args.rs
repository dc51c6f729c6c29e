use clap::{ArgAction, Parser, Subcommand};
use exporter_install::completions::CompletionShell;

#[derive(Parser)]
#[command(name = "exporter-install")]
#[command(version)]
#[command(about = "Install Prometheus exporters as systemd services", long_about = None)]
pub(crate) struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Download, install and start an exporter
    Install {
        /// Exporter name (see `list`)
        exporter: String,

        /// Skip the post-install listening-port check
        #[arg(long)]
        skip_verify: bool,
    },

    /// Stop and remove an exporter's systemd unit
    Uninstall {
        /// Exporter name (see `list`)
        exporter: String,

        /// Also delete the install directory
        #[arg(long)]
        purge: bool,
    },

    /// Show whether an exporter is installed and running
    Status {
        /// Exporter name (see `list`)
        exporter: String,
    },

    /// List the exporters this tool can install
    List,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}
