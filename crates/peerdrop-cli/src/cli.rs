use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// peerdrop: send a file straight to another machine using a 6-digit code.
#[derive(Parser, Debug)]
#[command(name = "peerdrop", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Relay WebSocket URL override.
    #[arg(long, global = true)]
    pub relay_url: Option<String>,

    /// Log filter directive override (e.g. "peerdrop=debug").
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Offer a file and wait for a receiver.
    Send {
        file: PathBuf,

        /// Also print the code as a QR code.
        #[arg(long)]
        qr: bool,
    },

    /// Receive the file offered under CODE.
    Receive {
        code: String,

        /// Accept without asking.
        #[arg(short = 'y', long)]
        yes: bool,

        /// Directory to save into.
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },

    /// Inspect or create the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config file path.
    Path,
    /// Write a commented default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
