// =============================================================================
// Sofiya - Clap Module
// =============================================================================
//
// Author: Sofiya Bot Team
// Date: 2026-10-04
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Command line interface of the `sofiya` binary: run the service, or run a
//   single maintenance or rental operation against the record store.
//
// =============================================================================

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Returns the current version of the crate with extra info if supplied
///
/// Set the environment variable `SOFIYA_VERSION_EXTRA` at build time to
/// include it in parenthesis after the SemVer version, e.g. a git commit hash.
pub fn version() -> String {
    let cargo_pkg_version = env!("CARGO_PKG_VERSION");

    match option_env!("SOFIYA_VERSION_EXTRA") {
        Some(x) => format!("{} ({})", cargo_pkg_version, x),
        None => cargo_pkg_version.to_owned(),
    }
}

/// Sofiya - rental-gated group chat moderation service
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[clap(about, version = version(), name = "sofiya")]
pub struct Args {
    /// Path to configuration file
    #[clap(short, long, env = "SOFIYA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the service on the stdio transport until stdin closes
    Run {
        /// Do not start the scheduled jobs
        #[clap(long)]
        no_scheduler: bool,
    },

    /// Flush every collection and take a snapshot backup
    Backup,

    /// Expire overdue rentals and list the ones ending soon
    Sweep,

    /// Rental management commands
    Rental {
        #[clap(subcommand)]
        action: RentalCommands,
    },

    /// Decide access for a group, opening its trial on first contact
    Access {
        /// Group chat id
        group: String,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Target file; defaults to the per-user config path
        path: Option<PathBuf>,
    },
}

/// Rental management commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum RentalCommands {
    /// Start a rental, replacing any existing one
    Create {
        /// Group chat id
        group: String,

        /// Plan name; its configured duration is used unless --hours is given
        #[clap(short, long)]
        plan: String,

        /// Rental length in hours
        #[clap(long)]
        hours: Option<i64>,
    },

    /// Extend an existing rental
    Extend {
        /// Group chat id
        group: String,

        /// Hours added to the current end date
        #[clap(long)]
        hours: i64,
    },

    /// Delete a rental
    Delete {
        /// Group chat id
        group: String,
    },

    /// Show a rental
    Show {
        /// Group chat id
        group: String,
    },
}

/// Parse commandline arguments into structured data
#[must_use]
pub fn parse() -> Args {
    Args::parse()
}
