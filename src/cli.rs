use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::NETWALKER_VERSION;

#[derive(Parser, Debug)]
#[clap(version = NETWALKER_VERSION, about = "Network topology discovery over SSH/Telnet")]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    /// Configuration file path
    #[arg(global = true, short, long, default_value = "netwalker.ini")]
    pub config: PathBuf,

    /// Device username (overrides environment and credentials file)
    #[arg(global = true, short, long)]
    pub username: Option<String>,

    /// Device password (overrides environment and credentials file)
    #[arg(global = true, short, long)]
    pub password: Option<String>,

    /// Prompt for an enable password
    #[arg(global = true, long)]
    pub enable_password: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the network starting from a seed file
    Discover {
        /// Seed CSV with header hostname,ip_address,status,error_details;
        /// resuming skips rows already marked done
        #[clap(index = 1, default_value = "seed_devices.csv")]
        seeds: PathBuf,

        /// Maximum discovery depth (overrides config file)
        #[clap(long)]
        max_depth: Option<u32>,

        /// Concurrent device connections (overrides config file)
        #[clap(long)]
        concurrent_connections: Option<usize>,

        /// Per-connection timeout in seconds (overrides config file)
        #[clap(long)]
        connection_timeout: Option<u64>,

        /// Whole-crawl timeout in seconds (overrides config file)
        #[clap(long)]
        discovery_timeout: Option<u64>,
    },

    /// Re-crawl devices whose last visit is older than DAYS days
    #[clap(name = "rewalk-stale")]
    RewalkStale {
        #[clap(index = 1, value_name = "DAYS")]
        days: u32,

        /// Discovery depth for the re-crawl
        #[clap(long, default_value_t = 1)]
        depth: u32,
    },

    /// Crawl devices seen as neighbors but never visited themselves
    #[clap(name = "walk-unwalked")]
    WalkUnwalked {
        /// Discovery depth for the crawl
        #[clap(long, default_value_t = 1)]
        depth: u32,
    },

    /// Create the inventory schema
    #[clap(name = "db-init")]
    DbInit,

    /// Delete all inventory data (asks for confirmation)
    #[clap(name = "db-purge")]
    DbPurge {
        /// Skip the interactive confirmation
        #[clap(long)]
        yes: bool,
    },

    /// Physically remove devices marked with status=purge
    #[clap(name = "db-purge-devices")]
    DbPurgeDevices,

    /// Show inventory connection status and record counts
    #[clap(name = "db-status")]
    DbStatus,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Discover { .. } => "discover",
            Commands::RewalkStale { .. } => "rewalk-stale",
            Commands::WalkUnwalked { .. } => "walk-unwalked",
            Commands::DbInit => "db-init",
            Commands::DbPurge { .. } => "db-purge",
            Commands::DbPurgeDevices => "db-purge-devices",
            Commands::DbStatus => "db-status",
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_discover_defaults() {
        let cli = Cli::parse_from(["netwalker", "discover"]);
        match cli.command {
            Commands::Discover {
                seeds, max_depth, ..
            } => {
                assert_eq!(seeds, PathBuf::from("seed_devices.csv"));
                assert_eq!(max_depth, None);
            }
            other => panic!("unexpected command {other}"),
        }
        assert_eq!(cli.verbosity, LevelFilter::Info);
    }

    #[test]
    fn test_rewalk_stale_takes_days() {
        let cli = Cli::parse_from(["netwalker", "rewalk-stale", "30", "--depth", "2"]);
        match cli.command {
            Commands::RewalkStale { days, depth } => {
                assert_eq!(days, 30);
                assert_eq!(depth, 2);
            }
            other => panic!("unexpected command {other}"),
        }
    }
}
