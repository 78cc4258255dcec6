//! NetWalker: enterprise network topology discovery.
//!
//! Logs into seed devices over SSH (Telnet fallback), harvests CDP/LLDP
//! neighbor tables, recursively visits the discovered neighbors to a
//! bounded depth, and maintains a relational inventory of devices,
//! interfaces, VLANs, software versions, stack members, and links.

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Error};
use log::{error, info};

use netwalker_api::config::Config;
use netwalker_api::credentials::CredentialStore;

pub mod cli;
mod datastore;
mod engine;
mod progress;
mod seedfile;

use cli::{Cli, Commands};
use datastore::DataStore;
use engine::CrawlEngine;
use seedfile::SeedFile;

pub const NETWALKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code for user-initiated cancellation (SIGINT convention).
pub const EXIT_CANCELLED: i32 = 130;

/// Run the selected command and return the process exit code:
/// 0 success, 1 fatal error, 130 cancelled.
pub fn run(cli: Cli) -> i32 {
    print_banner();
    info!("Running command: {}", cli.command);

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            println!("\n[FAIL] {e:#}");
            1
        }
    }
}

fn dispatch(cli: Cli) -> Result<i32, Error> {
    let config = Config::load(&cli.config)?;

    match &cli.command {
        Commands::DbInit => {
            let store = DataStore::open(&config.database)?;
            if !store.is_enabled() {
                bail!("database is disabled in the configuration ([database] enabled = false)");
            }
            println!("[OK] Inventory schema ready in {}", config.database.database);
            Ok(0)
        }

        Commands::DbPurge { yes } => {
            let store = DataStore::open(&config.database)?;
            if !*yes && !confirm_purge()? {
                println!("Purge cancelled");
                return Ok(0);
            }
            store.purge_all()?;
            println!("[OK] Inventory purged");
            Ok(0)
        }

        Commands::DbPurgeDevices => {
            let store = DataStore::open(&config.database)?;
            let count = store.purge_marked()?;
            println!("[OK] Purged {count} devices marked for deletion");
            Ok(0)
        }

        Commands::DbStatus => {
            let store = DataStore::open(&config.database)?;
            let status = store.status()?;
            println!("Database Status:");
            println!("{}", "-".repeat(60));
            println!("Enabled:   {}", status.enabled);
            println!("Connected: {}", status.connected);
            println!("Path:      {}", status.path);
            if status.connected {
                println!("\nRecord Counts:");
                for (table, count) in &status.record_counts {
                    println!("  {table}: {count}");
                }
            }
            Ok(0)
        }

        Commands::Discover {
            seeds,
            max_depth,
            concurrent_connections,
            connection_timeout,
            discovery_timeout,
        } => {
            let mut config = config;
            if let Some(depth) = max_depth {
                config.discovery.max_depth = *depth;
            }
            if let Some(workers) = concurrent_connections {
                config.discovery.concurrent_connections = (*workers).max(1);
            }
            if let Some(seconds) = connection_timeout {
                config.discovery.connection_timeout = *seconds;
            }
            if let Some(seconds) = discovery_timeout {
                config.discovery.discovery_timeout = *seconds;
            }

            let seed_file = SeedFile::load(seeds)
                .with_context(|| format!("Failed to load seed file {}", seeds.display()))?;
            crawl(&cli, config, seed_file)
        }

        Commands::RewalkStale { days, depth } => {
            let store = DataStore::open(&config.database)?;
            let devices = store.stale_devices(*days)?;
            if devices.is_empty() {
                println!("No stale devices found (not walked in {days} days)");
                return Ok(0);
            }

            println!("Found {} stale devices:", devices.len());
            for device in &devices {
                println!(
                    "  {} (IP: {}, last seen: {})",
                    device.device_name,
                    device.ip_address.as_deref().unwrap_or("No IP"),
                    device.last_seen
                );
            }
            drop(store);

            let mut config = config;
            config.discovery.max_depth = *depth;
            println!("\nWalking stale devices with depth: {depth}\n");
            crawl_database_seeds(&cli, config, &devices)
        }

        Commands::WalkUnwalked { depth } => {
            let store = DataStore::open(&config.database)?;
            let devices = store.unwalked_devices()?;
            if devices.is_empty() {
                println!("No unwalked devices found");
                return Ok(0);
            }

            println!("Found {} unwalked devices:", devices.len());
            for device in &devices {
                println!(
                    "  {} (IP: {}, platform: {}, capabilities: {})",
                    device.device_name,
                    device.ip_address.as_deref().unwrap_or("No IP"),
                    if device.platform.is_empty() {
                        "Unknown"
                    } else {
                        &device.platform
                    },
                    if device.capabilities.is_empty() {
                        "None"
                    } else {
                        &device.capabilities
                    },
                );
            }
            drop(store);

            let mut config = config;
            config.discovery.max_depth = *depth;
            println!("\nWalking unwalked devices with depth: {depth}\n");
            crawl_database_seeds(&cli, config, &devices)
        }
    }
}

/// Materialize database-selected devices into a temporary seed CSV so the
/// crawl is resumable the same way a file-driven one is, then crawl it.
fn crawl_database_seeds(
    cli: &Cli,
    config: Config,
    devices: &[datastore::SeedDevice],
) -> Result<i32, Error> {
    let entries: Vec<(String, Option<String>)> = devices
        .iter()
        .map(|device| (device.device_name.clone(), device.ip_address.clone()))
        .collect();

    let temp_path = tempfile::Builder::new()
        .prefix("netwalker-seeds-")
        .suffix(".csv")
        .tempfile()
        .context("Failed to create temporary seed file")?
        .into_temp_path();
    let seed_file = SeedFile::create(&temp_path, &entries)?;
    info!(
        "Materialized {} database seeds into {}",
        entries.len(),
        temp_path.display()
    );

    // temp_path is removed on drop, after the crawl is done with it.
    crawl(cli, config, seed_file)
}

fn crawl(cli: &Cli, config: Config, seed_file: SeedFile) -> Result<i32, Error> {
    let credentials = CredentialStore::new(
        cli.username.clone(),
        cli.password.clone(),
        cli.enable_password,
    )
    .get()?;

    let store = DataStore::open(&config.database)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        println!("\nInterrupt received - letting in-flight devices finish...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;

    println!("Starting Network Topology Discovery...");
    println!("{}", "-".repeat(80));

    let engine = CrawlEngine::new(config, credentials, store, seed_file, cancelled)?;
    let summary = engine.run();
    summary.display();

    if summary.cancelled {
        Ok(EXIT_CANCELLED)
    } else {
        Ok(0)
    }
}

fn confirm_purge() -> Result<bool, Error> {
    println!("WARNING: This will delete ALL data from the inventory!");
    print!("Type 'YES' to confirm: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim() == "YES")
}

fn print_banner() {
    let separator = "=".repeat(80);
    println!("{separator}");
    println!("Program: NetWalker");
    println!("Version: {NETWALKER_VERSION}");
    println!("{}", "-".repeat(80));
    println!(
        "Hostname: {}",
        std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
    );
    println!(
        "Execution Path: {}",
        std::env::current_dir()
            .as_deref()
            .unwrap_or(Path::new("?"))
            .display()
    );
    println!("{separator}");
    println!();
}
