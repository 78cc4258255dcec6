use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use configparser::ini::Ini;
use log::{info, warn};

use crate::error::SetupError;
use crate::model::DiscoveryProtocol;

/// Prefix marking an obfuscated secret in a configuration file.
///
/// The encoding is reversible base-64, not encryption; it only keeps
/// passwords out of casual view of the file.
pub const ENC_PREFIX: &str = "ENC:";

/// `[discovery]` section.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub max_depth: u32,
    pub concurrent_connections: usize,
    /// Seconds allowed for a single connect attempt.
    pub connection_timeout: u64,
    /// Seconds allowed for the whole crawl.
    pub discovery_timeout: u64,
    pub protocols: Vec<DiscoveryProtocol>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            concurrent_connections: 5,
            connection_timeout: 30,
            discovery_timeout: 300,
            protocols: vec![DiscoveryProtocol::Cdp, DiscoveryProtocol::Lldp],
        }
    }
}

/// `[filtering]` section.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub include_wildcards: Vec<String>,
    pub exclude_wildcards: Vec<String>,
    pub include_cidrs: Vec<String>,
    pub exclude_cidrs: Vec<String>,
}

/// `[exclusions]` section.
#[derive(Debug, Clone, Default)]
pub struct ExclusionConfig {
    pub exclude_hostnames: Vec<String>,
    pub exclude_ip_ranges: Vec<String>,
    pub exclude_platforms: Vec<String>,
    pub exclude_capabilities: Vec<String>,
}

/// `[connection]` section.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub ssh_port: u16,
    pub telnet_port: u16,
    pub preferred_method: PreferredMethod,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ssh_port: 22,
            telnet_port: 23,
            preferred_method: PreferredMethod::Ssh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredMethod {
    Ssh,
    Telnet,
}

/// `[database]` section.
///
/// `database` is the path of the inventory file. `server` and `port` are
/// retained for status display and operator context; the embedded store does
/// not dial them.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub server: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub connection_timeout: u64,
    pub command_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: "localhost".to_string(),
            port: 1433,
            database: "netwalker.sqlite".to_string(),
            username: String::new(),
            password: String::new(),
            connection_timeout: 30,
            command_timeout: 60,
        }
    }
}

/// Complete NetWalker configuration, loaded from an INI file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub filtering: FilterConfig,
    pub exclusions: ExclusionConfig,
    pub connection: ConnectionConfig,
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from `path`, creating a commented default file
    /// first if none exists. A plain-text `[database] password` is rewritten
    /// in place with the `ENC:` encoding on first load.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, SetupError> {
        let path = path.as_ref();

        if !path.exists() {
            warn!(
                "Configuration file {} not found, creating default configuration",
                path.display()
            );
            fs::write(path, DEFAULT_CONFIG).map_err(|e| {
                SetupError::Config(format!(
                    "Failed to create default configuration at {}: {e}",
                    path.display()
                ))
            })?;
        }

        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| SetupError::Config(format!("Failed to parse {}: {e}", path.display())))?;

        let mut config = Config {
            discovery: load_discovery(&ini)?,
            filtering: load_filtering(&ini),
            exclusions: load_exclusions(&ini),
            connection: load_connection(&ini)?,
            database: load_database(&ini)?,
        };

        // Obfuscate a plain-text database password on first sight. Losing the
        // rewrite is not fatal; the next run will try again.
        if !config.database.password.is_empty()
            && !config.database.password.starts_with(ENC_PREFIX)
        {
            info!("Obfuscating plain-text database password in {}", path.display());
            let encoded = obfuscate(&config.database.password);
            ini.set("database", "password", Some(encoded));
            if let Err(e) = ini.write(path) {
                warn!("Could not rewrite {} with obfuscated password: {e}", path.display());
            }
        } else if config.database.password.starts_with(ENC_PREFIX) {
            config.database.password = deobfuscate(&config.database.password)
                .map_err(|e| SetupError::Config(format!("Invalid ENC: database password: {e}")))?;
        }

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }
}

/// Encode a secret with the reversible `ENC:` scheme.
pub fn obfuscate(secret: &str) -> String {
    format!("{ENC_PREFIX}{}", BASE64.encode(secret.as_bytes()))
}

/// Decode an `ENC:`-prefixed secret. A value without the prefix is returned
/// unchanged.
pub fn deobfuscate(value: &str) -> Result<String, String> {
    match value.strip_prefix(ENC_PREFIX) {
        None => Ok(value.to_string()),
        Some(encoded) => {
            let bytes = BASE64.decode(encoded).map_err(|e| e.to_string())?;
            String::from_utf8(bytes).map_err(|e| e.to_string())
        }
    }
}

fn load_discovery(ini: &Ini) -> Result<DiscoveryConfig, SetupError> {
    let defaults = DiscoveryConfig::default();
    let protocols = match ini.get("discovery", "discovery_protocols") {
        None => defaults.protocols.clone(),
        Some(raw) => {
            let mut protocols = Vec::new();
            for token in split_list(&raw) {
                let protocol = token
                    .to_ascii_uppercase()
                    .parse::<DiscoveryProtocol>()
                    .map_err(|_| {
                        SetupError::Config(format!("Unknown discovery protocol '{token}'"))
                    })?;
                protocols.push(protocol);
            }
            protocols
        }
    };

    Ok(DiscoveryConfig {
        max_depth: get_int(ini, "discovery", "max_depth", defaults.max_depth as i64)? as u32,
        concurrent_connections: get_int(
            ini,
            "discovery",
            "concurrent_connections",
            defaults.concurrent_connections as i64,
        )?
        .max(1) as usize,
        connection_timeout: get_int(
            ini,
            "discovery",
            "connection_timeout",
            defaults.connection_timeout as i64,
        )? as u64,
        discovery_timeout: get_int(
            ini,
            "discovery",
            "discovery_timeout",
            defaults.discovery_timeout as i64,
        )? as u64,
        protocols,
    })
}

fn load_filtering(ini: &Ini) -> FilterConfig {
    FilterConfig {
        include_wildcards: get_list(ini, "filtering", "include_wildcards"),
        exclude_wildcards: get_list(ini, "filtering", "exclude_wildcards"),
        include_cidrs: get_list(ini, "filtering", "include_cidrs"),
        exclude_cidrs: get_list(ini, "filtering", "exclude_cidrs"),
    }
}

fn load_exclusions(ini: &Ini) -> ExclusionConfig {
    ExclusionConfig {
        exclude_hostnames: get_list(ini, "exclusions", "exclude_hostnames"),
        exclude_ip_ranges: get_list(ini, "exclusions", "exclude_ip_ranges"),
        exclude_platforms: get_list(ini, "exclusions", "exclude_platforms"),
        exclude_capabilities: get_list(ini, "exclusions", "exclude_capabilities"),
    }
}

fn load_connection(ini: &Ini) -> Result<ConnectionConfig, SetupError> {
    let defaults = ConnectionConfig::default();
    let preferred_method = match ini.get("connection", "preferred_method") {
        None => defaults.preferred_method,
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "ssh" => PreferredMethod::Ssh,
            "telnet" => PreferredMethod::Telnet,
            other => {
                return Err(SetupError::Config(format!(
                    "preferred_method must be 'ssh' or 'telnet', got '{other}'"
                )))
            }
        },
    };

    Ok(ConnectionConfig {
        ssh_port: get_port(ini, "connection", "ssh_port", defaults.ssh_port)?,
        telnet_port: get_port(ini, "connection", "telnet_port", defaults.telnet_port)?,
        preferred_method,
    })
}

fn load_database(ini: &Ini) -> Result<DatabaseConfig, SetupError> {
    let defaults = DatabaseConfig::default();
    Ok(DatabaseConfig {
        enabled: get_bool(ini, "database", "enabled", defaults.enabled)?,
        server: ini
            .get("database", "server")
            .unwrap_or_else(|| defaults.server.clone()),
        port: get_port(ini, "database", "port", defaults.port)?,
        database: ini
            .get("database", "database")
            .unwrap_or_else(|| defaults.database.clone()),
        username: ini.get("database", "username").unwrap_or_default(),
        password: ini.get("database", "password").unwrap_or_default(),
        connection_timeout: get_int(
            ini,
            "database",
            "connection_timeout",
            defaults.connection_timeout as i64,
        )? as u64,
        command_timeout: get_int(
            ini,
            "database",
            "command_timeout",
            defaults.command_timeout as i64,
        )? as u64,
    })
}

fn get_int(ini: &Ini, section: &str, key: &str, default: i64) -> Result<i64, SetupError> {
    match ini.getint(section, key) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(e) => Err(SetupError::Config(format!("[{section}] {key}: {e}"))),
    }
}

fn get_port(ini: &Ini, section: &str, key: &str, default: u16) -> Result<u16, SetupError> {
    let value = get_int(ini, section, key, default as i64)?;
    if !(1..=65535).contains(&value) {
        return Err(SetupError::Config(format!(
            "[{section}] {key}: port {value} out of range"
        )));
    }
    Ok(value as u16)
}

fn get_bool(ini: &Ini, section: &str, key: &str, default: bool) -> Result<bool, SetupError> {
    match ini.getboolcoerce(section, key) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(e) => Err(SetupError::Config(format!("[{section}] {key}: {e}"))),
    }
}

/// Comma-separated list option; blank entries are dropped.
fn get_list(ini: &Ini, section: &str, key: &str) -> Vec<String> {
    match ini.get(section, key) {
        None => Vec::new(),
        Some(raw) => split_list(&raw),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

const DEFAULT_CONFIG: &str = r#"# NetWalker Configuration File

[discovery]
# Maximum depth for recursive discovery
max_depth = 1
# Number of concurrent device connections
concurrent_connections = 5
# Connection timeout in seconds
connection_timeout = 30
# Total discovery process timeout in seconds
discovery_timeout = 300
# Discovery protocols to use (comma-separated)
discovery_protocols = CDP,LLDP

[filtering]
# Include devices matching these wildcards (comma-separated)
include_wildcards = *
# Exclude devices matching these wildcards (comma-separated)
exclude_wildcards =
# Include devices in these CIDR ranges (comma-separated)
include_cidrs =
# Exclude devices in these CIDR ranges (comma-separated)
exclude_cidrs =

[exclusions]
# Exclude devices with these hostname patterns (comma-separated)
exclude_hostnames =
# Exclude devices in these IP ranges (comma-separated)
exclude_ip_ranges =
# Exclude devices with these platforms (comma-separated)
exclude_platforms = linux,windows,vmware,ip phone,access point
# Exclude devices with these capabilities (comma-separated)
exclude_capabilities = Host,Phone,Camera,Server

[connection]
# SSH port number
ssh_port = 22
# Telnet port number
telnet_port = 23
# Preferred connection method (ssh/telnet)
preferred_method = ssh

[database]
# Enable database inventory tracking (true/false)
enabled = false
# Database host, for operator reference
server = localhost
# Database port, for operator reference
port = 1433
# Inventory file path
database = netwalker.sqlite
# Database username
username =
# Database password (auto-obfuscated with ENC: on first load)
password =
# Connection timeout in seconds
connection_timeout = 30
# Command timeout in seconds
command_timeout = 60
"#;
