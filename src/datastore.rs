//! The relational inventory: devices, interfaces, VLANs, software versions,
//! stack members, and neighbor edges, in an embedded SQLite file.
//!
//! All upserts are idempotent on the natural keys from the data model, so
//! re-crawling an unchanged network only advances `last_seen` columns. With
//! `[database] enabled = false` every write is a no-op and every query is
//! empty; the crawl then relies on in-memory visited tracking alone.

use anyhow::{bail, Context, Error};
use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, info};
use sqlite::State;

use netwalker_api::config::DatabaseConfig;
use netwalker_api::model::{
    Capability, InterfaceInfo, NeighborInfo, StackMemberInfo, VlanInfo, PRIMARY_MANAGEMENT,
    UNKNOWN_SERIAL,
};

/// Inventory tables, in foreign-key order.
const TABLES: &[&str] = &[
    "devices",
    "device_versions",
    "device_interfaces",
    "vlans",
    "device_vlans",
    "device_stack_members",
    "device_neighbors",
];

/// Identity attributes written on a device upsert.
#[derive(Debug, Clone, Default)]
pub struct DeviceRecord {
    pub device_name: String,
    pub serial_number: String,
    pub platform: String,
    pub hardware_model: String,
    pub capabilities: Vec<Capability>,
}

impl DeviceRecord {
    pub fn placeholder(name: &str, platform: &str, capabilities: &[Capability]) -> Self {
        Self {
            device_name: name.to_string(),
            serial_number: UNKNOWN_SERIAL.to_string(),
            platform: platform.to_string(),
            hardware_model: String::new(),
            capabilities: capabilities.to_vec(),
        }
    }
}

/// A device row pulled out for seeding a crawl.
#[derive(Debug, Clone)]
pub struct SeedDevice {
    pub device_name: String,
    pub ip_address: Option<String>,
    pub last_seen: String,
    pub platform: String,
    pub capabilities: String,
}

/// Connection status and per-table record counts, for `db-status`.
#[derive(Debug)]
pub struct DatabaseStatus {
    pub enabled: bool,
    pub connected: bool,
    pub path: String,
    pub record_counts: Vec<(&'static str, i64)>,
}

pub struct DataStore {
    db: Option<sqlite::Connection>,
    path: String,
}

impl DataStore {
    /// Open (and auto-create) the inventory. A disabled configuration
    /// produces a store whose writes are no-ops.
    pub fn open(config: &DatabaseConfig) -> Result<Self, Error> {
        if !config.enabled {
            info!("Inventory database disabled in configuration");
            return Ok(Self {
                db: None,
                path: config.database.clone(),
            });
        }

        info!("Opening inventory database {}", config.database);
        let db = sqlite::open(&config.database)
            .with_context(|| format!("Failed to open inventory database {}", config.database))?;
        db.execute("PRAGMA foreign_keys = ON")?;
        Self::create_schema(&db).context("Failed to initialize inventory schema")?;

        Ok(Self {
            db: Some(db),
            path: config.database.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    fn create_schema(db: &sqlite::Connection) -> Result<(), Error> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS devices (
                device_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_name TEXT NOT NULL,
                serial_number TEXT NOT NULL,
                platform TEXT NOT NULL DEFAULT '',
                hardware_model TEXT NOT NULL DEFAULT '',
                capabilities TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active',
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (device_name, serial_number)
            );
            CREATE INDEX IF NOT EXISTS ix_devices_status ON devices(status);
            CREATE INDEX IF NOT EXISTS ix_devices_last_seen ON devices(last_seen);

            CREATE TABLE IF NOT EXISTS device_versions (
                version_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
                software_version TEXT NOT NULL,
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (device_id, software_version)
            );

            CREATE TABLE IF NOT EXISTS device_interfaces (
                interface_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
                interface_name TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                subnet_mask TEXT NOT NULL DEFAULT '',
                interface_type TEXT NOT NULL DEFAULT '',
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (device_id, interface_name, ip_address)
            );
            CREATE INDEX IF NOT EXISTS ix_device_interfaces_ip ON device_interfaces(ip_address);

            CREATE TABLE IF NOT EXISTS vlans (
                vlan_id INTEGER PRIMARY KEY AUTOINCREMENT,
                vlan_number INTEGER NOT NULL CHECK (vlan_number BETWEEN 1 AND 4094),
                vlan_name TEXT NOT NULL,
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (vlan_number, vlan_name)
            );

            CREATE TABLE IF NOT EXISTS device_vlans (
                device_vlan_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
                vlan_id INTEGER NOT NULL REFERENCES vlans(vlan_id) ON DELETE CASCADE,
                vlan_number INTEGER NOT NULL,
                vlan_name TEXT NOT NULL,
                port_count INTEGER NOT NULL DEFAULT 0,
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (device_id, vlan_id)
            );

            CREATE TABLE IF NOT EXISTS device_stack_members (
                stack_member_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
                switch_number INTEGER NOT NULL,
                role TEXT NOT NULL DEFAULT '',
                priority INTEGER,
                hardware_model TEXT NOT NULL DEFAULT '',
                serial_number TEXT NOT NULL DEFAULT '',
                mac_address TEXT,
                software_version TEXT,
                state TEXT NOT NULL DEFAULT '',
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (device_id, switch_number)
            );

            CREATE TABLE IF NOT EXISTS device_neighbors (
                neighbor_id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_device_id INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
                source_interface TEXT NOT NULL,
                destination_device_id INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
                destination_interface TEXT NOT NULL,
                protocol TEXT NOT NULL DEFAULT '',
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (source_device_id, source_interface,
                        destination_device_id, destination_interface)
            );",
        )?;
        Ok(())
    }

    /// Run `work` inside one transaction; any error rolls the whole unit
    /// back and leaves the inventory untouched.
    fn transaction<T>(
        db: &sqlite::Connection,
        work: impl FnOnce(&sqlite::Connection) -> Result<T, Error>,
    ) -> Result<T, Error> {
        db.execute("BEGIN IMMEDIATE")?;
        match work(db) {
            Ok(value) => {
                db.execute("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = db.execute("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Insert or update a device row, returning its id.
    ///
    /// Field promotion is one-way: an `unknown` serial upgrades in place to
    /// a real one (same row, so neighbor foreign keys stay valid) and blank
    /// platform/model/capability fields fill in, but real values are never
    /// overwritten with blanks.
    pub fn upsert_device(&self, record: &DeviceRecord) -> Result<Option<i64>, Error> {
        let Some(db) = &self.db else {
            return Ok(None);
        };
        if record.device_name.is_empty() {
            bail!("device upsert requires a device name");
        }

        let id = Self::transaction(db, |db| Self::upsert_device_tx(db, record))?;
        Ok(Some(id))
    }

    fn upsert_device_tx(db: &sqlite::Connection, record: &DeviceRecord) -> Result<i64, Error> {
        let capabilities = join_capabilities(&record.capabilities);

        // Exact (name, serial) hit.
        if let Some(device_id) =
            Self::find_device(db, &record.device_name, Some(&record.serial_number))?
        {
            Self::promote_device(db, device_id, record, &capabilities)?;
            return Ok(device_id);
        }

        // A real serial may be the upgrade of an existing placeholder row.
        if record.serial_number != UNKNOWN_SERIAL {
            if let Some(device_id) =
                Self::find_device(db, &record.device_name, Some(UNKNOWN_SERIAL))?
            {
                debug!(
                    "Upgrading placeholder {} to serial {}",
                    record.device_name, record.serial_number
                );
                let mut statement = db.prepare(
                    "UPDATE devices SET serial_number = ?, last_seen = datetime('now')
                     WHERE device_id = ?",
                )?;
                statement.bind((1, record.serial_number.as_str()))?;
                statement.bind((2, device_id))?;
                statement.next()?;
                Self::promote_device(db, device_id, record, &capabilities)?;
                return Ok(device_id);
            }
        } else if let Some(device_id) = Self::find_device(db, &record.device_name, None)? {
            // Placeholder sighting of a device already known under a real
            // serial: just a last_seen bump.
            Self::promote_device(db, device_id, record, &capabilities)?;
            return Ok(device_id);
        }

        let mut statement = db.prepare(
            "INSERT INTO devices
                 (device_name, serial_number, platform, hardware_model, capabilities)
             VALUES (?, ?, ?, ?, ?)",
        )?;
        statement.bind((1, record.device_name.as_str()))?;
        statement.bind((2, record.serial_number.as_str()))?;
        statement.bind((3, record.platform.as_str()))?;
        statement.bind((4, record.hardware_model.as_str()))?;
        statement.bind((5, capabilities.as_str()))?;
        statement.next()?;

        let device_id = Self::last_insert_id(db)?;
        info!("Created device {} (id {device_id})", record.device_name);
        Ok(device_id)
    }

    fn find_device(
        db: &sqlite::Connection,
        name: &str,
        serial: Option<&str>,
    ) -> Result<Option<i64>, Error> {
        let mut statement = match serial {
            Some(_) => db.prepare(
                "SELECT device_id FROM devices
                 WHERE device_name = ? COLLATE NOCASE AND serial_number = ?",
            )?,
            None => db.prepare(
                "SELECT device_id FROM devices
                 WHERE device_name = ? COLLATE NOCASE
                 ORDER BY (serial_number = 'unknown'), device_id
                 LIMIT 1",
            )?,
        };
        statement.bind((1, name))?;
        if let Some(serial) = serial {
            statement.bind((2, serial))?;
        }
        match statement.next()? {
            State::Row => Ok(Some(statement.read::<i64, _>(0)?)),
            State::Done => Ok(None),
        }
    }

    /// Bump `last_seen` and fill blank fields from `record`.
    fn promote_device(
        db: &sqlite::Connection,
        device_id: i64,
        record: &DeviceRecord,
        capabilities: &str,
    ) -> Result<(), Error> {
        let mut statement = db.prepare(
            "UPDATE devices SET
                 last_seen = datetime('now'),
                 status = 'active',
                 platform = CASE WHEN ?1 != '' THEN ?1 ELSE platform END,
                 hardware_model = CASE WHEN ?2 != '' THEN ?2 ELSE hardware_model END,
                 capabilities = CASE WHEN ?3 != '' THEN ?3 ELSE capabilities END
             WHERE device_id = ?4",
        )?;
        statement.bind((1, record.platform.as_str()))?;
        statement.bind((2, record.hardware_model.as_str()))?;
        statement.bind((3, capabilities))?;
        statement.bind((4, device_id))?;
        statement.next()?;
        Ok(())
    }

    fn last_insert_id(db: &sqlite::Connection) -> Result<i64, Error> {
        let mut statement = db.prepare("SELECT last_insert_rowid()")?;
        statement.next()?;
        Ok(statement.read::<i64, _>(0)?)
    }

    /// Record a software version observation, keeping the per-version
    /// first/last-seen history.
    pub fn upsert_version(&self, device_id: i64, version: &str) -> Result<(), Error> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        if version.is_empty() || version == UNKNOWN_SERIAL {
            return Ok(());
        }

        Self::transaction(db, |db| {
            let mut statement = db.prepare(
                "INSERT INTO device_versions (device_id, software_version)
                 VALUES (?, ?)
                 ON CONFLICT (device_id, software_version)
                 DO UPDATE SET last_seen = datetime('now')",
            )?;
            statement.bind((1, device_id))?;
            statement.bind((2, version))?;
            statement.next()?;
            Ok(())
        })
    }

    /// Strict insert-or-update on (device, interface, ip).
    pub fn upsert_interface(&self, device_id: i64, interface: &InterfaceInfo) -> Result<(), Error> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        if interface.name.is_empty() || interface.ip_address.is_empty() {
            return Ok(());
        }

        Self::transaction(db, |db| {
            let mut statement = db.prepare(
                "INSERT INTO device_interfaces
                     (device_id, interface_name, ip_address, subnet_mask, interface_type)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT (device_id, interface_name, ip_address)
                 DO UPDATE SET
                     last_seen = datetime('now'),
                     subnet_mask = excluded.subnet_mask,
                     interface_type = excluded.interface_type",
            )?;
            statement.bind((1, device_id))?;
            statement.bind((2, interface.name.as_str()))?;
            statement.bind((3, interface.ip_address.as_str()))?;
            statement.bind((4, interface.subnet_mask.as_str()))?;
            statement.bind((5, interface.interface_type.to_string().as_str()))?;
            statement.next()?;
            Ok(())
        })
    }

    /// Link a device to a VLAN. A name change for the same VLAN number
    /// replaces the link row instead of accumulating a duplicate.
    pub fn upsert_device_vlan(&self, device_id: i64, vlan: &VlanInfo) -> Result<(), Error> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        if vlan.name.is_empty() {
            return Ok(());
        }

        Self::transaction(db, |db| {
            let mut statement = db.prepare(
                "INSERT INTO vlans (vlan_number, vlan_name) VALUES (?, ?)
                 ON CONFLICT (vlan_number, vlan_name)
                 DO UPDATE SET last_seen = datetime('now')",
            )?;
            statement.bind((1, vlan.number as i64))?;
            statement.bind((2, vlan.name.as_str()))?;
            statement.next()?;

            let mut statement = db
                .prepare("SELECT vlan_id FROM vlans WHERE vlan_number = ? AND vlan_name = ?")?;
            statement.bind((1, vlan.number as i64))?;
            statement.bind((2, vlan.name.as_str()))?;
            if statement.next()? != State::Row {
                bail!("vlan row vanished during upsert");
            }
            let vlan_id = statement.read::<i64, _>(0)?;

            // Existing link for this VLAN number on this device?
            let mut statement = db.prepare(
                "SELECT device_vlan_id, vlan_name FROM device_vlans
                 WHERE device_id = ? AND vlan_number = ?",
            )?;
            statement.bind((1, device_id))?;
            statement.bind((2, vlan.number as i64))?;

            if statement.next()? == State::Row {
                let link_id = statement.read::<i64, _>(0)?;
                let existing_name = statement.read::<String, _>(1)?;
                if existing_name != vlan.name {
                    info!(
                        "VLAN {} renamed '{existing_name}' -> '{}' on device {device_id}",
                        vlan.number, vlan.name
                    );
                    let mut statement =
                        db.prepare("DELETE FROM device_vlans WHERE device_vlan_id = ?")?;
                    statement.bind((1, link_id))?;
                    statement.next()?;
                } else {
                    let mut statement = db.prepare(
                        "UPDATE device_vlans
                         SET last_seen = datetime('now'), port_count = ?
                         WHERE device_vlan_id = ?",
                    )?;
                    statement.bind((1, vlan.port_count as i64))?;
                    statement.bind((2, link_id))?;
                    statement.next()?;
                    return Ok(());
                }
            }

            let mut statement = db.prepare(
                "INSERT INTO device_vlans
                     (device_id, vlan_id, vlan_number, vlan_name, port_count)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            statement.bind((1, device_id))?;
            statement.bind((2, vlan_id))?;
            statement.bind((3, vlan.number as i64))?;
            statement.bind((4, vlan.name.as_str()))?;
            statement.bind((5, vlan.port_count as i64))?;
            statement.next()?;
            Ok(())
        })
    }

    pub fn upsert_stack_member(
        &self,
        device_id: i64,
        member: &StackMemberInfo,
    ) -> Result<(), Error> {
        let Some(db) = &self.db else {
            return Ok(());
        };

        Self::transaction(db, |db| {
            let mut statement = db.prepare(
                "INSERT INTO device_stack_members
                     (device_id, switch_number, role, priority, hardware_model,
                      serial_number, mac_address, software_version, state)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (device_id, switch_number)
                 DO UPDATE SET
                     last_seen = datetime('now'),
                     role = excluded.role,
                     priority = excluded.priority,
                     hardware_model = excluded.hardware_model,
                     serial_number = excluded.serial_number,
                     mac_address = excluded.mac_address,
                     software_version = excluded.software_version,
                     state = excluded.state",
            )?;
            statement.bind((1, device_id))?;
            statement.bind((2, member.switch_number as i64))?;
            statement.bind((3, member.role.to_string().as_str()))?;
            statement.bind((4, member.priority.map(|p| p as i64)))?;
            statement.bind((5, member.hardware_model.as_str()))?;
            statement.bind((6, member.serial_number.as_str()))?;
            statement.bind((7, member.mac_address.as_deref()))?;
            statement.bind((8, member.software_version.as_deref()))?;
            statement.bind((9, member.state.as_str()))?;
            statement.next()?;
            Ok(())
        })
    }

    /// Record a directed link. The destination hostname is resolved to an
    /// existing device, creating a placeholder row (serial `unknown`) when
    /// none exists so that the foreign key holds. A sighting from the other
    /// end of the same link updates the existing row rather than mirroring
    /// it.
    pub fn upsert_neighbor(&self, source_id: i64, neighbor: &NeighborInfo) -> Result<(), Error> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        if neighbor.remote_name.is_empty() || neighbor.local_interface.is_empty() {
            return Ok(());
        }

        Self::transaction(db, |db| {
            let destination_id = match Self::find_device(db, &neighbor.remote_name, None)? {
                Some(id) => id,
                None => {
                    let placeholder = DeviceRecord::placeholder(
                        &neighbor.remote_name,
                        &neighbor.platform,
                        &neighbor.capabilities,
                    );
                    Self::upsert_device_tx(db, &placeholder)?
                }
            };

            let mut statement = db.prepare(
                "SELECT neighbor_id FROM device_neighbors
                 WHERE (source_device_id = :src AND source_interface = :src_if
                        AND destination_device_id = :dst AND destination_interface = :dst_if)
                    OR (source_device_id = :dst AND source_interface = :dst_if
                        AND destination_device_id = :src AND destination_interface = :src_if)",
            )?;
            statement.bind((":src", source_id))?;
            statement.bind((":src_if", neighbor.local_interface.as_str()))?;
            statement.bind((":dst", destination_id))?;
            statement.bind((":dst_if", neighbor.remote_interface.as_str()))?;

            if statement.next()? == State::Row {
                let edge_id = statement.read::<i64, _>(0)?;
                let mut statement = db.prepare(
                    "UPDATE device_neighbors
                     SET last_seen = datetime('now'), protocol = ?
                     WHERE neighbor_id = ?",
                )?;
                statement.bind((1, neighbor.protocol.to_string().as_str()))?;
                statement.bind((2, edge_id))?;
                statement.next()?;
                return Ok(());
            }

            let mut statement = db.prepare(
                "INSERT INTO device_neighbors
                     (source_device_id, source_interface,
                      destination_device_id, destination_interface, protocol)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            statement.bind((1, source_id))?;
            statement.bind((2, neighbor.local_interface.as_str()))?;
            statement.bind((3, destination_id))?;
            statement.bind((4, neighbor.remote_interface.as_str()))?;
            statement.bind((5, neighbor.protocol.to_string().as_str()))?;
            statement.next()?;
            Ok(())
        })
    }

    /// Preferred reachability address for a hostname: the `Primary
    /// Management` row first, then loopbacks, then SVIs, then anything else,
    /// alphabetically within each tier.
    pub fn primary_ip(&self, hostname: &str) -> Result<Option<String>, Error> {
        let Some(db) = &self.db else {
            return Ok(None);
        };

        let mut statement = db.prepare(
            "SELECT di.ip_address
             FROM device_interfaces di
             INNER JOIN devices d ON d.device_id = di.device_id
             WHERE d.device_name = ? COLLATE NOCASE
             ORDER BY
                 CASE
                     WHEN di.interface_name = ? THEN 0
                     WHEN di.interface_type = 'loopback' THEN 1
                     WHEN di.interface_type = 'vlan' THEN 2
                     ELSE 3
                 END,
                 di.interface_name
             LIMIT 1",
        )?;
        statement.bind((1, hostname))?;
        statement.bind((2, PRIMARY_MANAGEMENT))?;

        match statement.next()? {
            State::Row => Ok(Some(statement.read::<String, _>(0)?)),
            State::Done => Ok(None),
        }
    }

    /// Active devices whose `last_seen` is older than `days` days.
    pub fn stale_devices(&self, days: u32) -> Result<Vec<SeedDevice>, Error> {
        let Some(db) = &self.db else {
            return Ok(Vec::new());
        };

        let cutoff = (Utc::now() - ChronoDuration::days(days as i64))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let mut statement = db.prepare(
            "SELECT device_name, last_seen, platform, capabilities FROM devices
             WHERE status = 'active' AND last_seen <= ?
             ORDER BY device_name",
        )?;
        statement.bind((1, cutoff.as_str()))?;
        self.collect_seeds(statement)
    }

    /// Devices known only from neighbor sightings (placeholder serial).
    pub fn unwalked_devices(&self) -> Result<Vec<SeedDevice>, Error> {
        let Some(db) = &self.db else {
            return Ok(Vec::new());
        };

        let mut statement = db.prepare(
            "SELECT device_name, last_seen, platform, capabilities FROM devices
             WHERE status = 'active' AND serial_number = ?
             ORDER BY device_name",
        )?;
        statement.bind((1, UNKNOWN_SERIAL))?;
        self.collect_seeds(statement)
    }

    fn collect_seeds(&self, mut statement: sqlite::Statement) -> Result<Vec<SeedDevice>, Error> {
        let mut rows = Vec::new();
        while statement.next()? == State::Row {
            rows.push(SeedDevice {
                device_name: statement.read::<String, _>(0)?,
                ip_address: None,
                last_seen: statement.read::<String, _>(1)?,
                platform: statement.read::<String, _>(2)?,
                capabilities: statement.read::<String, _>(3)?,
            });
        }
        drop(statement);
        // The reachability address comes from the interface priority query,
        // run after the row iteration so one statement is live at a time.
        for row in &mut rows {
            row.ip_address = self.primary_ip(&row.device_name)?;
        }
        Ok(rows)
    }

    pub fn status(&self) -> Result<DatabaseStatus, Error> {
        let mut status = DatabaseStatus {
            enabled: self.is_enabled(),
            connected: false,
            path: self.path.clone(),
            record_counts: Vec::new(),
        };
        let Some(db) = &self.db else {
            return Ok(status);
        };

        status.connected = true;
        for table in TABLES {
            let mut statement = db.prepare(format!("SELECT COUNT(*) FROM {table}"))?;
            statement.next()?;
            status
                .record_counts
                .push((table, statement.read::<i64, _>(0)?));
        }
        Ok(status)
    }

    /// Delete all data, keeping the schema.
    pub fn purge_all(&self) -> Result<(), Error> {
        let Some(db) = &self.db else {
            bail!("database is disabled");
        };

        Self::transaction(db, |db| {
            for table in TABLES.iter().rev() {
                db.execute(format!("DELETE FROM {table}"))?;
            }
            Ok(())
        })?;
        info!("Inventory purged");
        Ok(())
    }

    /// Physically delete devices soft-deleted with `status = 'purge'`.
    /// Returns the number of devices removed.
    pub fn purge_marked(&self) -> Result<i64, Error> {
        let Some(db) = &self.db else {
            bail!("database is disabled");
        };

        Self::transaction(db, |db| {
            let mut statement =
                db.prepare("SELECT COUNT(*) FROM devices WHERE status = 'purge'")?;
            statement.next()?;
            let count = statement.read::<i64, _>(0)?;
            if count > 0 {
                db.execute("DELETE FROM devices WHERE status = 'purge'")?;
            }
            Ok(count)
        })
    }

    /// Soft-delete a device by name; a later `db-purge-devices` removes it.
    pub fn mark_for_purge(&self, device_name: &str) -> Result<bool, Error> {
        let Some(db) = &self.db else {
            bail!("database is disabled");
        };

        Self::transaction(db, |db| {
            let mut statement = db.prepare(
                "UPDATE devices SET status = 'purge'
                 WHERE device_name = ? COLLATE NOCASE",
            )?;
            statement.bind((1, device_name))?;
            statement.next()?;
            let mut statement = db.prepare("SELECT changes()")?;
            statement.next()?;
            Ok(statement.read::<i64, _>(0)? > 0)
        })
    }
}

fn join_capabilities(capabilities: &[Capability]) -> String {
    capabilities
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use netwalker_api::model::{DiscoveryProtocol, InterfaceType};
    use tempfile::TempDir;

    use super::*;

    fn open_store(dir: &TempDir) -> DataStore {
        let config = DatabaseConfig {
            enabled: true,
            database: dir
                .path()
                .join("inventory.sqlite")
                .to_string_lossy()
                .into_owned(),
            ..Default::default()
        };
        DataStore::open(&config).unwrap()
    }

    fn device(name: &str, serial: &str) -> DeviceRecord {
        DeviceRecord {
            device_name: name.to_string(),
            serial_number: serial.to_string(),
            platform: "IOS".to_string(),
            hardware_model: "WS-C3850-48T".to_string(),
            capabilities: vec![Capability::Switch],
        }
    }

    fn neighbor(name: &str, local: &str, remote: &str) -> NeighborInfo {
        NeighborInfo {
            local_interface: local.to_string(),
            remote_name: name.to_string(),
            remote_interface: remote.to_string(),
            remote_ip: None,
            platform: "cisco WS-C3750X-48P".to_string(),
            capabilities: vec![Capability::Switch],
            protocol: DiscoveryProtocol::Cdp,
        }
    }

    fn count(store: &DataStore, table: &str) -> i64 {
        let db = store.db.as_ref().unwrap();
        let mut statement = db.prepare(format!("SELECT COUNT(*) FROM {table}")).unwrap();
        statement.next().unwrap();
        statement.read::<i64, _>(0).unwrap()
    }

    #[test]
    fn test_device_upsert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let first = store
            .upsert_device(&device("CORE-A", "FOC111"))
            .unwrap()
            .unwrap();
        let second = store
            .upsert_device(&device("CORE-A", "FOC111"))
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(count(&store, "devices"), 1);
    }

    #[test]
    fn test_placeholder_upgrade_keeps_row() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        // Neighbor sighting creates the placeholder.
        let source = store
            .upsert_device(&device("CORE-A", "FOC111"))
            .unwrap()
            .unwrap();
        store
            .upsert_neighbor(
                source,
                &neighbor("DIST-A", "GigabitEthernet1/0/1", "GigabitEthernet1/0/24"),
            )
            .unwrap();
        assert_eq!(count(&store, "devices"), 2);

        let placeholders = store.unwalked_devices().unwrap();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].device_name, "DIST-A");

        // Real visit upgrades the same row.
        let upgraded = store
            .upsert_device(&device("DIST-A", "FOC222"))
            .unwrap()
            .unwrap();
        assert_eq!(count(&store, "devices"), 2);
        assert!(store.unwalked_devices().unwrap().is_empty());

        // The edge's foreign key still points at the upgraded row.
        let db = store.db.as_ref().unwrap();
        let mut statement = db
            .prepare("SELECT destination_device_id FROM device_neighbors")
            .unwrap();
        statement.next().unwrap();
        assert_eq!(statement.read::<i64, _>(0).unwrap(), upgraded);
    }

    #[test]
    fn test_promote_never_demotes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.upsert_device(&device("CORE-A", "FOC111")).unwrap();

        // A later sighting with blank attributes must not erase anything.
        store
            .upsert_device(&DeviceRecord {
                device_name: "CORE-A".to_string(),
                serial_number: "FOC111".to_string(),
                ..Default::default()
            })
            .unwrap();

        let db = store.db.as_ref().unwrap();
        let mut statement = db
            .prepare("SELECT platform, hardware_model FROM devices")
            .unwrap();
        statement.next().unwrap();
        assert_eq!(statement.read::<String, _>(0).unwrap(), "IOS");
        assert_eq!(statement.read::<String, _>(1).unwrap(), "WS-C3850-48T");
    }

    #[test]
    fn test_neighbor_edge_deduplicates_reverse_sighting() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let a = store.upsert_device(&device("A", "SER-A")).unwrap().unwrap();
        let b = store.upsert_device(&device("B", "SER-B")).unwrap().unwrap();

        store
            .upsert_neighbor(
                a,
                &neighbor("B", "GigabitEthernet1/0/1", "GigabitEthernet1/0/24"),
            )
            .unwrap();
        // Seen again from the far end, interfaces swapped.
        store
            .upsert_neighbor(
                b,
                &neighbor("A", "GigabitEthernet1/0/24", "GigabitEthernet1/0/1"),
            )
            .unwrap();

        assert_eq!(count(&store, "device_neighbors"), 1);
    }

    #[test]
    fn test_parallel_links_are_distinct_edges() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let a = store.upsert_device(&device("A", "SER-A")).unwrap().unwrap();
        store
            .upsert_neighbor(a, &neighbor("B", "Gi1/0/1", "Gi1/0/24"))
            .unwrap();
        store
            .upsert_neighbor(a, &neighbor("B", "Gi1/0/2", "Gi1/0/23"))
            .unwrap();

        assert_eq!(count(&store, "device_neighbors"), 2);
    }

    #[test]
    fn test_vlan_rename_replaces_link() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = store.upsert_device(&device("SW", "S1")).unwrap().unwrap();

        store
            .upsert_device_vlan(
                id,
                &VlanInfo {
                    number: 100,
                    name: "USERS".to_string(),
                    port_count: 12,
                },
            )
            .unwrap();
        store
            .upsert_device_vlan(
                id,
                &VlanInfo {
                    number: 100,
                    name: "STAFF".to_string(),
                    port_count: 12,
                },
            )
            .unwrap();

        assert_eq!(count(&store, "device_vlans"), 1, "rename must replace the link");
        assert_eq!(count(&store, "vlans"), 2, "both names stay in the vlan table");

        let db = store.db.as_ref().unwrap();
        let mut statement = db.prepare("SELECT vlan_name FROM device_vlans").unwrap();
        statement.next().unwrap();
        assert_eq!(statement.read::<String, _>(0).unwrap(), "STAFF");
    }

    #[test]
    fn test_primary_ip_priority() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = store
            .upsert_device(&device("CORE-A", "FOC111"))
            .unwrap()
            .unwrap();

        let interface = |name: &str, ip: &str, kind: InterfaceType| InterfaceInfo {
            name: name.to_string(),
            ip_address: ip.to_string(),
            subnet_mask: "255.255.255.0".to_string(),
            interface_type: kind,
        };

        store
            .upsert_interface(id, &interface("Vlan100", "10.0.100.1", InterfaceType::Vlan))
            .unwrap();
        assert_eq!(
            store.primary_ip("CORE-A").unwrap().as_deref(),
            Some("10.0.100.1")
        );

        store
            .upsert_interface(
                id,
                &interface("Loopback0", "10.255.0.1", InterfaceType::Loopback),
            )
            .unwrap();
        assert_eq!(
            store.primary_ip("CORE-A").unwrap().as_deref(),
            Some("10.255.0.1")
        );

        store
            .upsert_interface(
                id,
                &interface(PRIMARY_MANAGEMENT, "10.1.1.1", InterfaceType::Management),
            )
            .unwrap();
        assert_eq!(
            store.primary_ip("CORE-A").unwrap().as_deref(),
            Some("10.1.1.1")
        );

        assert_eq!(store.primary_ip("NOBODY").unwrap(), None);
    }

    #[test]
    fn test_stale_devices() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.upsert_device(&device("OLD-SW", "S1")).unwrap();

        // Nothing is stale at a 1-day threshold; everything is at 0 days.
        assert!(store.stale_devices(1).unwrap().is_empty());
        let stale = store.stale_devices(0).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].device_name, "OLD-SW");
    }

    #[test]
    fn test_purge_marked_devices() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.upsert_device(&device("KEEP", "S1")).unwrap();
        store.upsert_device(&device("DROP", "S2")).unwrap();

        assert!(store.mark_for_purge("DROP").unwrap());
        assert!(!store.mark_for_purge("MISSING").unwrap());
        assert_eq!(store.purge_marked().unwrap(), 1);
        assert_eq!(count(&store, "devices"), 1);
        assert_eq!(store.purge_marked().unwrap(), 0);
    }

    #[test]
    fn test_disabled_store_is_a_no_op() {
        let store = DataStore::open(&DatabaseConfig::default()).unwrap();
        assert!(!store.is_enabled());

        assert_eq!(store.upsert_device(&device("A", "S")).unwrap(), None);
        assert!(store.primary_ip("A").unwrap().is_none());
        assert!(store.stale_devices(0).unwrap().is_empty());
        assert!(store.unwalked_devices().unwrap().is_empty());
        assert!(store.purge_all().is_err());

        let status = store.status().unwrap();
        assert!(!status.enabled);
        assert!(!status.connected);
    }

    #[test]
    fn test_version_history_accumulates() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let id = store.upsert_device(&device("SW", "S1")).unwrap().unwrap();

        store.upsert_version(id, "15.2(4)E10").unwrap();
        store.upsert_version(id, "15.2(4)E10").unwrap();
        store.upsert_version(id, "16.12.04").unwrap();

        assert_eq!(count(&store, "device_versions"), 2);
    }
}
