//! The resumable seed CSV.
//!
//! Columns: `hostname,ip_address,status,error_details`. A blank status is a
//! pending device, `done` is a committed visit, `error` carries its label in
//! `error_details`. The engine rewrites the file on every status change, so
//! an interrupted crawl resumes from the first still-blank row. Devices
//! discovered mid-crawl are appended as new pending rows.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Error};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStatus {
    Pending,
    Done,
    Error,
}

impl SeedStatus {
    fn as_str(&self) -> &'static str {
        match self {
            SeedStatus::Pending => "",
            SeedStatus::Done => "done",
            SeedStatus::Error => "error",
        }
    }

    fn parse(raw: &str) -> Result<Self, Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(SeedStatus::Pending),
            "done" => Ok(SeedStatus::Done),
            "error" => Ok(SeedStatus::Error),
            other => bail!("unknown seed status '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeedRow {
    pub hostname: String,
    pub ip_address: String,
    pub status: SeedStatus,
    pub error_details: String,
}

pub struct SeedFile {
    path: PathBuf,
    rows: Vec<SeedRow>,
    index: HashMap<String, usize>,
}

impl SeedFile {
    /// Load an existing seed file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .with_context(|| format!("Failed to open seed file {}", path.display()))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("Malformed seed file row")?;
            let hostname = record.get(0).unwrap_or("").to_string();
            if hostname.is_empty() {
                continue;
            }
            rows.push(SeedRow {
                hostname,
                ip_address: record.get(1).unwrap_or("").to_string(),
                status: SeedStatus::parse(record.get(2).unwrap_or(""))?,
                error_details: record.get(3).unwrap_or("").to_string(),
            });
        }

        let index = build_index(&rows);
        info!("Loaded {} seed rows from {}", rows.len(), path.display());
        Ok(Self { path, rows, index })
    }

    /// Write a fresh seed file for `entries` and load it back. Used to give
    /// database-driven crawls (stale / unwalked) the same resume behavior as
    /// file-driven ones.
    pub fn create(
        path: impl AsRef<Path>,
        entries: &[(String, Option<String>)],
    ) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let rows: Vec<SeedRow> = entries
            .iter()
            .map(|(hostname, ip)| SeedRow {
                hostname: hostname.clone(),
                ip_address: ip.clone().unwrap_or_default(),
                status: SeedStatus::Pending,
                error_details: String::new(),
            })
            .collect();

        let index = build_index(&rows);
        let file = Self { path, rows, index };
        file.write()?;
        Ok(file)
    }

    /// Rows still awaiting a visit. Resuming skips `done` rows entirely;
    /// `error` rows are retried.
    pub fn pending(&self) -> Vec<SeedRow> {
        self.rows
            .iter()
            .filter(|row| row.status != SeedStatus::Done)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn mark_done(&mut self, hostname: &str) -> Result<(), Error> {
        self.set_status(hostname, SeedStatus::Done, "")
    }

    pub fn mark_error(&mut self, hostname: &str, detail: &str) -> Result<(), Error> {
        self.set_status(hostname, SeedStatus::Error, detail)
    }

    fn set_status(&mut self, hostname: &str, status: SeedStatus, detail: &str) -> Result<(), Error> {
        let Some(&index) = self.index.get(&hostname.to_ascii_lowercase()) else {
            // Devices reached through discovery but never appended (filtered
            // rows) have no row to update.
            debug!("No seed row for {hostname}");
            return Ok(());
        };
        self.rows[index].status = status;
        self.rows[index].error_details = detail.to_string();
        self.write()
    }

    /// Append a newly discovered hostname as a pending row. Returns false
    /// when the hostname is already present.
    pub fn add_discovered(&mut self, hostname: &str, ip: Option<&str>) -> Result<bool, Error> {
        let key = hostname.to_ascii_lowercase();
        if self.index.contains_key(&key) {
            return Ok(false);
        }
        self.rows.push(SeedRow {
            hostname: hostname.to_string(),
            ip_address: ip.unwrap_or("").to_string(),
            status: SeedStatus::Pending,
            error_details: String::new(),
        });
        self.index.insert(key, self.rows.len() - 1);
        self.write()?;
        Ok(true)
    }

    /// Rewrite the whole file; write-then-rename keeps a consistent file on
    /// disk even if the process dies mid-update.
    fn write(&self) -> Result<(), Error> {
        let temp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&temp_path)
                .with_context(|| format!("Failed to write {}", temp_path.display()))?;
            writer.write_record(["hostname", "ip_address", "status", "error_details"])?;
            for row in &self.rows {
                writer.write_record([
                    row.hostname.as_str(),
                    row.ip_address.as_str(),
                    row.status.as_str(),
                    row.error_details.as_str(),
                ])?;
            }
            writer.flush()?;
        }
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn build_index(rows: &[SeedRow]) -> HashMap<String, usize> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| (row.hostname.to_ascii_lowercase(), i))
        .collect()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use tempfile::TempDir;

    use super::*;

    fn seed_path(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("seeds.csv");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_and_pending() {
        let dir = TempDir::new().unwrap();
        let path = seed_path(
            &dir,
            indoc! {"
                hostname,ip_address,status,error_details
                CORE-A,10.0.0.1,done,
                DIST-A,10.0.0.2,,
                DIST-B,,error,unreachable
            "},
        );

        let file = SeedFile::load(&path).unwrap();
        assert_eq!(file.len(), 3);

        let pending = file.pending();
        assert_eq!(pending.len(), 2, "done rows are skipped, error rows retried");
        assert_eq!(pending[0].hostname, "DIST-A");
        assert_eq!(pending[1].hostname, "DIST-B");
    }

    #[test]
    fn test_status_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = seed_path(
            &dir,
            "hostname,ip_address,status,error_details\nCORE-A,10.0.0.1,,\n",
        );

        let mut file = SeedFile::load(&path).unwrap();
        file.mark_done("core-a").unwrap();

        let reloaded = SeedFile::load(&path).unwrap();
        assert!(reloaded.pending().is_empty());

        let mut file = reloaded;
        file.mark_error("CORE-A", "timeout").unwrap();
        let reloaded = SeedFile::load(&path).unwrap();
        let pending = reloaded.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].error_details, "timeout");
    }

    #[test]
    fn test_add_discovered_dedupes() {
        let dir = TempDir::new().unwrap();
        let path = seed_path(
            &dir,
            "hostname,ip_address,status,error_details\nCORE-A,10.0.0.1,,\n",
        );

        let mut file = SeedFile::load(&path).unwrap();
        assert!(file.add_discovered("DIST-A", Some("10.0.0.2")).unwrap());
        assert!(!file.add_discovered("dist-a", None).unwrap());
        assert!(!file.add_discovered("CORE-A", None).unwrap());

        let reloaded = SeedFile::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_create_materializes_database_seeds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rewalk.csv");

        let entries = vec![
            ("CORE-A".to_string(), Some("10.0.0.1".to_string())),
            ("LONELY".to_string(), None),
        ];
        let file = SeedFile::create(&path, &entries).unwrap();
        assert_eq!(file.pending().len(), 2);

        let reloaded = SeedFile::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.pending()[1].ip_address, "");
    }

    #[test]
    fn test_bad_status_rejected() {
        let dir = TempDir::new().unwrap();
        let path = seed_path(
            &dir,
            "hostname,ip_address,status,error_details\nX,10.0.0.1,wat,\n",
        );
        assert!(SeedFile::load(&path).is_err());
    }
}
