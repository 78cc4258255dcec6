//! The crawl scheduler: a bounded-depth, breadth-first traversal of the
//! neighbor graph, run by a fixed pool of worker threads.
//!
//! Shared state is exactly three structures: the frontier queue (with its
//! in-flight counter, under one mutex and condvar), the visited set, and
//! the inventory store. Sessions are never shared; each belongs to one
//! worker for one device visit. Cancellation is cooperative: workers finish
//! their current device so the seed CSV stays consistent, then exit.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Error;
use log::{debug, info, warn};

use netutils::collector::collect_facts;
use netutils::detect::detect_platform;
use netutils::transport::{self, Preferences};
use netwalker_api::config::Config;
use netwalker_api::credentials::Credentials;
use netwalker_api::error::{FailureKind, TransportError};
use netwalker_api::filter::{Decision, DeviceFilter};
use netwalker_api::model::{
    DeviceFacts, DeviceIdentity, IdentityInfo, InterfaceInfo, InterfaceType, Platform,
    PRIMARY_MANAGEMENT, UNKNOWN_SERIAL,
};

use crate::datastore::{DataStore, DeviceRecord};
use crate::progress::{CrawlSummary, ProgressReporter};
use crate::seedfile::SeedFile;

/// Per-device time budget, as a multiple of the connect timeout: one
/// connect plus this many command timeouts' worth of collection.
const DEVICE_BUDGET_FACTOR: u32 = 4;

/// One frontier element: a device awaiting a visit.
#[derive(Debug, Clone)]
struct FrontierEntry {
    hostname: String,
    ip_address: Option<String>,
    depth: u32,
    source: Option<String>,
}

struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    in_flight: usize,
}

struct VisitFailure {
    kind: FailureKind,
    detail: String,
}

impl From<&TransportError> for VisitFailure {
    fn from(err: &TransportError) -> Self {
        Self {
            kind: FailureKind::from(err),
            detail: err.to_string(),
        }
    }
}

pub struct CrawlEngine {
    config: Config,
    credentials: Credentials,
    filter: DeviceFilter,
    store: Mutex<DataStore>,
    seeds: Mutex<SeedFile>,
    frontier: Mutex<FrontierState>,
    frontier_signal: Condvar,
    visited: Mutex<HashSet<DeviceIdentity>>,
    cancelled: Arc<AtomicBool>,
    progress: ProgressReporter,
    summary: Mutex<CrawlSummary>,
    crawl_deadline: Instant,
}

impl CrawlEngine {
    pub fn new(
        config: Config,
        credentials: Credentials,
        store: DataStore,
        seeds: SeedFile,
        cancelled: Arc<AtomicBool>,
    ) -> Result<Self, Error> {
        let filter = DeviceFilter::new(&config.filtering, &config.exclusions)?;

        let pending = seeds.pending();
        let queue: VecDeque<FrontierEntry> = pending
            .iter()
            .map(|row| FrontierEntry {
                hostname: row.hostname.clone(),
                ip_address: (!row.ip_address.is_empty()).then(|| row.ip_address.clone()),
                depth: 0,
                source: None,
            })
            .collect();

        info!(
            "Crawl starting: {} seeds, max depth {}, {} workers",
            queue.len(),
            config.discovery.max_depth,
            config.discovery.concurrent_connections
        );

        let crawl_deadline =
            Instant::now() + Duration::from_secs(config.discovery.discovery_timeout);
        let progress = ProgressReporter::new(queue.len());

        Ok(Self {
            config,
            credentials,
            filter,
            store: Mutex::new(store),
            seeds: Mutex::new(seeds),
            frontier: Mutex::new(FrontierState {
                queue,
                in_flight: 0,
            }),
            frontier_signal: Condvar::new(),
            visited: Mutex::new(HashSet::new()),
            cancelled,
            progress,
            summary: Mutex::new(CrawlSummary::default()),
            crawl_deadline,
        })
    }

    /// Run the crawl to completion (or cancellation) and return the outcome
    /// totals.
    pub fn run(self) -> CrawlSummary {
        let workers = self.config.discovery.concurrent_connections;
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| self.worker());
            }
        });

        let mut summary = self.summary.into_inner().unwrap();
        summary.cancelled = self.cancelled.load(Ordering::SeqCst);
        summary
    }

    fn worker(&self) {
        while let Some(entry) = self.next_entry() {
            self.process(entry);
            self.finish_entry();
        }
    }

    /// Block until there is work, the frontier drains completely, or the
    /// crawl is cancelled.
    fn next_entry(&self) -> Option<FrontierEntry> {
        let mut state = self.frontier.lock().unwrap();
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                self.frontier_signal.notify_all();
                return None;
            }
            if let Some(entry) = state.queue.pop_front() {
                state.in_flight += 1;
                return Some(entry);
            }
            if state.in_flight == 0 {
                self.frontier_signal.notify_all();
                return None;
            }
            let (next, _) = self
                .frontier_signal
                .wait_timeout(state, Duration::from_millis(200))
                .unwrap();
            state = next;
        }
    }

    fn finish_entry(&self) {
        let mut state = self.frontier.lock().unwrap();
        state.in_flight -= 1;
        if state.in_flight == 0 && state.queue.is_empty() {
            self.frontier_signal.notify_all();
        }
    }

    fn process(&self, entry: FrontierEntry) {
        // Crawl deadline: mark the row and stop the whole crawl.
        if Instant::now() >= self.crawl_deadline {
            warn!("Crawl deadline exceeded at {}", entry.hostname);
            self.mark_error(&entry.hostname, FailureKind::Timeout.label());
            self.summary
                .lock()
                .unwrap()
                .record_failure(FailureKind::Timeout);
            self.cancelled.store(true, Ordering::SeqCst);
            return;
        }

        // Visited check on the pre-connect identity (name or address).
        let identity = DeviceIdentity::new(
            &entry.hostname,
            "",
            entry.ip_address.as_deref().unwrap_or(""),
        );
        if !self.visited.lock().unwrap().insert(identity) {
            debug!("Already visited {}, discarding", entry.hostname);
            self.summary.lock().unwrap().skipped += 1;
            return;
        }

        // Reachability address: the entry's own, else the inventory's best.
        let ip_address = match entry.ip_address.clone() {
            Some(ip) => Some(ip),
            None => self
                .store
                .lock()
                .unwrap()
                .primary_ip(&entry.hostname)
                .unwrap_or_else(|e| {
                    warn!("primary-ip lookup failed for {}: {e:#}", entry.hostname);
                    None
                }),
        };
        let Some(ip_address) = ip_address else {
            self.summary.lock().unwrap().attempted += 1;
            self.progress
                .report_failure(&entry.hostname, "no reachability address");
            self.mark_error(&entry.hostname, FailureKind::NoIp.label());
            self.summary
                .lock()
                .unwrap()
                .record_failure(FailureKind::NoIp);
            return;
        };

        // Pre-connect filtering; platform and capabilities were already
        // consulted when the neighbor was enqueued.
        if let Decision::Drop(reason) =
            self.filter
                .evaluate(&entry.hostname, ip_address.parse().ok(), "", &[])
        {
            self.progress.report_skip(&entry.hostname, reason);
            self.summary.lock().unwrap().skipped += 1;
            return;
        }

        self.summary.lock().unwrap().attempted += 1;
        self.progress.report_start(&entry.hostname, &ip_address);
        if let Some(source) = &entry.source {
            debug!(
                "Visiting {} (depth {}, via {source})",
                entry.hostname, entry.depth
            );
        }

        match self.visit(&entry, &ip_address) {
            Ok(device_name) => {
                self.mark_done(&entry.hostname);
                self.progress.report_success(&device_name);
                self.summary.lock().unwrap().completed += 1;
            }
            Err(failure) => {
                self.progress
                    .report_failure(&entry.hostname, &failure.detail);
                self.mark_error(&entry.hostname, failure.kind.label());
                self.summary.lock().unwrap().record_failure(failure.kind);
            }
        }
    }

    /// One device visit: connect, detect, collect, store, enqueue neighbors.
    fn visit(&self, entry: &FrontierEntry, ip_address: &str) -> Result<String, VisitFailure> {
        let started = Instant::now();
        let connect_timeout = Duration::from_secs(self.config.discovery.connection_timeout);
        let device_budget = connect_timeout * (1 + DEVICE_BUDGET_FACTOR);
        let preferences = Preferences::from_config(&self.config.connection, connect_timeout);

        let mut session = transport::open(ip_address, &self.credentials, &preferences)
            .map_err(|e| VisitFailure::from(&e))?;

        // Platform detection from first-contact output. PAN-OS has no `show
        // version`; its system-info command is the second probe.
        let mut banner_command = "show version";
        let mut banner = session
            .send(banner_command)
            .map_err(|e| VisitFailure::from(&e))?;
        let mut platform = detect_platform(&banner);
        if platform == Platform::Unknown {
            if let Ok(output) = session.send("show system info") {
                if detect_platform(&output) != Platform::Unknown {
                    platform = detect_platform(&output);
                    banner_command = "show system info";
                    banner = output;
                }
            }
        }
        debug!("{} detected as {platform}", entry.hostname);

        let facts = if platform == Platform::Unknown {
            // Banner-only record; no profile-driven collection.
            DeviceFacts {
                identity: Some(IdentityInfo {
                    hostname: session.prompt_hostname().to_string(),
                    serial_number: UNKNOWN_SERIAL.to_string(),
                    hardware_model: String::new(),
                }),
                ..Default::default()
            }
        } else {
            collect_facts(
                &mut session,
                platform,
                &self.config.discovery.protocols,
                Some((banner_command, banner)),
            )
        };
        drop(session);

        for failure in &facts.failures {
            warn!(
                "{}: {} failed: {}",
                entry.hostname, failure.kind, failure.detail
            );
        }
        let Some(identity) = facts.identity.clone() else {
            return Err(VisitFailure {
                kind: FailureKind::Protocol,
                detail: "no identity collected".to_string(),
            });
        };
        if started.elapsed() > device_budget {
            return Err(VisitFailure {
                kind: FailureKind::Timeout,
                detail: "device time budget exceeded".to_string(),
            });
        }

        // A device may be reached under several names; record the real
        // identity in the visited set too.
        self.visited.lock().unwrap().insert(DeviceIdentity::new(
            &identity.hostname,
            &identity.serial_number,
            ip_address,
        ));

        let stored = self.write_inventory(&facts, &identity, platform, ip_address);

        // Neighbors propagate even when the inventory write failed; the
        // in-memory visited set still guards against duplicates.
        self.enqueue_neighbors(entry, &facts);

        stored.map_err(|e| {
            warn!("Inventory write failed for {}: {e:#}", identity.hostname);
            VisitFailure {
                kind: FailureKind::Database,
                detail: e.to_string(),
            }
        })?;

        Ok(identity.hostname)
    }

    fn write_inventory(
        &self,
        facts: &DeviceFacts,
        identity: &IdentityInfo,
        platform: Platform,
        ip_address: &str,
    ) -> Result<(), Error> {
        let store = self.store.lock().unwrap();
        let record = DeviceRecord {
            device_name: identity.hostname.clone(),
            serial_number: identity.serial_number.clone(),
            platform: platform.to_string(),
            hardware_model: identity.hardware_model.clone(),
            capabilities: Vec::new(),
        };
        let Some(device_id) = store.upsert_device(&record)? else {
            return Ok(()); // database disabled
        };

        // The address we actually reached the device at.
        store.upsert_interface(
            device_id,
            &InterfaceInfo {
                name: PRIMARY_MANAGEMENT.to_string(),
                ip_address: ip_address.to_string(),
                subnet_mask: String::new(),
                interface_type: InterfaceType::Management,
            },
        )?;

        if let Some(version) = &facts.software_version {
            store.upsert_version(device_id, version)?;
        }
        for interface in &facts.interfaces {
            store.upsert_interface(device_id, interface)?;
        }
        for vlan in &facts.vlans {
            store.upsert_device_vlan(device_id, vlan)?;
        }
        for member in &facts.stack_members {
            store.upsert_stack_member(device_id, member)?;
        }
        for neighbor in &facts.neighbors {
            store.upsert_neighbor(device_id, neighbor)?;
        }
        Ok(())
    }

    /// Push each in-scope neighbor onto the frontier at depth+1 and append
    /// it to the seed CSV when it is a new hostname.
    fn enqueue_neighbors(&self, entry: &FrontierEntry, facts: &DeviceFacts) {
        let next_depth = entry.depth + 1;
        if next_depth > self.config.discovery.max_depth {
            debug!(
                "Depth limit reached at {}; {} neighbors not enqueued",
                entry.hostname,
                facts.neighbors.len()
            );
            return;
        }

        for neighbor in &facts.neighbors {
            let ip = neighbor.remote_ip.as_deref();
            let decision = self.filter.evaluate(
                &neighbor.remote_name,
                ip.and_then(|addr| addr.parse().ok()),
                &neighbor.platform,
                &neighbor.capabilities,
            );
            if let Decision::Drop(reason) = decision {
                debug!("Neighbor {} not enqueued: {reason}", neighbor.remote_name);
                continue;
            }

            match self
                .seeds
                .lock()
                .unwrap()
                .add_discovered(&neighbor.remote_name, ip)
            {
                Ok(true) => self.progress.add_targets(1),
                Ok(false) => {}
                Err(e) => warn!("Seed file update failed: {e:#}"),
            }

            let mut state = self.frontier.lock().unwrap();
            state.queue.push_back(FrontierEntry {
                hostname: neighbor.remote_name.clone(),
                ip_address: ip.map(str::to_string),
                depth: next_depth,
                source: Some(entry.hostname.clone()),
            });
            drop(state);
            self.frontier_signal.notify_one();
        }
    }

    fn mark_done(&self, hostname: &str) {
        if let Err(e) = self.seeds.lock().unwrap().mark_done(hostname) {
            warn!("Seed file update failed for {hostname}: {e:#}");
        }
    }

    fn mark_error(&self, hostname: &str, detail: &str) {
        if let Err(e) = self.seeds.lock().unwrap().mark_error(hostname, detail) {
            warn!("Seed file update failed for {hostname}: {e:#}");
        }
    }
}
