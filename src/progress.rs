//! Console progress reporting and the end-of-run summary.
//!
//! Output uses ASCII markers (`[OK]`, `[FAIL]`) so it renders the same in
//! every console. Workers report concurrently; a mutex keeps the device
//! counter and line output coherent.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{info, warn};

use netwalker_api::error::FailureKind;

pub struct ProgressReporter {
    state: Mutex<ProgressState>,
}

struct ProgressState {
    total: usize,
    current: usize,
}

impl ProgressReporter {
    pub fn new(total: usize) -> Self {
        Self {
            state: Mutex::new(ProgressState { total, current: 0 }),
        }
    }

    /// Newly discovered devices grow the denominator mid-crawl.
    pub fn add_targets(&self, count: usize) {
        self.state.lock().unwrap().total += count;
    }

    pub fn report_start(&self, device_name: &str, ip_address: &str) {
        let mut state = self.state.lock().unwrap();
        state.current += 1;
        println!(
            "  [{}/{}] Connecting to {device_name} ({ip_address})...",
            state.current, state.total
        );
    }

    pub fn report_success(&self, device_name: &str) {
        println!("    [OK] {device_name}");
        info!("Visit completed for {device_name}");
    }

    pub fn report_skip(&self, device_name: &str, reason: &str) {
        println!("    [SKIP] {device_name}: {reason}");
        info!("Skipped {device_name}: {reason}");
    }

    pub fn report_failure(&self, device_name: &str, detail: &str) {
        println!("    [FAIL] {device_name}: {detail}");
        warn!("Visit failed for {device_name}: {detail}");
    }
}

/// Outcome totals for one crawl, grouped by failure kind.
#[derive(Debug, Default)]
pub struct CrawlSummary {
    pub attempted: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: HashMap<FailureKind, usize>,
    pub cancelled: bool,
}

impl CrawlSummary {
    pub fn record_failure(&mut self, kind: FailureKind) {
        *self.failed.entry(kind).or_insert(0) += 1;
    }

    pub fn failed_total(&self) -> usize {
        self.failed.values().sum()
    }

    /// Print the closing summary block.
    pub fn display(&self) {
        let separator = "=".repeat(80);
        println!("\n{separator}");
        println!("Discovery Summary:");
        println!("  Attempted: {}", self.attempted);
        println!("  Completed: {}", self.completed);
        println!("  Skipped:   {}", self.skipped);
        println!("  Failed:    {}", self.failed_total());

        if !self.failed.is_empty() {
            let mut kinds: Vec<(&FailureKind, &usize)> = self.failed.iter().collect();
            kinds.sort_by_key(|(kind, _)| kind.label());
            for (kind, count) in kinds {
                println!("    {}: {count}", kind.label());
            }
        }
        if self.cancelled {
            println!("\nDiscovery was cancelled before completion.");
        }
        println!("{separator}");

        info!(
            "Discovery summary: attempted={}, completed={}, skipped={}, failed={}",
            self.attempted,
            self.completed,
            self.skipped,
            self.failed_total()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = CrawlSummary::default();
        summary.attempted = 5;
        summary.completed = 2;
        summary.skipped = 1;
        summary.record_failure(FailureKind::Unreachable);
        summary.record_failure(FailureKind::Unreachable);
        summary.record_failure(FailureKind::Timeout);

        assert_eq!(summary.failed_total(), 3);
        assert_eq!(summary.failed[&FailureKind::Unreachable], 2);
    }

    #[test]
    fn test_progress_counter_advances() {
        let progress = ProgressReporter::new(2);
        progress.report_start("A", "10.0.0.1");
        progress.add_targets(1);
        progress.report_start("B", "10.0.0.2");

        let state = progress.state.lock().unwrap();
        assert_eq!(state.current, 2);
        assert_eq!(state.total, 3);
    }
}
