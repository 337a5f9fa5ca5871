// Scan metrics
//
// Lightweight counters for monitoring scanner throughput and outcomes

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Scan metrics
///
/// Uses atomic operations so concurrently processed items can record
/// without locks. Shared between scanners and reconcilers through an `Arc`.
#[derive(Debug)]
pub struct ScanMetrics {
    /// Runs that started a session
    pub runs_started: AtomicUsize,

    /// Runs that processed every bundle
    pub runs_completed: AtomicUsize,

    /// Runs stopped by `cancel()`
    pub runs_aborted: AtomicUsize,

    /// Runs replaced by a newer session
    pub runs_superseded: AtomicUsize,

    /// Runs stopped by a failing item
    pub runs_failed: AtomicUsize,

    pub bundles_completed: AtomicU64,

    pub items_processed: AtomicU64,

    pub items_failed: AtomicU64,

    /// Records written by the library reconciler
    pub records_saved: AtomicU64,

    /// Total wall time spent inside runs, in milliseconds
    pub total_scan_time_ms: AtomicU64,

    start_time: Instant,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicUsize::new(0),
            runs_completed: AtomicUsize::new(0),
            runs_aborted: AtomicUsize::new(0),
            runs_superseded: AtomicUsize::new(0),
            runs_failed: AtomicUsize::new(0),
            bundles_completed: AtomicU64::new(0),
            items_processed: AtomicU64::new(0),
            items_failed: AtomicU64::new(0),
            records_saved: AtomicU64::new(0),
            total_scan_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_aborted(&self) {
        self.runs_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_superseded(&self) {
        self.runs_superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bundle_completed(&self) {
        self.bundles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_processed(&self) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_saved(&self) {
        self.records_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_time(&self, duration: Duration) {
        self.total_scan_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average processed items per completed bundle
    pub fn avg_items_per_bundle(&self) -> f64 {
        let bundles = self.bundles_completed.load(Ordering::Relaxed);
        let items = self.items_processed.load(Ordering::Relaxed);
        if bundles > 0 {
            items as f64 / bundles as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Scan Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Runs: {} started, {} completed, {} aborted, {} superseded, {} failed",
            self.runs_started.load(Ordering::Relaxed),
            self.runs_completed.load(Ordering::Relaxed),
            self.runs_aborted.load(Ordering::Relaxed),
            self.runs_superseded.load(Ordering::Relaxed),
            self.runs_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Items: {} processed, {} failed over {} bundles (avg {:.1} per bundle)",
            self.items_processed.load(Ordering::Relaxed),
            self.items_failed.load(Ordering::Relaxed),
            self.bundles_completed.load(Ordering::Relaxed),
            self.avg_items_per_bundle()
        );
        tracing::info!(
            "Records saved: {}, total scan time: {:.2}s",
            self.records_saved.load(Ordering::Relaxed),
            self.total_scan_time_ms.load(Ordering::Relaxed) as f64 / 1000.0
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}
