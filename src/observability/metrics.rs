//! Thread-safe metrics collection system
//!
//! Provides atomic counters and mutex-protected collections for tracking
//! HDM terminal traffic, receipt printing, checkouts and bridge requests.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Bounded history of round-trip samples kept per collector
const MAX_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    // HDM terminal
    hdm_connected: AtomicBool,
    hdm_connections_opened: AtomicU64,
    hdm_connection_failures: AtomicU64,
    hdm_requests: AtomicU64,
    hdm_device_errors: AtomicU64,
    hdm_timeouts: AtomicU64,
    hdm_logins: AtomicU64,
    hdm_login_failures: AtomicU64,
    fiscal_receipts: AtomicU64,
    hdm_round_trips: Mutex<Vec<u64>>, // in milliseconds
    command_stats: Mutex<HashMap<String, CommandStats>>,

    // Thermal printer
    print_jobs: AtomicU64,
    print_failures: AtomicU64,
    pre_bills: AtomicU64,
    bytes_sent: AtomicU64,

    // Checkout
    checkouts_started: AtomicU64,
    checkouts_completed: AtomicU64,
    checkouts_failed: AtomicU64,
    checkouts_skipped: AtomicU64,

    // Bridge and lifecycle
    bridge_requests: AtomicU64,
    terminal_state: Mutex<String>,
    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            hdm_connected: AtomicBool::new(false),
            hdm_connections_opened: AtomicU64::new(0),
            hdm_connection_failures: AtomicU64::new(0),
            hdm_requests: AtomicU64::new(0),
            hdm_device_errors: AtomicU64::new(0),
            hdm_timeouts: AtomicU64::new(0),
            hdm_logins: AtomicU64::new(0),
            hdm_login_failures: AtomicU64::new(0),
            fiscal_receipts: AtomicU64::new(0),
            hdm_round_trips: Mutex::new(Vec::new()),
            command_stats: Mutex::new(HashMap::new()),
            print_jobs: AtomicU64::new(0),
            print_failures: AtomicU64::new(0),
            pre_bills: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            checkouts_started: AtomicU64::new(0),
            checkouts_completed: AtomicU64::new(0),
            checkouts_failed: AtomicU64::new(0),
            checkouts_skipped: AtomicU64::new(0),
            bridge_requests: AtomicU64::new(0),
            terminal_state: Mutex::new("initializing".to_string()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    // HDM metrics
    pub fn hdm_connection_opened(&self) {
        self.hdm_connections_opened.fetch_add(1, Ordering::Relaxed);
        self.hdm_connected.store(true, Ordering::Relaxed);
    }

    pub fn hdm_connection_failed(&self) {
        self.hdm_connection_failures.fetch_add(1, Ordering::Relaxed);
        self.hdm_connected.store(false, Ordering::Relaxed);
    }

    pub fn hdm_connection_dropped(&self) {
        self.hdm_connected.store(false, Ordering::Relaxed);
    }

    pub fn hdm_request(&self, command: &str, duration: Duration, success: bool) {
        self.hdm_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.hdm_device_errors.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.hdm_round_trips.lock() {
            times.push(duration.as_millis() as u64);
            if times.len() > MAX_SAMPLES {
                times.remove(0);
            }
        }

        if let Ok(mut stats) = self.command_stats.lock() {
            let entry = stats
                .entry(command.to_string())
                .or_insert_with(|| CommandStats {
                    calls: 0,
                    failures: 0,
                    last_call: 0,
                });
            entry.calls += 1;
            entry.last_call = current_timestamp();
            if !success {
                entry.failures += 1;
            }
        }
    }

    pub fn hdm_timeout(&self) {
        self.hdm_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hdm_login(&self, success: bool) {
        if success {
            self.hdm_logins.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hdm_login_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn fiscal_receipt_registered(&self) {
        self.fiscal_receipts.fetch_add(1, Ordering::Relaxed);
    }

    // Printer metrics
    pub fn print_job_sent(&self, bytes: usize) {
        self.print_jobs.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn print_job_failed(&self) {
        self.print_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pre_bill_printed(&self) {
        self.pre_bills.fetch_add(1, Ordering::Relaxed);
    }

    // Checkout metrics
    pub fn checkout_started(&self) {
        self.checkouts_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checkout_finished(&self, success: bool) {
        if success {
            self.checkouts_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.checkouts_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn checkout_skipped(&self) {
        self.checkouts_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bridge_request(&self) {
        self.bridge_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_terminal_state(&self, state: &str) {
        if let Ok(mut current) = self.terminal_state.lock() {
            *current = state.to_string();
        }
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.hdm_connections_opened,
            &self.hdm_connection_failures,
            &self.hdm_requests,
            &self.hdm_device_errors,
            &self.hdm_timeouts,
            &self.hdm_logins,
            &self.hdm_login_failures,
            &self.fiscal_receipts,
            &self.print_jobs,
            &self.print_failures,
            &self.pre_bills,
            &self.bytes_sent,
            &self.checkouts_started,
            &self.checkouts_completed,
            &self.checkouts_failed,
            &self.checkouts_skipped,
            &self.bridge_requests,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.hdm_connected.store(false, Ordering::Relaxed);
        self.uptime_start
            .store(current_timestamp(), Ordering::Relaxed);

        if let Ok(mut times) = self.hdm_round_trips.lock() {
            times.clear();
        }
        if let Ok(mut stats) = self.command_stats.lock() {
            stats.clear();
        }
        if let Ok(mut state) = self.terminal_state.lock() {
            *state = "initializing".to_string();
        }
    }

    /// Calculate round-trip statistics (avg, p50, p95)
    fn round_trip_statistics(&self) -> (f64, f64, f64) {
        let Ok(times) = self.hdm_round_trips.lock() else {
            return (0.0, 0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();
        let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        (avg, percentile(&sorted, 50.0), percentile(&sorted, 95.0))
    }

    fn command_snapshots(&self) -> HashMap<String, CommandStatsSnapshot> {
        self.command_stats
            .lock()
            .map(|stats| {
                stats
                    .iter()
                    .map(|(name, s)| {
                        let success_rate = if s.calls == 0 {
                            0.0
                        } else {
                            (s.calls - s.failures) as f64 / s.calls as f64
                        };
                        (
                            name.clone(),
                            CommandStatsSnapshot {
                                calls: s.calls,
                                failures: s.failures,
                                last_call: s.last_call,
                                success_rate,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg, p50, p95) = self.round_trip_statistics();

        MetricsSnapshot {
            hdm: HdmMetrics {
                connected: self.hdm_connected.load(Ordering::Relaxed),
                connections_opened: self.hdm_connections_opened.load(Ordering::Relaxed),
                connection_failures: self.hdm_connection_failures.load(Ordering::Relaxed),
                requests: self.hdm_requests.load(Ordering::Relaxed),
                device_errors: self.hdm_device_errors.load(Ordering::Relaxed),
                timeouts: self.hdm_timeouts.load(Ordering::Relaxed),
                logins: self.hdm_logins.load(Ordering::Relaxed),
                login_failures: self.hdm_login_failures.load(Ordering::Relaxed),
                fiscal_receipts: self.fiscal_receipts.load(Ordering::Relaxed),
                avg_round_trip_ms: avg,
                round_trip_p50_ms: p50,
                round_trip_p95_ms: p95,
                commands: self.command_snapshots(),
            },
            printer: PrinterMetrics {
                jobs_printed: self.print_jobs.load(Ordering::Relaxed),
                jobs_failed: self.print_failures.load(Ordering::Relaxed),
                pre_bills: self.pre_bills.load(Ordering::Relaxed),
                bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            },
            checkout: CheckoutMetrics {
                started: self.checkouts_started.load(Ordering::Relaxed),
                completed: self.checkouts_completed.load(Ordering::Relaxed),
                failed: self.checkouts_failed.load(Ordering::Relaxed),
                skipped: self.checkouts_skipped.load(Ordering::Relaxed),
            },
            bridge_requests: self.bridge_requests.load(Ordering::Relaxed),
            terminal_state: self
                .terminal_state
                .lock()
                .map(|s| s.clone())
                .unwrap_or_else(|_| "unknown".to_string()),
            uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct CommandStats {
    calls: u64,
    failures: u64,
    last_call: u64,
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub hdm: HdmMetrics,
    pub printer: PrinterMetrics,
    pub checkout: CheckoutMetrics,
    pub bridge_requests: u64,
    pub terminal_state: String,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct HdmMetrics {
    pub connected: bool,
    pub connections_opened: u64,
    pub connection_failures: u64,
    pub requests: u64,
    pub device_errors: u64,
    pub timeouts: u64,
    pub logins: u64,
    pub login_failures: u64,
    pub fiscal_receipts: u64,
    pub avg_round_trip_ms: f64,
    pub round_trip_p50_ms: f64,
    pub round_trip_p95_ms: f64,
    pub commands: HashMap<String, CommandStatsSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct CommandStatsSnapshot {
    pub calls: u64,
    pub failures: u64,
    pub last_call: u64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct PrinterMetrics {
    pub jobs_printed: u64,
    pub jobs_failed: u64,
    pub pre_bills: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutMetrics {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

// Helper functions
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower = sorted_data[index.floor() as usize] as f64;
        let upper = sorted_data[index.ceil() as usize] as f64;
        lower + (upper - lower) * index.fract()
    }
}
