//! Process-wide counters for sessions, sampling and workflow runs.
//!
//! Increment at the call site; call [`Metrics::flush`] at natural boundaries
//! (end of a workflow run, process exit) to log a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by every component in the process.
pub static METRICS: Metrics = Metrics::new();

/// Monotonic counters updated with relaxed atomics.
pub struct Metrics {
    sessions_created: AtomicU64,
    sessions_expired: AtomicU64,
    samples_run: AtomicU64,
    early_stops: AtomicU64,
    tiebreaks: AtomicU64,
    workflow_failures: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub sessions_created: u64,
    pub sessions_expired: u64,
    pub samples_run: u64,
    pub early_stops: u64,
    pub tiebreaks: u64,
    pub workflow_failures: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// All counters at zero. `const` so it can back a `static`.
    pub const fn new() -> Self {
        Self {
            sessions_created: AtomicU64::new(0),
            sessions_expired: AtomicU64::new(0),
            samples_run: AtomicU64::new(0),
            early_stops: AtomicU64::new(0),
            tiebreaks: AtomicU64::new(0),
            workflow_failures: AtomicU64::new(0),
        }
    }

    /// Count one session added to the store.
    pub fn inc_sessions_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_created", "counter incremented");
    }

    /// Sessions are expired in batches by sweeps, so this adds `n`.
    pub fn add_sessions_expired(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.sessions_expired.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_expired", n, "counter incremented");
    }

    /// Count one completed sampling run.
    pub fn inc_samples_run(&self) {
        self.samples_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "samples_run", "counter incremented");
    }

    /// Count a selection that stopped on the score threshold.
    pub fn inc_early_stops(&self) {
        self.early_stops.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "early_stops", "counter incremented");
    }

    /// Count a selection decided by a tie-break rule.
    pub fn inc_tiebreaks(&self) {
        self.tiebreaks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tiebreaks", "counter incremented");
    }

    /// Count a workflow run that ended unsuccessfully.
    pub fn inc_workflow_failures(&self) {
        self.workflow_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "workflow_failures", "counter incremented");
    }

    /// Read every counter. Values are not captured atomically as a set.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_expired: self.sessions_expired.load(Ordering::Relaxed),
            samples_run: self.samples_run.load(Ordering::Relaxed),
            early_stops: self.early_stops.load(Ordering::Relaxed),
            tiebreaks: self.tiebreaks.load(Ordering::Relaxed),
            workflow_failures: self.workflow_failures.load(Ordering::Relaxed),
        }
    }

    /// Emit all counters as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            sessions_created = s.sessions_created,
            sessions_expired = s.sessions_expired,
            samples_run = s.samples_run,
            early_stops = s.early_stops,
            tiebreaks = s.tiebreaks,
            workflow_failures = s.workflow_failures,
        );
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.sessions_created.store(0, Ordering::Relaxed);
        self.sessions_expired.store(0, Ordering::Relaxed);
        self.samples_run.store(0, Ordering::Relaxed);
        self.early_stops.store(0, Ordering::Relaxed);
        self.tiebreaks.store(0, Ordering::Relaxed);
        self.workflow_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_sessions_created();
        m.inc_sessions_created();
        m.add_sessions_expired(3);
        m.add_sessions_expired(0);
        m.inc_samples_run();
        m.inc_early_stops();
        m.inc_tiebreaks();
        m.inc_workflow_failures();

        let s = m.snapshot();
        assert_eq!(s.sessions_created, 2);
        assert_eq!(s.sessions_expired, 3);
        assert_eq!(s.samples_run, 1);
        assert_eq!(s.early_stops, 1);
        assert_eq!(s.tiebreaks, 1);
        assert_eq!(s.workflow_failures, 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_samples_run();
        m.add_sessions_expired(5);
        m.reset();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }
}
