//! Logger metrics for observability
//!
//! Counters for monitoring the dispatch pipeline: how many records were
//! accepted, filtered, buffered and drained, and how often sinks failed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use rust_log_dispatch::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_dispatched();
/// metrics.record_sink_failure();
///
/// assert_eq!(metrics.dispatched(), 1);
/// assert_eq!(metrics.sink_failures(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records that passed the level gate and the pipeline
    dispatched: AtomicU64,

    /// Records rejected by the level gate
    filtered: AtomicU64,

    /// Records dropped by a pipeline step (sampling, custom filters)
    dropped_by_pipeline: AtomicU64,

    /// Records handed to the buffering subsystem
    buffered: AtomicU64,

    /// Non-empty buffer drains
    drains: AtomicU64,

    /// Failures surfaced on the error-notification channel
    sink_failures: AtomicU64,

    /// Records logged after `close()`
    rejected_after_close: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            dropped_by_pipeline: AtomicU64::new(0),
            buffered: AtomicU64::new(0),
            drains: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            rejected_after_close: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_by_pipeline(&self) -> u64 {
        self.dropped_by_pipeline.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn buffered(&self) -> u64 {
        self.buffered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn drains(&self) -> u64 {
        self.drains.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected_after_close(&self) -> u64 {
        self.rejected_after_close.load(Ordering::Relaxed)
    }

    /// Record a dispatched record, returning the previous count
    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped_by_pipeline(&self) -> u64 {
        self.dropped_by_pipeline.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_buffered(&self) -> u64 {
        self.buffered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_drain(&self) -> u64 {
        self.drains.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected_after_close(&self) -> u64 {
        self.rejected_after_close.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of dispatched records whose delivery failed somewhere (0.0 - 100.0)
    pub fn failure_rate(&self) -> f64 {
        let dispatched = self.dispatched() as f64;
        if dispatched == 0.0 {
            0.0
        } else {
            (self.sink_failures() as f64 / dispatched * 100.0).min(100.0)
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.dispatched.store(0, Ordering::Relaxed);
        self.filtered.store(0, Ordering::Relaxed);
        self.dropped_by_pipeline.store(0, Ordering::Relaxed);
        self.buffered.store(0, Ordering::Relaxed);
        self.drains.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
        self.rejected_after_close.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            dispatched: AtomicU64::new(self.dispatched()),
            filtered: AtomicU64::new(self.filtered()),
            dropped_by_pipeline: AtomicU64::new(self.dropped_by_pipeline()),
            buffered: AtomicU64::new(self.buffered()),
            drains: AtomicU64::new(self.drains()),
            sink_failures: AtomicU64::new(self.sink_failures()),
            rejected_after_close: AtomicU64::new(self.rejected_after_close()),
        }
    }
}
