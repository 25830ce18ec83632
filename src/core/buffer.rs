//! Buffering subsystem
//!
//! Holds records destined for buffered delivery until the buffer reaches
//! capacity, the flush timer fires, or an explicit flush/close happens.
//! Draining swaps the whole sequence out under the lock, so a drain in
//! progress never sees records appended after it began.

use super::error::{LoggerError, Result};
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Default buffer capacity (records)
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Default interval of the background drain timer
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

/// Buffer sizing
///
/// # Example
///
/// ```
/// use rust_log_dispatch::BufferConfig;
/// use std::time::Duration;
///
/// let config = BufferConfig::new(3).with_flush_interval(Duration::from_millis(250));
/// assert_eq!(config.size, 3);
/// assert_eq!(config.flush_interval(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Records held before a drain is forced
    pub size: usize,
    /// Timer interval in milliseconds; `0` disables the timer
    pub flush_interval_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_BUFFER_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL.as_millis() as u64,
        }
    }
}

impl BufferConfig {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Disable the background timer; drains then happen only at capacity,
    /// on `flush()` and on `close()`
    #[must_use = "builder methods return a new value"]
    pub fn without_timer(mut self) -> Self {
        self.flush_interval_ms = 0;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(LoggerError::config("buffer", "size must be at least 1"));
        }
        Ok(())
    }
}

/// Ordered sequence of entries awaiting a drain
#[derive(Debug)]
pub(crate) struct RecordBuffer<T> {
    entries: Mutex<Vec<T>>,
    capacity: usize,
    /// Serializes drains so entries reach each sink in enqueue order
    drain_lock: Mutex<()>,
}

impl<T> RecordBuffer<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            drain_lock: Mutex::new(()),
        }
    }

    /// Append an entry; returns `true` when the buffer reached capacity
    /// and must be drained before the caller continues
    pub(crate) fn push(&self, entry: T) -> bool {
        let mut entries = self.entries.lock();
        entries.push(entry);
        entries.len() >= self.capacity
    }

    /// Swap out everything buffered so far
    pub(crate) fn take(&self) -> Vec<T> {
        std::mem::replace(&mut *self.entries.lock(), Vec::with_capacity(self.capacity))
    }

    pub(crate) fn lock_drain(&self) -> MutexGuard<'_, ()> {
        self.drain_lock.lock()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Recurring background timer
///
/// Runs `on_tick` every `interval` on a dedicated thread until stopped or
/// until `on_tick` returns `false`.
pub(crate) struct FlushTimer {
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FlushTimer {
    pub(crate) fn start<F>(name: &str, interval: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if !on_tick() {
                            break;
                        }
                    }
                }
            })
            .map_err(|e| LoggerError::io_operation("starting flush timer", name, e))?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Cancel the timer and wait for an in-progress tick to finish
    pub(crate) fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel.
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            // The last owner may be dropped from inside a tick.
            if handle.thread().id() != thread::current().id() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Flush timer thread panicked: {:?}", e);
                }
            }
        }
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_push_reports_capacity() {
        let buffer = RecordBuffer::new(3);
        assert!(!buffer.push(1));
        assert!(!buffer.push(2));
        assert!(buffer.push(3));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_take_clears_atomically() {
        let buffer = RecordBuffer::new(10);
        buffer.push("a");
        buffer.push("b");

        let drained = buffer.take();
        buffer.push("c");

        assert_eq!(drained, vec!["a", "b"]);
        assert_eq!(buffer.take(), vec!["c"]);
        assert!(buffer.take().is_empty());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(BufferConfig::new(0).validate().is_err());
        assert!(BufferConfig::default().validate().is_ok());
    }

    #[test]
    fn test_buffer_config_from_json() {
        let config: BufferConfig = serde_json::from_str(r#"{"size": 3}"#).unwrap();
        assert_eq!(config.size, 3);
        assert_eq!(config.flush_interval(), DEFAULT_FLUSH_INTERVAL);
    }

    #[test]
    fn test_timer_ticks_and_stops() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_clone = Arc::clone(&ticks);

        let mut timer = FlushTimer::start("test-timer", Duration::from_millis(5), move || {
            ticks_clone.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        timer.stop();
        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop > 0);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_timer_exits_when_callback_declines() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_clone = Arc::clone(&ticks);

        let _timer = FlushTimer::start("test-timer", Duration::from_millis(2), move || {
            ticks_clone.fetch_add(1, Ordering::SeqCst);
            false
        })
        .unwrap();

        thread::sleep(Duration::from_millis(40));
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }
}
