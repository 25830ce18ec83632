//! In-memory sink for tests and examples

use crate::core::{LogRecord, Result, Sink, WriteOutcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Shared {
    records: Mutex<Vec<LogRecord>>,
    flushes: AtomicUsize,
    closed: AtomicBool,
}

/// Keeps a copy of every record it receives
///
/// Records are observed through a [`MemorySinkHandle`], which stays valid
/// after the sink itself moved into a logger.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::prelude::*;
///
/// let sink = MemorySink::new();
/// let received = sink.handle();
///
/// let logger = Logger::builder().sink(sink).build().unwrap();
/// logger.error("boom");
///
/// assert_eq!(received.messages(), vec!["boom"]);
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    shared: Arc<Shared>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&mut self, record: &LogRecord) -> Result<WriteOutcome> {
        self.shared.records.lock().push(record.clone());
        Ok(WriteOutcome::Immediate)
    }

    fn write_sync(&mut self, record: &LogRecord) -> Option<Result<()>> {
        Some(self.write(record).map(|_| ()))
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.shared.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Read side of a [`MemorySink`]
#[derive(Debug, Clone)]
pub struct MemorySinkHandle {
    shared: Arc<Shared>,
}

impl MemorySinkHandle {
    pub fn records(&self) -> Vec<LogRecord> {
        self.shared.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.shared
            .records
            .lock()
            .iter()
            .map(|r| r.message().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.shared.records.lock().clear();
    }

    pub fn flush_count(&self) -> usize {
        self.shared.flushes.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}
