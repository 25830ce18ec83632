//! Sink trait for log output destinations

use super::error::{LoggerError, Result};
use super::error_channel::ErrorReporter;
use super::log_record::LogRecord;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Runtime a sink may or may not be applicable to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    /// Native process with a file system and sockets
    Native,
    /// Browser-hosted WebAssembly
    Browser,
}

impl Environment {
    /// Environment of the current build target
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Environment::Browser
        } else {
            Environment::Native
        }
    }
}

/// Result of handing a record to a sink's `write` path
#[derive(Debug)]
pub enum WriteOutcome {
    /// The write finished before `write` returned
    Immediate,
    /// The write completes later; the handle resolves with its result
    Pending(PendingWrite),
}

/// Completion handle for a write that finishes after `write` returns
#[derive(Debug)]
pub struct PendingWrite {
    receiver: Receiver<Result<()>>,
}

impl PendingWrite {
    /// Create a handle and the completer a sink resolves it with
    pub fn channel() -> (PendingWrite, WriteCompleter) {
        let (sender, receiver) = bounded(1);
        (PendingWrite { receiver }, WriteCompleter { sender })
    }

    /// Non-blocking poll; `None` while the write is still running
    pub fn try_result(&self) -> Option<Result<()>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LoggerError::writer(
                "pending write was abandoned before completing",
            ))),
        }
    }

    /// Block until the write completes or `timeout` elapses
    pub fn wait(self, timeout: Duration) -> Result<()> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(LoggerError::PendingTimeout),
            Err(RecvTimeoutError::Disconnected) => Err(LoggerError::writer(
                "pending write was abandoned before completing",
            )),
        }
    }
}

/// Sending half of a [`PendingWrite`]
#[derive(Debug)]
pub struct WriteCompleter {
    sender: Sender<Result<()>>,
}

impl WriteCompleter {
    pub fn complete(self, result: Result<()>) {
        // The handle may already be gone; nobody is waiting then.
        let _ = self.sender.send(result);
    }
}

/// A named destination accepting log records
///
/// Only [`write`](Sink::write) is mandatory. A sink that can finish a write
/// while the caller waits overrides [`write_sync`](Sink::write_sync); sinks
/// without one are driven through `write` without waiting when the delivery
/// policy asks for synchronous delivery.
///
/// Sinks must not keep the record past the call: format it and keep the
/// formatted output instead.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::core::{LogRecord, Result, Sink, WriteOutcome};
///
/// struct StderrSink;
///
/// impl Sink for StderrSink {
///     fn name(&self) -> &str {
///         "stderr"
///     }
///
///     fn write(&mut self, record: &LogRecord) -> Result<WriteOutcome> {
///         eprintln!("{} {}", record.level(), record.message());
///         Ok(WriteOutcome::Immediate)
///     }
/// }
/// ```
pub trait Sink: Send {
    /// Default name used when the sink is registered without an explicit one
    fn name(&self) -> &str;

    fn write(&mut self, record: &LogRecord) -> Result<WriteOutcome>;

    /// Blocking write path; `None` when the sink has none
    fn write_sync(&mut self, _record: &LogRecord) -> Option<Result<()>> {
        None
    }

    /// Drain any buffering internal to the sink
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once after a buffer drain handed this sink records
    ///
    /// Defaults to [`flush`](Sink::flush), so buffered records reach their
    /// destination when the drain ends. Sinks whose `flush` does more than
    /// push out local buffering override this.
    fn end_batch(&mut self) -> Result<()> {
        self.flush()
    }

    /// Release resources, flushing first
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn supports(&self, _environment: Environment) -> bool {
        true
    }

    /// Called once on registration with the channel used to surface
    /// failures that a call cannot return: use
    /// [`ErrorReporter::defer`] from inside sink methods and
    /// [`ErrorReporter::report`] from the sink's own threads
    fn attach(&mut self, _reporter: ErrorReporter) {}
}

/// Per-sink registration options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkOptions {
    /// Unique name within the logger; defaults to [`Sink::name`]
    pub name: Option<String>,
    /// Overrides the logger's per-level delivery policy when set
    pub sync: Option<bool>,
}

impl SinkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            sync: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Force synchronous (`true`) or buffered (`false`) delivery for every level
    #[must_use = "builder methods return a new value"]
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = Some(sync);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_pending_write_resolves_from_other_thread() {
        let (pending, completer) = PendingWrite::channel();
        assert!(pending.try_result().is_none());

        let handle = thread::spawn(move || completer.complete(Ok(())));
        handle.join().unwrap();

        assert!(pending.wait(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_pending_write_abandoned() {
        let (pending, completer) = PendingWrite::channel();
        drop(completer);
        assert!(matches!(pending.try_result(), Some(Err(_))));
    }

    #[test]
    fn test_pending_write_timeout() {
        let (pending, _completer) = PendingWrite::channel();
        let result = pending.wait(Duration::from_millis(10));
        assert!(matches!(result, Err(LoggerError::PendingTimeout)));
    }

    #[test]
    fn test_environment_detect_native() {
        assert_eq!(Environment::detect(), Environment::Native);
    }
}
