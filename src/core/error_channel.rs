//! Error-notification channel
//!
//! Every sink failure reaches the owning logger as a [`SinkFailure`]
//! (sink name, error, and the record involved when there is one). The
//! logger hands it to an [`ErrorHandler`]; without a custom handler the
//! failure is printed to stderr.

use super::error::LoggerError;
use super::log_record::LogRecord;
use super::metrics::LoggerMetrics;
use parking_lot::Mutex;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

/// One failed sink operation
#[derive(Debug)]
pub struct SinkFailure {
    pub sink: String,
    pub error: LoggerError,
    pub record: Option<Arc<LogRecord>>,
}

impl fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink '{}' failed: {}", self.sink, self.error)?;
        if let Some(ref record) = self.record {
            write!(f, " (record: [{}] {})", record.level(), record.message())?;
        }
        Ok(())
    }
}

/// Callback receiving sink failures
pub type ErrorHandler = Arc<dyn Fn(&SinkFailure) + Send + Sync>;

pub(crate) fn stderr_handler() -> ErrorHandler {
    Arc::new(|failure: &SinkFailure| {
        eprintln!("[LOGGER ERROR] {}", failure);
    })
}

thread_local! {
    static IN_HANDLER: Cell<bool> = const { Cell::new(false) };
}

/// Clears the per-thread handler flag, also when the handler panics
struct HandlerScope;

impl Drop for HandlerScope {
    fn drop(&mut self) {
        IN_HANDLER.with(|flag| flag.set(false));
    }
}

/// Count a failure and hand it to `handler`
///
/// Failures raised while the handler is already running on this thread
/// (a handler that logs through the failing logger) go to stderr instead.
pub(crate) fn notify(handler: &ErrorHandler, metrics: &LoggerMetrics, failure: &SinkFailure) {
    metrics.record_sink_failure();
    if IN_HANDLER.with(|flag| flag.replace(true)) {
        eprintln!("[LOGGER ERROR] {} (raised inside the error handler)", failure);
        return;
    }
    let _scope = HandlerScope;
    handler(failure);
}

/// Reporting handle bound to one sink name
#[derive(Clone)]
pub struct ErrorReporter {
    sink: String,
    handler: ErrorHandler,
    metrics: Arc<LoggerMetrics>,
    deferred: Arc<Mutex<Vec<SinkFailure>>>,
}

impl ErrorReporter {
    pub(crate) fn new(
        sink: impl Into<String>,
        handler: ErrorHandler,
        metrics: Arc<LoggerMetrics>,
    ) -> Self {
        Self {
            sink: sink.into(),
            handler,
            metrics,
            deferred: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sink_name(&self) -> &str {
        &self.sink
    }

    pub(crate) fn failure(&self, error: LoggerError, record: Option<Arc<LogRecord>>) -> SinkFailure {
        SinkFailure {
            sink: self.sink.clone(),
            error,
            record,
        }
    }

    /// Surface a failure now; returns the failure for callers that also
    /// collect it
    ///
    /// Only call this from threads that hold none of the logger's locks,
    /// such as a sink's own worker. Inside `write`, `flush` or `close` use
    /// [`defer`](ErrorReporter::defer).
    pub fn report(&self, error: LoggerError, record: Option<Arc<LogRecord>>) -> SinkFailure {
        let failure = self.failure(error, record);
        notify(&self.handler, &self.metrics, &failure);
        failure
    }

    /// Queue a failure; the dispatcher surfaces it once the sink call that
    /// raised it has returned
    pub fn defer(&self, error: LoggerError, record: Option<Arc<LogRecord>>) {
        let failure = self.failure(error, record);
        self.deferred.lock().push(failure);
    }

    /// Failures queued by [`defer`](ErrorReporter::defer), not yet notified
    pub(crate) fn take_deferred(&self) -> Vec<SinkFailure> {
        std::mem::take(&mut *self.deferred.lock())
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}
