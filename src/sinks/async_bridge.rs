//! Bridge running an [`AsyncSink`] on a tokio runtime
//!
//! Every operation is queued to one task per bridged sink, so the sink sees
//! its records strictly in dispatch order. Writes return
//! [`WriteOutcome::Pending`]; `flush` and `close` block the calling thread
//! until the task has handled them, so call them from outside the runtime
//! or from a multi-threaded one.

use crate::core::{
    AsyncSink, LogRecord, LoggerError, PendingWrite, Result, Sink, WriteCompleter, WriteOutcome,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

enum Job {
    Write(LogRecord, WriteCompleter),
    Flush(WriteCompleter),
    Close(WriteCompleter),
}

/// Adapts an [`AsyncSink`] to the [`Sink`] contract
///
/// # Example
///
/// ```no_run
/// use rust_log_dispatch::core::{AsyncSink, LogRecord, Result};
/// use rust_log_dispatch::sinks::AsyncSinkBridge;
/// use rust_log_dispatch::Logger;
/// use async_trait::async_trait;
///
/// struct Collector;
///
/// #[async_trait]
/// impl AsyncSink for Collector {
///     fn name(&self) -> &str {
///         "collector"
///     }
///
///     async fn write(&mut self, _record: &LogRecord) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let bridge = AsyncSinkBridge::new(Collector, runtime.handle().clone());
/// let logger = Logger::builder().sink(bridge).build().unwrap();
/// logger.info("handled on the runtime");
/// logger.close();
/// ```
pub struct AsyncSinkBridge {
    name: String,
    jobs: Option<UnboundedSender<Job>>,
    wait_timeout: Duration,
}

impl AsyncSinkBridge {
    /// Spawn the sink's task on `handle`
    pub fn new<S: AsyncSink>(sink: S, handle: Handle) -> Self {
        let name = sink.name().to_string();
        let (jobs, receiver) = unbounded_channel();
        handle.spawn(run(sink, receiver));

        Self {
            name,
            jobs: Some(jobs),
            wait_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// How long `flush` and `close` wait for the task
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    fn submit(&self, make_job: impl FnOnce(WriteCompleter) -> Job) -> Result<PendingWrite> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| LoggerError::sink_closed(&self.name))?;
        let (pending, completer) = PendingWrite::channel();
        jobs.send(make_job(completer))
            .map_err(|_| LoggerError::writer(format!("async sink '{}' task has stopped", self.name)))?;
        Ok(pending)
    }
}

async fn run<S: AsyncSink>(mut sink: S, mut jobs: UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Write(record, done) => done.complete(sink.write(&record).await),
            Job::Flush(done) => done.complete(sink.flush().await),
            Job::Close(done) => {
                done.complete(sink.close().await);
                break;
            }
        }
    }
}

impl Sink for AsyncSinkBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &LogRecord) -> Result<WriteOutcome> {
        let pending = self.submit(|done| Job::Write(record.clone(), done))?;
        Ok(WriteOutcome::Pending(pending))
    }

    fn flush(&mut self) -> Result<()> {
        self.submit(Job::Flush)?.wait(self.wait_timeout)
    }

    /// Writes already complete through their pending handles
    fn end_batch(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.jobs.is_none() {
            return Ok(());
        }
        let result = self.submit(Job::Close)?.wait(self.wait_timeout);
        self.jobs = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SlowSink {
        seen: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl AsyncSink for SlowSink {
        fn name(&self) -> &str {
            "slow"
        }

        async fn write(&mut self, record: &LogRecord) -> Result<()> {
            tokio::task::yield_now().await;
            if record.message() == "reject" {
                return Err(LoggerError::transport("rejected"));
            }
            self.seen.lock().push(record.message().to_string());
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            *self.closed.lock() = true;
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writes_complete_in_order() {
        let sink = SlowSink::default();
        let mut bridge = AsyncSinkBridge::new(sink.clone(), Handle::current());

        let mut pending = Vec::new();
        for i in 0..20 {
            match bridge.write(&LogRecord::new(LogLevel::Info, format!("m{}", i))).unwrap() {
                WriteOutcome::Pending(p) => pending.push(p),
                WriteOutcome::Immediate => panic!("bridge writes are pending"),
            }
        }
        tokio::task::block_in_place(|| {
            for p in pending {
                p.wait(Duration::from_secs(5)).unwrap();
            }
        });

        let expected: Vec<String> = (0..20).map(|i| format!("m{}", i)).collect();
        assert_eq!(*sink.seen.lock(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_resolves_pending_with_error() {
        let mut bridge = AsyncSinkBridge::new(SlowSink::default(), Handle::current());
        let outcome = bridge.write(&LogRecord::new(LogLevel::Warn, "reject")).unwrap();

        let WriteOutcome::Pending(pending) = outcome else {
            panic!("expected a pending write");
        };
        let result = tokio::task::block_in_place(|| pending.wait(Duration::from_secs(5)));
        assert!(matches!(result, Err(LoggerError::Transport(_))));
    }

    #[test]
    fn test_close_then_write_is_rejected() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let sink = SlowSink::default();
        let mut bridge = AsyncSinkBridge::new(sink.clone(), runtime.handle().clone());

        bridge.close().unwrap();
        assert!(*sink.closed.lock());
        assert!(bridge.close().is_ok());
        assert!(matches!(
            bridge.write(&LogRecord::new(LogLevel::Info, "late")),
            Err(LoggerError::SinkClosed { .. })
        ));
    }
}
