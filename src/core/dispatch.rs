//! Dispatch engine
//!
//! Owns the registered sinks, the per-level delivery policy and the record
//! buffer of one logger instance. Every accepted record goes either straight
//! to a sink's write path or into the buffer, independently per sink. The
//! engine is the error boundary of the pipeline: sink errors and panics are
//! caught per sink, reported on the error-notification channel and never
//! returned to the code that logged the record.

use super::buffer::{BufferConfig, FlushTimer, RecordBuffer};
use super::delivery_policy::DeliveryPolicy;
use super::error::{LoggerError, Result};
use super::error_channel::{notify, ErrorHandler, ErrorReporter, SinkFailure};
use super::log_record::LogRecord;
use super::metrics::LoggerMetrics;
use super::sink::{Environment, PendingWrite, Sink, SinkOptions, WriteOutcome};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Upper bound on how long `close()` waits for outstanding pending writes
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A registered sink and its registration options
struct SinkSlot {
    name: String,
    sync_override: Option<bool>,
    applicable: bool,
    removed: AtomicBool,
    reporter: ErrorReporter,
    sink: Mutex<Box<dyn Sink>>,
}

impl SinkSlot {
    fn is_sync_for(&self, policy_sync: bool) -> bool {
        self.sync_override.unwrap_or(policy_sync)
    }

    /// Run one sink operation with panic isolation
    fn guarded<T>(&self, op: impl FnOnce(&mut dyn Sink) -> Result<T>) -> Result<T> {
        let mut sink = self.sink.lock();
        match catch_unwind(AssertUnwindSafe(|| op(&mut **sink))) {
            Ok(result) => result,
            Err(panic_info) => Err(LoggerError::SinkPanicked(panic_message(&*panic_info))),
        }
    }

    fn write(&self, record: &LogRecord) -> Result<WriteOutcome> {
        self.guarded(|sink| sink.write(record))
    }

    /// Blocking write, falling back to `write` without waiting
    fn write_sync(&self, record: &LogRecord) -> Result<WriteOutcome> {
        self.guarded(|sink| match sink.write_sync(record) {
            Some(result) => result.map(|()| WriteOutcome::Immediate),
            None => sink.write(record),
        })
    }

    /// Collect what one sink call left behind: failures the sink deferred
    /// during the call, then the call's own error
    fn settle<T>(
        &self,
        result: Result<T>,
        record: Option<&Arc<LogRecord>>,
        failures: &mut Vec<SinkFailure>,
    ) -> Option<T> {
        failures.extend(self.reporter.take_deferred());
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                failures.push(self.reporter.failure(e, record.cloned()));
                None
            }
        }
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// A buffered record and the sinks it was accepted for
struct BufferedRecord {
    record: Arc<LogRecord>,
    targets: Vec<Arc<SinkSlot>>,
}

/// A write still running after its sink's `write` returned
struct PendingEntry {
    slot: Arc<SinkSlot>,
    record: Arc<LogRecord>,
    pending: PendingWrite,
}

/// Construction parameters of a [`Dispatcher`]
pub(crate) struct DispatchConfig {
    pub policy: DeliveryPolicy,
    pub buffer: BufferConfig,
    pub handler: ErrorHandler,
    pub environment: Environment,
    pub metrics: Arc<LoggerMetrics>,
}

pub(crate) struct Dispatcher {
    sinks: RwLock<Vec<Arc<SinkSlot>>>,
    policy: RwLock<DeliveryPolicy>,
    buffer: RecordBuffer<BufferedRecord>,
    pending: Mutex<Vec<PendingEntry>>,
    timer: Mutex<Option<FlushTimer>>,
    /// `true` once `close()` started; dispatch holds a read guard
    closed: RwLock<bool>,
    handler: ErrorHandler,
    environment: Environment,
    metrics: Arc<LoggerMetrics>,
}

impl Dispatcher {
    pub(crate) fn new(config: DispatchConfig) -> Result<Arc<Self>> {
        config.buffer.validate()?;

        let dispatcher = Arc::new(Self {
            sinks: RwLock::new(Vec::new()),
            policy: RwLock::new(config.policy),
            buffer: RecordBuffer::new(config.buffer.size),
            pending: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
            closed: RwLock::new(false),
            handler: config.handler,
            environment: config.environment,
            metrics: config.metrics,
        });

        let interval = config.buffer.flush_interval();
        if !interval.is_zero() {
            let weak: Weak<Dispatcher> = Arc::downgrade(&dispatcher);
            let timer = FlushTimer::start("log-dispatch-flush", interval, move || {
                match weak.upgrade() {
                    Some(dispatcher) => {
                        dispatcher.drain();
                        dispatcher.reap_pending();
                        true
                    }
                    None => false,
                }
            })?;
            *dispatcher.timer.lock() = Some(timer);
        }

        Ok(dispatcher)
    }

    pub(crate) fn add_sink(&self, mut sink: Box<dyn Sink>, options: SinkOptions) -> Result<()> {
        if *self.closed.read() {
            return Err(LoggerError::sink_closed("logger"));
        }

        let name = options.name.unwrap_or_else(|| sink.name().to_string());
        let mut sinks = self.sinks.write();
        if sinks.iter().any(|slot| slot.name == name) {
            return Err(LoggerError::duplicate_sink(name));
        }

        let applicable = sink.supports(self.environment);
        if !applicable {
            eprintln!(
                "[LOGGER WARNING] Sink '{}' does not support the {:?} environment and will be skipped",
                name, self.environment
            );
        }

        let reporter = ErrorReporter::new(
            name.clone(),
            Arc::clone(&self.handler),
            Arc::clone(&self.metrics),
        );
        sink.attach(reporter.clone());

        sinks.push(Arc::new(SinkSlot {
            name,
            sync_override: options.sync,
            applicable,
            removed: AtomicBool::new(false),
            reporter,
            sink: Mutex::new(sink),
        }));
        Ok(())
    }

    /// Unregister a sink, delivering its buffered records and closing it
    pub(crate) fn remove_sink(&self, name: &str) -> Result<()> {
        let slot = {
            let mut sinks = self.sinks.write();
            let index = sinks
                .iter()
                .position(|slot| slot.name == name)
                .ok_or_else(|| LoggerError::unknown_sink(name))?;
            sinks.remove(index)
        };

        self.drain();
        slot.removed.store(true, Ordering::Release);
        let result = slot.guarded(|sink| sink.close());
        self.notify_all(&slot.reporter.take_deferred());
        result
    }

    pub(crate) fn sink_names(&self) -> Vec<String> {
        self.sinks.read().iter().map(|slot| slot.name.clone()).collect()
    }

    pub(crate) fn set_policy(&self, policy: DeliveryPolicy) {
        *self.policy.write() = policy;
    }

    pub(crate) fn policy(&self) -> DeliveryPolicy {
        *self.policy.read()
    }

    pub(crate) fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// Deliver one accepted record to every applicable sink
    ///
    /// Failures reach the error handler after every dispatcher lock is
    /// released, so a handler may log through the same logger.
    pub(crate) fn dispatch(&self, record: LogRecord) {
        let closed = self.closed.read();
        if *closed {
            self.metrics.record_rejected_after_close();
            return;
        }
        self.metrics.record_dispatched();

        let record = Arc::new(record);
        let policy_sync = self.policy.read().is_sync(record.level());
        let slots: Vec<Arc<SinkSlot>> = self
            .sinks
            .read()
            .iter()
            .filter(|slot| slot.applicable)
            .cloned()
            .collect();

        let mut failures = Vec::new();
        let mut buffered_targets = Vec::new();
        for slot in slots {
            if slot.is_sync_for(policy_sync) {
                self.deliver(&slot, &record, SinkSlot::write_sync, &mut failures);
            } else {
                buffered_targets.push(slot);
            }
        }

        if !buffered_targets.is_empty() {
            self.metrics.record_buffered();
            let full = self.buffer.push(BufferedRecord {
                record,
                targets: buffered_targets,
            });
            if full {
                failures.extend(self.drain_unreported());
            }
        }

        drop(closed);
        self.notify_all(&failures);
        self.reap_pending();
    }

    fn notify_all(&self, failures: &[SinkFailure]) {
        for failure in failures {
            notify(&self.handler, &self.metrics, failure);
        }
    }

    /// Write one record to one sink, tracking the outcome
    fn deliver(
        &self,
        slot: &Arc<SinkSlot>,
        record: &Arc<LogRecord>,
        write: fn(&SinkSlot, &LogRecord) -> Result<WriteOutcome>,
        failures: &mut Vec<SinkFailure>,
    ) {
        let outcome = slot.settle(write(slot, record), Some(record), failures);
        if let Some(WriteOutcome::Pending(pending)) = outcome {
            self.pending.lock().push(PendingEntry {
                slot: Arc::clone(slot),
                record: Arc::clone(record),
                pending,
            });
        }
    }

    /// Swap the buffer out, write every record to its target sinks and
    /// report the failures
    pub(crate) fn drain(&self) -> Vec<SinkFailure> {
        let failures = self.drain_unreported();
        self.notify_all(&failures);
        failures
    }

    /// Drain under the drain lock; the caller reports the failures once
    /// the lock is released
    fn drain_unreported(&self) -> Vec<SinkFailure> {
        let _drain = self.buffer.lock_drain();
        let batch = self.buffer.take();
        if batch.is_empty() {
            return Vec::new();
        }
        self.metrics.record_drain();

        let mut failures = Vec::new();
        let mut touched: Vec<&Arc<SinkSlot>> = Vec::new();
        for entry in &batch {
            for slot in &entry.targets {
                if slot.removed.load(Ordering::Acquire) {
                    continue;
                }
                self.deliver(slot, &entry.record, SinkSlot::write, &mut failures);
                if !touched.iter().any(|seen| Arc::ptr_eq(seen, slot)) {
                    touched.push(slot);
                }
            }
        }

        for slot in touched {
            let result = slot.guarded(|sink| sink.end_batch());
            slot.settle(result, None, &mut failures);
        }
        failures
    }

    /// Report pending writes that have completed with an error
    pub(crate) fn reap_pending(&self) -> Vec<SinkFailure> {
        let finished: Vec<(PendingEntry, Result<()>)> = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                return Vec::new();
            }
            let mut finished = Vec::new();
            let mut index = 0;
            while index < pending.len() {
                match pending[index].pending.try_result() {
                    Some(result) => finished.push((pending.swap_remove(index), result)),
                    None => index += 1,
                }
            }
            finished
        };

        finished
            .into_iter()
            .filter_map(|(entry, result)| {
                result
                    .err()
                    .map(|e| entry.slot.reporter.report(e, Some(entry.record)))
            })
            .collect()
    }

    /// Wait for every outstanding pending write, up to `timeout` in total
    fn wait_pending(&self, timeout: Duration) -> Vec<SinkFailure> {
        let entries = std::mem::take(&mut *self.pending.lock());
        let deadline = Instant::now() + timeout;

        entries
            .into_iter()
            .filter_map(|entry| {
                let remaining = deadline.saturating_duration_since(Instant::now());
                entry
                    .pending
                    .wait(remaining)
                    .err()
                    .map(|e| entry.slot.reporter.report(e, Some(entry.record)))
            })
            .collect()
    }

    fn for_each_sink(
        &self,
        op: impl Fn(&mut dyn Sink) -> Result<()>,
        failures: &mut Vec<SinkFailure>,
    ) {
        let slots: Vec<Arc<SinkSlot>> = self.sinks.read().iter().cloned().collect();
        let mut raised = Vec::new();
        for slot in slots.iter().filter(|slot| slot.applicable) {
            slot.settle(slot.guarded(&op), None, &mut raised);
        }
        self.notify_all(&raised);
        failures.extend(raised);
    }

    /// Drain the buffer and flush every sink; returns the first failure
    pub(crate) fn flush(&self) -> Result<()> {
        let mut failures = self.drain();
        failures.extend(self.reap_pending());
        self.for_each_sink(|sink| sink.flush(), &mut failures);

        match failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(()),
        }
    }

    /// Stop accepting records, deliver what is buffered and close every sink
    ///
    /// Idempotent: only the first call does any work. Failures are reported
    /// on the error channel and also returned.
    pub(crate) fn close(&self) -> Vec<SinkFailure> {
        {
            let mut closed = self.closed.write();
            if *closed {
                return Vec::new();
            }
            *closed = true;
        }

        let timer = self.timer.lock().take();
        if let Some(mut timer) = timer {
            timer.stop();
        }

        let mut failures = self.drain();
        failures.extend(self.wait_pending(DEFAULT_SHUTDOWN_TIMEOUT));
        self.for_each_sink(|sink| sink.close(), &mut failures);
        failures
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let failures = self.close();
        if !failures.is_empty() {
            eprintln!(
                "[LOGGER WARNING] Logger shut down with {} sink failure(s)",
                failures.len()
            );
        }
    }
}
