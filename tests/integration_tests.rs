//! Integration tests for the dispatch engine and the built-in sinks
//!
//! These tests verify:
//! - Level gate and per-level delivery (synchronous vs buffered)
//! - Failure isolation and the error-notification channel
//! - Close semantics
//! - File rotation through the public API
//! - HTTP batching retry bound with a scripted transport
//! - Configuration documents, plugins and bindings

use parking_lot::Mutex;
use rust_log_dispatch::core::{
    Environment, LoggerConfig, PendingWrite, RecordFormatter, Sink, SinkFailure, SinkOptions,
    WriteOutcome,
};
use rust_log_dispatch::prelude::*;
use rust_log_dispatch::sinks::{
    Backoff, FileSinkConfig, HttpRequest, HttpSink, HttpSinkConfig, MemorySinkHandle, Transport,
};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

type Failures = Arc<Mutex<Vec<(String, String, Option<String>)>>>;

fn collecting_handler() -> (Failures, impl Fn(&SinkFailure) + Send + Sync + 'static) {
    let failures: Failures = Arc::new(Mutex::new(Vec::new()));
    let sink_failures = Arc::clone(&failures);
    let handler = move |failure: &SinkFailure| {
        sink_failures.lock().push((
            failure.sink.clone(),
            failure.error.to_string(),
            failure.record.as_ref().map(|r| r.message().to_string()),
        ));
    };
    (failures, handler)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Sink whose every operation fails
struct BrokenSink;

impl Sink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    fn write(&mut self, _record: &LogRecord) -> Result<WriteOutcome> {
        Err(LoggerError::writer("disk on fire"))
    }

    fn close(&mut self) -> Result<()> {
        Err(LoggerError::writer("cannot close"))
    }
}

/// Sink that panics on every write
struct PanickingSink;

impl Sink for PanickingSink {
    fn name(&self) -> &str {
        "panicky"
    }

    fn write(&mut self, _record: &LogRecord) -> Result<WriteOutcome> {
        panic!("sink bug");
    }
}

/// Sink without a synchronous path; completes writes on a helper thread
struct DeferredSink {
    completed: Arc<AtomicUsize>,
}

impl Sink for DeferredSink {
    fn name(&self) -> &str {
        "deferred"
    }

    fn write(&mut self, _record: &LogRecord) -> Result<WriteOutcome> {
        let (pending, completer) = PendingWrite::channel();
        let completed = Arc::clone(&self.completed);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            completed.fetch_add(1, Ordering::SeqCst);
            completer.complete(Ok(()));
        });
        Ok(WriteOutcome::Pending(pending))
    }
}

fn memory_logger(builder: LoggerBuilder) -> (Logger, MemorySinkHandle) {
    let memory = MemorySink::new();
    let handle = memory.handle();
    (builder.sink(memory).build().unwrap(), handle)
}

#[test]
fn test_level_gate_buffering_and_sync_scenario() {
    let (logger, records) = memory_logger(
        Logger::builder()
            .min_level(LogLevel::Info)
            .sync(LogLevel::Error, true)
            .sync(LogLevel::Fatal, true)
            .buffer(BufferConfig::new(3).without_timer()),
    );

    logger.debug("x");
    logger.info("a");
    logger.info("b");
    assert!(records.is_empty());
    assert_eq!(logger.buffered_len(), 2);

    logger.info("c");
    assert_eq!(records.messages(), ["a", "b", "c"]);
    assert_eq!(logger.buffered_len(), 0);

    logger.error("boom");
    assert_eq!(records.messages(), ["a", "b", "c", "boom"]);

    logger.flush().unwrap();
    assert!(!records.messages().contains(&"x".to_string()));
    assert_eq!(logger.metrics().filtered(), 1);
    assert_eq!(logger.metrics().drains(), 1);
}

#[test]
fn test_buffered_records_drain_on_timer() {
    let (logger, records) = memory_logger(
        Logger::builder().buffer(BufferConfig::new(100).with_flush_interval(Duration::from_millis(20))),
    );

    logger.info("eventually");
    assert!(wait_until(Duration::from_secs(5), || records.len() == 1));
}

#[test]
fn test_timer_drain_reaches_file_without_flush() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("timer.log");
    let logger = Logger::builder()
        .sink(RotatingFileSink::new(&path).unwrap())
        .buffer(BufferConfig::new(100).with_flush_interval(Duration::from_millis(10)))
        .build()
        .unwrap();

    logger.info("written by the timer");

    let on_disk = wait_until(Duration::from_secs(5), || {
        fs::read_to_string(&path)
            .map(|contents| contents.contains("written by the timer"))
            .unwrap_or(false)
    });
    assert!(on_disk, "timer drain left the record in the file buffer");
    assert_eq!(logger.buffered_len(), 0);
    logger.close();
}

#[test]
fn test_error_handler_may_log_through_same_logger() {
    let shared: Arc<OnceLock<Logger>> = Arc::new(OnceLock::new());
    let handler_logger = Arc::clone(&shared);
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = Arc::clone(&calls);

    let (logger, records) = memory_logger(
        Logger::builder()
            .sink(BrokenSink)
            .buffer(BufferConfig::new(1).without_timer())
            .on_sink_error(move |failure: &SinkFailure| {
                handler_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(logger) = handler_logger.get() {
                    logger.warn(format!("sink '{}' failed", failure.sink));
                }
            }),
    );
    assert!(shared.set(logger.clone()).is_ok());

    let (done_tx, done_rx) = mpsc::channel();
    let worker = logger.clone();
    thread::spawn(move || {
        worker.info("trigger");
        done_tx.send(()).unwrap();
    });
    assert!(
        done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
        "logging from the error handler deadlocked"
    );

    assert_eq!(records.messages(), ["trigger", "sink 'broken' failed"]);
    // the warning's own failure is not handed back to the handler
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(logger.metrics().sink_failures(), 2);
    logger.close();
}

#[test]
fn test_rotation_failure_reaches_handler_that_logs() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("vanishing.log");
    let shared: Arc<OnceLock<Logger>> = Arc::new(OnceLock::new());
    let handler_logger = Arc::clone(&shared);
    let (failures, collect) = collecting_handler();

    let logger = Logger::builder()
        .sink(
            RotatingFileSink::with_policy(&path, RotationPolicy::new().with_max_size(1)).unwrap(),
        )
        .delivery_policy(DeliveryPolicy::all_sync())
        .on_sink_error(move |failure: &SinkFailure| {
            collect(failure);
            if let Some(logger) = handler_logger.get() {
                logger.error("rotation failed");
            }
        })
        .build()
        .unwrap();
    assert!(shared.set(logger.clone()).is_ok());

    logger.info("first");
    fs::remove_file(&path).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let worker = logger.clone();
    thread::spawn(move || {
        worker.info("second");
        done_tx.send(()).unwrap();
    });
    assert!(done_rx.recv_timeout(Duration::from_secs(3)).is_ok());

    let failures = failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "file");
    assert_eq!(failures[0].2.as_deref(), Some("second"));
    drop(failures);

    logger.close();
    // the handler's own record may land after a later, successful rotation
    let contents: String = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| fs::read_to_string(entry.path()).unwrap())
        .collect();
    assert!(contents.contains("second"));
    assert!(contents.contains("rotation failed"));
}

#[test]
fn test_failing_sinks_do_not_block_others() {
    let (failures, handler) = collecting_handler();
    let memory = MemorySink::new();
    let records = memory.handle();

    let logger = Logger::builder()
        .sink(BrokenSink)
        .sink(PanickingSink)
        .sink(memory)
        .on_sink_error(handler)
        .build()
        .unwrap();

    logger.error("sync failure");
    assert_eq!(records.messages(), ["sync failure"]);

    logger.info("buffered failure");
    logger.flush().unwrap_err();
    assert_eq!(records.messages(), ["sync failure", "buffered failure"]);

    let failures = failures.lock();
    let broken: Vec<_> = failures.iter().filter(|f| f.0 == "broken").collect();
    let panicky: Vec<_> = failures.iter().filter(|f| f.0 == "panicky").collect();
    assert_eq!(broken.len(), 2);
    assert_eq!(panicky.len(), 2);
    assert!(broken[0].1.contains("disk on fire"));
    assert_eq!(broken[0].2.as_deref(), Some("sync failure"));
    assert!(panicky[1].1.contains("sink bug"));
    assert_eq!(panicky[1].2.as_deref(), Some("buffered failure"));
    assert_eq!(logger.metrics().sink_failures(), 4);
}

#[test]
fn test_sync_level_falls_back_without_waiting() {
    let completed = Arc::new(AtomicUsize::new(0));
    let logger = Logger::builder()
        .sink(DeferredSink {
            completed: Arc::clone(&completed),
        })
        .build()
        .unwrap();

    logger.error("fire and forget");
    assert_eq!(completed.load(Ordering::SeqCst), 0);

    assert!(logger.close().is_empty());
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_flushes_closes_and_collects_failures() {
    let (failures, handler) = collecting_handler();
    let (logger, records) = memory_logger(
        Logger::builder()
            .sink(BrokenSink)
            .on_sink_error(handler)
            .buffer(BufferConfig::new(100).without_timer()),
    );

    logger.info("pending at close");
    let close_failures = logger.close();

    assert_eq!(records.messages(), ["pending at close"]);
    assert!(records.is_closed());
    // one failed buffered write and one failed close, both from "broken"
    assert_eq!(close_failures.len(), 2);
    assert!(close_failures.iter().all(|f| f.sink == "broken"));
    assert_eq!(failures.lock().len(), 2);

    logger.info("after close");
    logger.error("after close");
    assert_eq!(records.len(), 1);
    assert_eq!(logger.metrics().rejected_after_close(), 2);
    assert!(logger.close().is_empty());
}

#[test]
fn test_last_handle_drop_closes() {
    let memory = MemorySink::new();
    let records = memory.handle();
    {
        let logger = Logger::builder().sink(memory).build().unwrap();
        let child = logger.child(LogContext::new().with_field("scope", "inner"));
        child.info("from child");
    }
    assert_eq!(records.messages(), ["from child"]);
    assert!(records.is_closed());
}

#[test]
fn test_sink_registry() {
    let first = MemorySink::new();
    let first_records = first.handle();
    let logger = Logger::builder()
        .buffer(BufferConfig::new(10).without_timer())
        .sink_with(first, SinkOptions::named("audit"))
        .build()
        .unwrap();

    let duplicate = logger.add_sink_with(MemorySink::new(), SinkOptions::named("audit"));
    assert!(matches!(duplicate, Err(LoggerError::DuplicateSink { .. })));

    logger.info("before removal");
    logger.remove_sink("audit").unwrap();
    assert_eq!(first_records.messages(), ["before removal"]);
    assert!(first_records.is_closed());
    assert!(logger.sink_names().is_empty());

    assert!(matches!(
        logger.remove_sink("audit"),
        Err(LoggerError::UnknownSink { .. })
    ));
}

#[test]
fn test_file_sink_skipped_in_browser_environment() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_path = temp_dir.path().join("app.log");
    let file = RotatingFileSink::new(&log_path).unwrap();

    let (logger, records) = memory_logger(
        Logger::builder()
            .environment(Environment::Browser)
            .sink(file),
    );
    logger.error("only memory");
    logger.close();

    assert_eq!(logger.sink_names(), ["file", "memory"]);
    assert_eq!(records.len(), 1);
    assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
}

fn padded_message(formatter: &RecordFormatter, line_len: usize, tag: usize) -> String {
    let overhead = formatter.format(&LogRecord::new(LogLevel::Info, "")).len() + 1;
    let prefix = format!("record-{}-", tag);
    format!("{:x<width$}", prefix, width = line_len - overhead)
}

#[test]
fn test_rotating_file_fifty_byte_records() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_path = temp_dir.path().join("logs").join("app.log");
    let formatter = RecordFormatter::default();

    let mut sink = RotatingFileSink::with_policy(
        &log_path,
        RotationPolicy::new().with_max_size(100).with_max_files(10),
    )
    .unwrap();

    for i in 0..5 {
        assert!(sink.current_size() <= 100);
        let message = padded_message(&formatter, 50, i);
        sink.write_sync(&LogRecord::new(LogLevel::Info, message))
            .unwrap()
            .unwrap();
    }
    sink.close().unwrap();

    let files = fs::read_dir(log_path.parent().unwrap()).unwrap().count();
    assert!(files >= 2, "expected rotation, found {} files", files);

    let mut lines = Vec::new();
    for path in sink.rotated_files().unwrap().iter().chain([log_path.clone()].iter()) {
        for line in fs::read_to_string(path).unwrap().lines() {
            assert_eq!(line.len() + 1, 50);
            lines.push(line.to_string());
        }
    }
    assert_eq!(lines.len(), 5);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.contains(&format!("record-{}-", i)));
    }
}

#[test]
fn test_file_sink_through_logger_with_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("configured.log");
    let document = format!(
        r#"{{ "path": {:?}, "max_size": "1kb", "max_files": 3, "format": {{ "format": "json" }} }}"#,
        path.to_string_lossy()
    );
    let config: FileSinkConfig = serde_json::from_str(&document).unwrap();

    let logger = Logger::builder()
        .sink(RotatingFileSink::from_config(&config).unwrap())
        .build()
        .unwrap();
    logger.error_with_context(
        "payment failed",
        LogContext::new().with_field("order_id", 42),
    );
    logger.close();

    let contents = fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(parsed["message"], "payment failed");
    assert_eq!(parsed["order_id"], 42);
    assert_eq!(parsed["level"], "error");
}

#[derive(Clone, Default)]
struct AlwaysFailingTransport {
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl Transport for AlwaysFailingTransport {
    fn send(&self, request: &HttpRequest) -> Result<()> {
        self.attempts.lock().push(Instant::now());
        Err(LoggerError::http_status(&request.url, 500))
    }
}

#[test]
fn test_http_sink_retry_bound() {
    let (failures, handler) = collecting_handler();
    let transport = AlwaysFailingTransport::default();
    let config = HttpSinkConfig::new("http://collector.invalid/logs")
        .with_batch_size(2)
        .with_retry_count(2)
        .with_interval(Duration::ZERO)
        .with_backoff(Backoff::new(Duration::from_millis(5), Duration::from_millis(8)));
    let sink = HttpSink::with_transport(config, transport.clone()).unwrap();
    let metrics = sink.metrics();

    let logger = Logger::builder()
        .sink_with(sink, SinkOptions::new().with_sync(true))
        .on_sink_error(handler)
        .build()
        .unwrap();

    logger.info("one");
    logger.info("two");

    assert!(wait_until(Duration::from_secs(5), || !failures.lock().is_empty()));
    assert_eq!(transport.attempts.lock().len(), 3);
    assert_eq!(metrics.batches_failed(), 1);

    let attempts = transport.attempts.lock().clone();
    let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps[0] >= Duration::from_millis(5));
    assert!(gaps[1] >= Duration::from_millis(8));

    let failures = failures.lock().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "http");
    assert!(failures[0].1.contains("after 3 attempts"));
}

#[test]
fn test_config_document_drives_logger() {
    let config = LoggerConfig::from_json(
        r#"{
            "level": "debug",
            "sync": { "info": true },
            "buffer": { "size": 10, "flush_interval_ms": 0 },
            "redact": ["password", "card.number"]
        }"#,
    )
    .unwrap();
    let (logger, records) = memory_logger(Logger::builder().config(&config));

    logger.info_with_context(
        "signup",
        LogContext::new()
            .with_field("user", "ada")
            .with_field("password", "hunter2"),
    );
    logger.debug("buffered");

    let seen = records.records();
    let signup = &seen[0];
    assert_eq!(signup.field("password"), Some(&FieldValue::from("[REDACTED]")));
    assert_eq!(signup.field("user"), Some(&FieldValue::from("ada")));
    assert_eq!(records.len(), 1);
    assert_eq!(logger.buffered_len(), 1);
}

#[test]
fn test_bindings_context_and_correlation() {
    let (logger, records) = memory_logger(
        Logger::builder()
            .sync(LogLevel::Info, true)
            .bind("service", "checkout")
            .plugin(Plugin::new("drop-health", |ctx| {
                ctx.add_step("drop-health", |draft| {
                    if draft.message.starts_with("GET /health") {
                        StepOutcome::Drop
                    } else {
                        StepOutcome::Continue
                    }
                });
            })),
    );

    let request = logger
        .child(LogContext::new().with_field("component", "api"))
        .with_correlation_id("req-1");
    {
        let _guard = request.with_context("user_id", 7);
        request.info("GET /health 200");
        request.info("GET /cart 200");
    }
    request.info("after scope");

    let seen = records.records();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].field("service"), Some(&FieldValue::from("checkout")));
    assert_eq!(seen[0].field("component"), Some(&FieldValue::from("api")));
    assert_eq!(seen[0].field("user_id"), Some(&FieldValue::Int(7)));
    assert_eq!(seen[0].correlation_id(), Some("req-1"));
    assert_eq!(seen[1].field("user_id"), None);
    assert_eq!(logger.metrics().dropped_by_pipeline(), 1);
}
