//! Batched HTTP sink
//!
//! Records are serialized to JSON on `write` and queued. A background
//! worker sends the queue as one JSON array when it reaches `batch_size`
//! or when the interval timer fires. At most one batch is in flight per
//! sink. Failed batches are retried with capped exponential backoff and,
//! once every attempt failed, put back at the front of the queue; the
//! queue never holds more than `2 * batch_size` re-queued records.

use crate::core::config::DurationValue;
use crate::core::{ErrorReporter, LogRecord, LoggerError, Result, Sink, WriteOutcome};
use crossbeam_channel::{bounded, never, select, tick, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// HTTP verb used for batch requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// Delay between delivery attempts: `min(base * 2^attempt, max)`
///
/// ```
/// use rust_log_dispatch::sinks::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::default();
/// assert_eq!(backoff.delay(0), Duration::from_millis(1000));
/// assert_eq!(backoff.delay(3), Duration::from_millis(8000));
/// assert_eq!(backoff.delay(10), Duration::from_millis(30_000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            max_ms: 30_000,
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
        }
    }

    /// Delay after the zero-based failed `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_ms))
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_interval() -> DurationValue {
    DurationValue::Millis(5000)
}

fn default_retry_count() -> u32 {
    3
}

/// HTTP sink configuration
///
/// ```
/// use rust_log_dispatch::sinks::HttpSinkConfig;
///
/// let config: HttpSinkConfig = serde_json::from_str(r#"{
///     "url": "https://logs.example.com/ingest",
///     "headers": { "Authorization": "Bearer abc" },
///     "interval": "10s"
/// }"#).unwrap();
///
/// assert_eq!(config.batch_size, 100);
/// assert_eq!(config.retry_count, 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSinkConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Timer interval; `0` disables the timer
    #[serde(default = "default_interval")]
    pub interval: DurationValue,
    /// Additional attempts after the first failed one
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default)]
    pub backoff: Backoff,
    /// Per-request timeout handed to the transport
    #[serde(default)]
    pub timeout: Option<DurationValue>,
}

impl HttpSinkConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::default(),
            headers: BTreeMap::new(),
            batch_size: default_batch_size(),
            interval: default_interval(),
            retry_count: default_retry_count(),
            backoff: Backoff::default(),
            timeout: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// # Errors
    ///
    /// Configuration error for a missing URL, a zero batch size or an
    /// unparseable interval or timeout.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(LoggerError::config("HttpSink", "url is required"));
        }
        if self.batch_size == 0 {
            return Err(LoggerError::config("HttpSink", "batch_size must be > 0"));
        }
        self.interval.to_duration()?;
        if let Some(ref timeout) = self.timeout {
            timeout.to_duration()?;
        }
        Ok(())
    }
}

/// One batch request as handed to a [`Transport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

/// Sends one request and reports whether it succeeded
///
/// Non-success statuses must be returned as errors
/// ([`LoggerError::HttpStatus`]).
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<()>;
}

/// Blocking [`reqwest`] transport
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be built
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LoggerError::transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<()> {
        let method = match request.method {
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body.clone())
            .send()
            .map_err(|e| LoggerError::transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(LoggerError::http_status(&request.url, status.as_u16()))
        }
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

/// Delivery counters of one [`HttpSink`]
#[derive(Debug, Default)]
pub struct BatchMetrics {
    attempts: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    records_sent: AtomicU64,
    records_dropped: AtomicU64,
}

impl BatchMetrics {
    /// Requests issued, retries included
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    /// Batches that exhausted every attempt
    pub fn batches_failed(&self) -> u64 {
        self.batches_failed.load(Ordering::Relaxed)
    }

    pub fn records_sent(&self) -> u64 {
        self.records_sent.load(Ordering::Relaxed)
    }

    /// Records discarded by the re-queue bound
    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct BatchQueue {
    pending: VecDeque<serde_json::Value>,
    in_flight: bool,
}

enum Command {
    Flush,
    Shutdown,
}

struct Shared {
    url: String,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    batch_size: usize,
    retry_count: u32,
    backoff: Backoff,
    transport: Box<dyn Transport>,
    queue: Mutex<BatchQueue>,
    metrics: Arc<BatchMetrics>,
    reporter: Mutex<Option<ErrorReporter>>,
}

impl Shared {
    /// Send everything pending as one batch; no-op while another batch is
    /// in flight or when nothing is pending
    fn flush_batch(&self) -> Result<()> {
        let batch: Vec<serde_json::Value> = {
            let mut queue = self.queue.lock();
            if queue.in_flight || queue.pending.is_empty() {
                return Ok(());
            }
            queue.in_flight = true;
            queue.pending.drain(..).collect()
        };

        let result = self.transmit(&batch);

        let mut queue = self.queue.lock();
        queue.in_flight = false;
        match result {
            Ok(()) => {
                self.metrics.batches_sent.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .records_sent
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                Ok(())
            }
            Err(last_error) => {
                let records = batch.len();
                self.metrics.batches_failed.fetch_add(1, Ordering::Relaxed);
                for value in batch.into_iter().rev() {
                    queue.pending.push_front(value);
                }
                let bound = self.batch_size.saturating_mul(2);
                let excess = queue.pending.len().saturating_sub(bound);
                if excess > 0 {
                    queue.pending.drain(..excess);
                    self.metrics
                        .records_dropped
                        .fetch_add(excess as u64, Ordering::Relaxed);
                    eprintln!(
                        "[LOGGER WARNING] HTTP sink '{}' dropped {} undeliverable records",
                        self.url, excess
                    );
                }
                Err(LoggerError::delivery_failed(
                    records,
                    self.retry_count + 1,
                    last_error,
                ))
            }
        }
    }

    fn transmit(&self, batch: &[serde_json::Value]) -> Result<()> {
        let request = HttpRequest {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: serde_json::to_vec(batch)?,
        };

        let mut attempt = 0;
        loop {
            self.metrics.attempts.fetch_add(1, Ordering::Relaxed);
            match self.transport.send(&request) {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.retry_count => return Err(e),
                Err(_) => {
                    thread::sleep(self.backoff.delay(attempt));
                    attempt += 1;
                }
            }
        }
    }

    fn pending_len(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Surface a failure from the worker thread
    fn report(&self, error: LoggerError) {
        let reporter = self.reporter.lock().clone();
        match reporter {
            Some(reporter) => {
                reporter.report(error, None);
            }
            None => eprintln!("[LOGGER ERROR] HTTP sink '{}': {}", self.url, error),
        }
    }

    /// Queue a failure raised inside a sink call for the dispatcher
    fn defer(&self, error: LoggerError) {
        match *self.reporter.lock() {
            Some(ref reporter) => reporter.defer(error, None),
            None => eprintln!("[LOGGER ERROR] HTTP sink '{}': {}", self.url, error),
        }
    }
}

/// Sink posting JSON batches to an HTTP endpoint
///
/// # Example
///
/// ```no_run
/// use rust_log_dispatch::prelude::*;
/// use rust_log_dispatch::sinks::{HttpSink, HttpSinkConfig};
///
/// let config = HttpSinkConfig::new("https://logs.example.com/ingest")
///     .with_header("Authorization", "Bearer abc")
///     .with_batch_size(50);
///
/// let logger = Logger::builder()
///     .sink(HttpSink::new(config).unwrap())
///     .build()
///     .unwrap();
/// logger.info("shipped");
/// ```
pub struct HttpSink {
    shared: Arc<Shared>,
    commands: Option<Sender<Command>>,
    worker: Option<thread::JoinHandle<()>>,
    closed: bool,
}

impl HttpSink {
    /// Sink using [`ReqwestTransport`]
    ///
    /// # Errors
    ///
    /// Configuration errors abort construction
    pub fn new(config: HttpSinkConfig) -> Result<Self> {
        config.validate()?;
        let timeout = config
            .timeout
            .as_ref()
            .map(DurationValue::to_duration)
            .transpose()?;
        let transport = ReqwestTransport::new(timeout)?;
        Self::with_transport(config, transport)
    }

    /// # Errors
    ///
    /// Configuration errors abort construction
    pub fn with_transport<T: Transport + 'static>(config: HttpSinkConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let interval = config.interval.to_duration()?;

        let mut headers = config.headers;
        if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        let shared = Arc::new(Shared {
            url: config.url,
            method: config.method,
            headers,
            batch_size: config.batch_size,
            retry_count: config.retry_count,
            backoff: config.backoff,
            transport: Box::new(transport),
            queue: Mutex::new(BatchQueue::default()),
            metrics: Arc::new(BatchMetrics::default()),
            reporter: Mutex::new(None),
        });

        let (commands, command_rx) = bounded(1);
        let worker = spawn_worker(Arc::clone(&shared), command_rx, interval)?;

        Ok(Self {
            shared,
            commands: Some(commands),
            worker: Some(worker),
            closed: false,
        })
    }

    pub fn metrics(&self) -> Arc<BatchMetrics> {
        Arc::clone(&self.shared.metrics)
    }

    /// Records waiting for the next batch
    pub fn pending_len(&self) -> usize {
        self.shared.pending_len()
    }

    fn request_flush(&self) {
        if let Some(ref commands) = self.commands {
            match commands.try_send(Command::Flush) {
                // Full: a flush is already queued for the worker.
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    eprintln!("[LOGGER WARNING] HTTP sink worker is not running");
                }
            }
        }
    }

    fn stop_worker(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Shutdown);
        }
        if let Some(handle) = self.worker.take() {
            if let Err(e) = handle.join() {
                eprintln!("[LOGGER ERROR] HTTP sink worker panicked: {:?}", e);
            }
        }
    }
}

fn spawn_worker(
    shared: Arc<Shared>,
    commands: Receiver<Command>,
    interval: Duration,
) -> Result<thread::JoinHandle<()>> {
    let ticker = if interval.is_zero() {
        never()
    } else {
        tick(interval)
    };

    thread::Builder::new()
        .name("http-sink".to_string())
        .spawn(move || loop {
            select! {
                recv(commands) -> command => match command {
                    Ok(Command::Flush) => {
                        // Keep sending while full batches are waiting
                        loop {
                            if let Err(e) = shared.flush_batch() {
                                shared.report(e);
                                break;
                            }
                            if shared.pending_len() < shared.batch_size {
                                break;
                            }
                        }
                    }
                    Ok(Command::Shutdown) | Err(_) => break,
                },
                recv(ticker) -> _ => {
                    if let Err(e) = shared.flush_batch() {
                        shared.report(e);
                    }
                }
            }
        })
        .map_err(|e| LoggerError::io_operation("starting HTTP sink worker", "http-sink", e))
}

impl Sink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    fn write(&mut self, record: &LogRecord) -> Result<WriteOutcome> {
        if self.closed {
            return Err(LoggerError::sink_closed(self.name()));
        }
        let len = {
            let mut queue = self.shared.queue.lock();
            queue.pending.push_back(record.to_json_value());
            queue.pending.len()
        };
        if len >= self.shared.batch_size {
            self.request_flush();
        }
        Ok(WriteOutcome::Immediate)
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.flush_batch()
    }

    /// Batches leave on size or on the timer, not per logger drain
    fn end_batch(&mut self) -> Result<()> {
        Ok(())
    }

    /// Stop the timer and make one last attempt; a failed final batch is
    /// reported, never returned
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stop_worker();
        if let Err(e) = self.shared.flush_batch() {
            self.shared.defer(e);
        }
        Ok(())
    }

    fn attach(&mut self, reporter: ErrorReporter) {
        *self.shared.reporter.lock() = Some(reporter);
    }
}

impl Drop for HttpSink {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSink")
            .field("url", &self.shared.url)
            .field("batch_size", &self.shared.batch_size)
            .field("pending", &self.shared.pending_len())
            .field("closed", &self.closed)
            .finish()
    }
}
