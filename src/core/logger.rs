//! Main logger implementation

use super::{
    buffer::BufferConfig,
    config::LoggerConfig,
    delivery_policy::{DeliveryMode, DeliveryPolicy},
    dispatch::{DispatchConfig, Dispatcher},
    error::Result,
    error_channel::{stderr_handler, ErrorHandler, SinkFailure},
    log_context::{merge_missing, ContextGuard, FieldValue, Fields, LogContext, LoggerContext},
    log_level::LogLevel,
    log_record::RecordDraft,
    metrics::LoggerMetrics,
    pipeline::{Pipeline, PipelineContext, Plugin, StepOutcome},
    sink::{Environment, Sink, SinkOptions},
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Structured logger handle
///
/// Cheap to clone: clones and [`child`](Logger::child) loggers share the
/// same sinks, buffer, level and metrics. The engine closes when
/// [`close`](Logger::close) is called or the last handle is dropped.
#[derive(Clone)]
pub struct Logger {
    dispatcher: Arc<Dispatcher>,
    min_level: Arc<RwLock<LogLevel>>,
    pipeline: Pipeline,
    /// Fixed bindings: builder, plugins, and every `child()` up the chain
    bindings: Arc<Fields>,
    context: LoggerContext,
    correlation_id: Option<Arc<str>>,
    metrics: Arc<LoggerMetrics>,
}

impl Logger {
    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use rust_log_dispatch::prelude::*;
    ///
    /// let logger = Logger::builder()
    ///     .min_level(LogLevel::Debug)
    ///     .sink(ConsoleSink::new())
    ///     .build()
    ///     .unwrap();
    /// logger.info("ready");
    /// ```
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Level gate; nothing is assembled for disabled levels
    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= *self.min_level.read()
    }

    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    /// Change the minimum level of this logger and every logger sharing it
    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
    }

    /// Gate, build, enrich and dispatch one record
    pub(crate) fn emit<F>(&self, level: LogLevel, build: F)
    where
        F: FnOnce() -> RecordDraft,
    {
        if !self.is_enabled(level) {
            self.metrics.record_filtered();
            return;
        }

        let mut draft = build();
        self.context.merge_into(&mut draft.fields);
        merge_missing(&mut draft.fields, &self.bindings);
        if draft.correlation_id.is_none() {
            draft.correlation_id = self.correlation_id.as_deref().map(str::to_string);
        }

        if self.pipeline.run(&mut draft) == StepOutcome::Drop {
            self.metrics.record_dropped_by_pipeline();
            return;
        }

        self.dispatcher.dispatch(draft.into_record());
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(level, || RecordDraft::new(level, message));
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    /// Log with structured fields
    pub fn log_with_context(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        context: LogContext,
    ) {
        self.emit(level, || {
            RecordDraft::new(level, message).with_fields(context.into_fields())
        });
    }

    pub fn info_with_context(&self, message: impl Into<String>, context: LogContext) {
        self.log_with_context(LogLevel::Info, message, context);
    }

    pub fn warn_with_context(&self, message: impl Into<String>, context: LogContext) {
        self.log_with_context(LogLevel::Warn, message, context);
    }

    pub fn error_with_context(&self, message: impl Into<String>, context: LogContext) {
        self.log_with_context(LogLevel::Error, message, context);
    }

    /// Derive a logger whose records carry `fields` in addition to this
    /// logger's bindings
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_dispatch::prelude::*;
    ///
    /// let logger = Logger::builder().build().unwrap();
    /// let requests = logger.child(LogContext::new().with_field("component", "http"));
    /// requests.info("listening");
    /// ```
    #[must_use]
    pub fn child(&self, fields: LogContext) -> Logger {
        let mut bindings = fields.into_fields();
        merge_missing(&mut bindings, &self.bindings);

        Logger {
            bindings: Arc::new(bindings),
            ..self.clone()
        }
    }

    /// Derive a logger stamping `id` on records that carry no correlation id
    #[must_use]
    pub fn with_correlation_id(&self, id: impl Into<String>) -> Logger {
        Logger {
            correlation_id: Some(Arc::from(id.into())),
            ..self.clone()
        }
    }

    /// Dynamic bindings shared by this logger and its clones
    pub fn context(&self) -> &LoggerContext {
        &self.context
    }

    /// Bind `key` until the returned guard is dropped
    pub fn with_context<K, V>(&self, key: K, value: V) -> ContextGuard
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.context.scoped(key, value)
    }

    /// Register a sink under its own name
    pub fn add_sink<S: Sink + 'static>(&self, sink: S) -> Result<()> {
        self.dispatcher.add_sink(Box::new(sink), SinkOptions::default())
    }

    pub fn add_sink_with<S: Sink + 'static>(&self, sink: S, options: SinkOptions) -> Result<()> {
        self.dispatcher.add_sink(Box::new(sink), options)
    }

    /// Unregister and close a sink after delivering its buffered records
    pub fn remove_sink(&self, name: &str) -> Result<()> {
        self.dispatcher.remove_sink(name)
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.dispatcher.sink_names()
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        self.dispatcher.policy()
    }

    /// Replace the per-level delivery policy
    pub fn set_delivery_policy(&self, policy: DeliveryPolicy) {
        self.dispatcher.set_policy(policy);
    }

    /// Records waiting in the buffer
    pub fn buffered_len(&self) -> usize {
        self.dispatcher.buffered_len()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.dispatcher.buffer_capacity()
    }

    /// Get the logger metrics for detailed observability
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_dispatch::prelude::*;
    ///
    /// let logger = Logger::builder().min_level(LogLevel::Info).build().unwrap();
    /// logger.debug("filtered");
    ///
    /// let metrics = logger.metrics();
    /// assert_eq!(metrics.filtered(), 1);
    /// println!("Failure rate: {:.2}%", metrics.failure_rate());
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Drain the buffer and flush every sink
    ///
    /// Every failure is reported on the error channel; the first one is
    /// also returned.
    pub fn flush(&self) -> Result<()> {
        self.dispatcher.flush()
    }

    /// Stop accepting records, deliver everything buffered and close every
    /// sink
    ///
    /// Only the first call does any work. Sink failures are reported on the
    /// error channel and returned, never propagated.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_dispatch::prelude::*;
    ///
    /// let logger = Logger::builder().sink(MemorySink::new()).build().unwrap();
    /// logger.info("last words");
    ///
    /// let failures = logger.close();
    /// assert!(failures.is_empty());
    /// assert!(logger.is_closed());
    /// ```
    pub fn close(&self) -> Vec<SinkFailure> {
        self.dispatcher.close()
    }

    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level())
            .field("sinks", &self.sink_names())
            .field("steps", &self.pipeline.len())
            .finish_non_exhaustive()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_log_dispatch::prelude::*;
/// use std::time::Duration;
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .sync(LogLevel::Warn, true)
///     .buffer(BufferConfig::new(500).with_flush_interval(Duration::from_millis(250)))
///     .sink_with(ConsoleSink::new(), SinkOptions::named("stdout"))
///     .plugin(Plugin::redact(["password"]))
///     .bind("service", "billing")
///     .on_sink_error(|failure| eprintln!("ALERT: {}", failure))
///     .build()
///     .unwrap();
/// ```
pub struct LoggerBuilder {
    min_level: LogLevel,
    sinks: Vec<(Box<dyn Sink>, SinkOptions)>,
    policy: DeliveryPolicy,
    buffer: BufferConfig,
    handler: Option<ErrorHandler>,
    plugins: Vec<Plugin>,
    bindings: Fields,
    environment: Environment,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::Info,
            sinks: Vec::new(),
            policy: DeliveryPolicy::default(),
            buffer: BufferConfig::default(),
            handler: None,
            plugins: Vec::new(),
            bindings: Fields::new(),
            environment: Environment::detect(),
        }
    }

    /// Apply level, delivery policy, buffer, sampling and redaction settings
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: &LoggerConfig) -> Self {
        self.min_level = config.level;
        self.policy = DeliveryPolicy::from_sync_map(&config.sync);
        self.buffer = config.buffer;
        if let Some(ref sampling) = config.sampling {
            self.plugins.push(Plugin::sampling(sampling.clone()));
        }
        if !config.redact.is_empty() {
            self.plugins.push(Plugin::redact(config.redact.clone()));
        }
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Add a sink registered under its own name
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(self, sink: S) -> Self {
        self.sink_with(sink, SinkOptions::default())
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink_with<S: Sink + 'static>(mut self, sink: S, options: SinkOptions) -> Self {
        self.sinks.push((Box::new(sink), options));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Synchronous (`true`) or buffered (`false`) delivery for one level
    #[must_use = "builder methods return a new value"]
    pub fn sync(mut self, level: LogLevel, sync: bool) -> Self {
        let mode = if sync {
            DeliveryMode::Synchronous
        } else {
            DeliveryMode::Buffered
        };
        self.policy.set(level, mode);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    /// Receive sink failures instead of the default stderr line
    #[must_use = "builder methods return a new value"]
    pub fn on_sink_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SinkFailure) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Install a plugin; plugins install in the order they are added
    #[must_use = "builder methods return a new value"]
    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Add a fixed binding merged into every record
    #[must_use = "builder methods return a new value"]
    pub fn bind<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.bindings.insert(key.into(), value.into());
        self
    }

    /// Override the detected runtime environment
    #[must_use = "builder methods return a new value"]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Build the Logger
    ///
    /// Fails on an invalid buffer configuration or a duplicate sink name.
    pub fn build(self) -> Result<Logger> {
        let metrics = Arc::new(LoggerMetrics::new());
        let dispatcher = Dispatcher::new(DispatchConfig {
            policy: self.policy,
            buffer: self.buffer,
            handler: self.handler.unwrap_or_else(stderr_handler),
            environment: self.environment,
            metrics: Arc::clone(&metrics),
        })?;

        for (sink, options) in self.sinks {
            dispatcher.add_sink(sink, options)?;
        }

        let mut pipeline_context = PipelineContext::new();
        for plugin in self.plugins {
            plugin.install(&mut pipeline_context);
        }
        let (pipeline, mut bindings) = pipeline_context.into_parts();
        // Builder bindings win over plugin bindings.
        for (key, value) in self.bindings {
            bindings.insert(key, value);
        }

        Ok(Logger {
            dispatcher,
            min_level: Arc::new(RwLock::new(self.min_level)),
            pipeline,
            bindings: Arc::new(bindings),
            context: LoggerContext::new(),
            correlation_id: None,
            metrics,
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LoggerError;
    use crate::sinks::{MemorySink, MemorySinkHandle};
    use parking_lot::Mutex;

    fn memory_logger(builder: LoggerBuilder) -> (Logger, MemorySinkHandle) {
        let sink = MemorySink::new();
        let handle = sink.handle();
        let logger = builder
            .sink_with(sink, SinkOptions::named("mem"))
            .build()
            .unwrap();
        (logger, handle)
    }

    #[test]
    fn test_builder_defaults() {
        let logger = Logger::builder().build().unwrap();
        assert_eq!(logger.min_level(), LogLevel::Info);
        assert_eq!(logger.delivery_policy(), DeliveryPolicy::default());
        assert_eq!(logger.buffer_capacity(), 100);
        assert!(logger.sink_names().is_empty());
    }

    #[test]
    fn test_duplicate_sink_fails_build() {
        let result = Logger::builder()
            .sink(MemorySink::new())
            .sink(MemorySink::new())
            .build();
        assert!(matches!(result, Err(LoggerError::DuplicateSink { .. })));
    }

    #[test]
    fn test_invalid_buffer_fails_build() {
        let result = Logger::builder().buffer(BufferConfig::new(0)).build();
        assert!(matches!(
            result,
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_level_gate_counts_filtered() {
        let (logger, mem) = memory_logger(Logger::builder().delivery_policy(DeliveryPolicy::all_sync()));

        logger.trace("t");
        logger.debug("d");
        logger.info("i");

        assert_eq!(mem.messages(), vec!["i"]);
        assert_eq!(logger.metrics().filtered(), 2);
        assert_eq!(logger.metrics().dispatched(), 1);

        logger.set_min_level(LogLevel::Trace);
        logger.trace("now visible");
        assert_eq!(mem.len(), 2);
    }

    #[test]
    fn test_bindings_priority() {
        let (logger, mem) = memory_logger(
            Logger::builder()
                .delivery_policy(DeliveryPolicy::all_sync())
                .bind("service", "api")
                .bind("region", "eu"),
        );

        let child = logger.child(LogContext::new().with_field("region", "us"));
        let _guard = child.with_context("request_id", "r-1");
        child.info_with_context(
            "hello",
            LogContext::new().with_field("service", "override"),
        );

        let records = mem.records();
        let record = &records[0];
        assert_eq!(record.field("service"), Some(&FieldValue::from("override")));
        assert_eq!(record.field("region"), Some(&FieldValue::from("us")));
        assert_eq!(record.field("request_id"), Some(&FieldValue::from("r-1")));
    }

    #[test]
    fn test_correlation_id_inherited() {
        let (logger, mem) = memory_logger(Logger::builder().delivery_policy(DeliveryPolicy::all_sync()));

        let scoped = logger.with_correlation_id("corr-1");
        scoped.info("inherited");
        scoped.info_builder().message("explicit").correlation_id("corr-2").log();
        logger.info("none");

        let ids: Vec<Option<String>> = mem
            .records()
            .iter()
            .map(|r| r.correlation_id().map(str::to_string))
            .collect();
        assert_eq!(
            ids,
            vec![Some("corr-1".to_string()), Some("corr-2".to_string()), None]
        );
    }

    #[test]
    fn test_pipeline_drop_is_counted() {
        let (logger, mem) = memory_logger(
            Logger::builder()
                .delivery_policy(DeliveryPolicy::all_sync())
                .plugin(Plugin::new("no-heartbeats", |ctx| {
                    ctx.add_step("filter", |draft| {
                        if draft.message == "heartbeat" {
                            StepOutcome::Drop
                        } else {
                            StepOutcome::Continue
                        }
                    });
                })),
        );

        logger.info("heartbeat");
        logger.info("real");

        assert_eq!(mem.messages(), vec!["real"]);
        assert_eq!(logger.metrics().dropped_by_pipeline(), 1);
    }

    #[test]
    fn test_custom_error_handler_receives_failures() {
        struct Failing;

        impl Sink for Failing {
            fn name(&self) -> &str {
                "failing"
            }

            fn write(&mut self, _record: &crate::core::LogRecord) -> Result<crate::core::WriteOutcome> {
                Err(LoggerError::writer("disk on fire"))
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let logger = Logger::builder()
            .sink(Failing)
            .on_sink_error(move |failure| seen_clone.lock().push(failure.sink.clone()))
            .build()
            .unwrap();

        logger.error("boom");

        assert_eq!(seen.lock().as_slice(), ["failing"]);
        assert_eq!(logger.metrics().sink_failures(), 1);
    }

    #[test]
    fn test_add_and_remove_sink_at_runtime() {
        let logger = Logger::builder()
            .delivery_policy(DeliveryPolicy::all_sync())
            .build()
            .unwrap();
        let sink = MemorySink::new();
        let mem = sink.handle();

        logger.add_sink_with(sink, SinkOptions::named("late")).unwrap();
        logger.info("one");
        logger.remove_sink("late").unwrap();
        logger.info("two");

        assert_eq!(mem.messages(), vec!["one"]);
        assert!(mem.is_closed());
    }

    #[test]
    fn test_close_is_idempotent_and_rejects_later_records() {
        let (logger, mem) = memory_logger(Logger::builder());

        logger.info("buffered");
        assert!(mem.is_empty());

        assert!(logger.close().is_empty());
        assert_eq!(mem.messages(), vec!["buffered"]);
        assert!(mem.is_closed());

        logger.error("too late");
        assert!(logger.close().is_empty());
        assert_eq!(mem.len(), 1);
        assert_eq!(logger.metrics().rejected_after_close(), 1);
        assert!(logger.add_sink(MemorySink::new()).is_err());
    }

    #[test]
    fn test_drop_of_last_handle_closes() {
        let sink = MemorySink::new();
        let mem = sink.handle();
        {
            let logger = Logger::builder().sink(sink).build().unwrap();
            let child = logger.child(LogContext::new());
            child.info("from child");
        }

        assert_eq!(mem.messages(), vec!["from child"]);
        assert!(mem.is_closed());
    }
}
