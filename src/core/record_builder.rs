//! Fluent construction of structured records
//!
//! Provides a builder pattern for logging a record with fields, an error
//! descriptor and a correlation id in one statement.

use super::log_context::{FieldValue, Fields, LogContext};
use super::log_level::LogLevel;
use super::log_record::{ErrorInfo, RecordDraft};
use super::logger::Logger;

/// Builder for one structured record
///
/// # Example
///
/// ```
/// use rust_log_dispatch::prelude::*;
///
/// let logger = Logger::builder().build().unwrap();
///
/// logger.info_builder()
///     .message("Request processed")
///     .field("user_id", 12345)
///     .field("latency_ms", 42.5)
///     .correlation_id("req-7f3a")
///     .log();
/// ```
#[must_use = "a record builder does nothing until `.log()` is called"]
pub struct RecordBuilder<'a> {
    logger: &'a Logger,
    level: LogLevel,
    message: String,
    fields: Fields,
    error: Option<ErrorInfo>,
    correlation_id: Option<String>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(logger: &'a Logger, level: LogLevel) -> Self {
        Self {
            logger,
            level,
            message: String::new(),
            fields: Fields::new(),
            error: None,
            correlation_id: None,
        }
    }

    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = msg.into();
        self
    }

    pub fn field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add every field of a [`LogContext`]
    pub fn fields(mut self, context: LogContext) -> Self {
        self.fields.extend(context.into_fields());
        self
    }

    /// Attach an error descriptor built from any error value
    pub fn error<E>(mut self, error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        self.error = Some(ErrorInfo::from_error(error));
        self
    }

    pub fn error_info(mut self, info: ErrorInfo) -> Self {
        self.error = Some(info);
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Build the record and hand it to the logger
    pub fn log(self) {
        let Self {
            logger,
            level,
            message,
            fields,
            error,
            correlation_id,
        } = self;

        logger.emit(level, move || {
            let mut draft = RecordDraft::new(level, message).with_fields(fields);
            draft.error = error;
            draft.correlation_id = correlation_id;
            draft
        });
    }
}

impl Logger {
    /// Start a structured record at `level`
    pub fn record(&self, level: LogLevel) -> RecordBuilder<'_> {
        RecordBuilder::new(self, level)
    }

    pub fn trace_builder(&self) -> RecordBuilder<'_> {
        self.record(LogLevel::Trace)
    }

    pub fn debug_builder(&self) -> RecordBuilder<'_> {
        self.record(LogLevel::Debug)
    }

    /// Create an info-level structured record builder
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_dispatch::Logger;
    ///
    /// let logger = Logger::builder().build().unwrap();
    /// logger.info_builder()
    ///     .message("User logged in")
    ///     .field("user_id", 42)
    ///     .log();
    /// ```
    pub fn info_builder(&self) -> RecordBuilder<'_> {
        self.record(LogLevel::Info)
    }

    pub fn warn_builder(&self) -> RecordBuilder<'_> {
        self.record(LogLevel::Warn)
    }

    /// Create an error-level structured record builder
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_dispatch::Logger;
    ///
    /// let logger = Logger::builder().build().unwrap();
    /// let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.json");
    ///
    /// logger.error_builder()
    ///     .message("Failed to load configuration")
    ///     .error(&err)
    ///     .log();
    /// ```
    pub fn error_builder(&self) -> RecordBuilder<'_> {
        self.record(LogLevel::Error)
    }

    pub fn fatal_builder(&self) -> RecordBuilder<'_> {
        self.record(LogLevel::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeliveryPolicy, SinkOptions};
    use crate::sinks::MemorySink;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "request failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_builder_produces_full_record() {
        let sink = MemorySink::new();
        let handle = sink.handle();
        let logger = Logger::builder()
            .delivery_policy(DeliveryPolicy::all_sync())
            .sink_with(sink, SinkOptions::named("mem"))
            .build()
            .unwrap();

        let err = Outer(std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream"));
        logger
            .warn_builder()
            .message("slow request")
            .field("latency_ms", 1500)
            .fields(LogContext::new().with_field("route", "/orders"))
            .error(&err)
            .correlation_id("abc-123")
            .log();

        let records = handle.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level(), LogLevel::Warn);
        assert_eq!(record.message(), "slow request");
        assert_eq!(record.field("latency_ms"), Some(&FieldValue::Int(1500)));
        assert_eq!(
            record.field("route"),
            Some(&FieldValue::String("/orders".to_string()))
        );
        assert_eq!(record.correlation_id(), Some("abc-123"));

        let error = record.error().unwrap();
        assert_eq!(error.message, "request failed");
        assert!(error.stack.as_deref().unwrap().contains("upstream"));
    }

    #[test]
    fn test_builder_respects_level_gate() {
        let sink = MemorySink::new();
        let handle = sink.handle();
        let logger = Logger::builder()
            .min_level(LogLevel::Warn)
            .delivery_policy(DeliveryPolicy::all_sync())
            .sink(sink)
            .build()
            .unwrap();

        logger.debug_builder().message("hidden").field("k", 1).log();

        assert!(handle.is_empty());
        assert_eq!(logger.metrics().filtered(), 1);
    }
}
