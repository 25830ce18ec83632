//! # Rust Log Dispatch
//!
//! A structured-logging engine that routes records to multiple sinks with
//! per-severity delivery policies.
//!
//! ## Features
//!
//! - **Level gate**: records below the minimum level cost one comparison
//! - **Per-level delivery**: error and fatal are written synchronously,
//!   everything else is buffered and drained at capacity or on a timer
//! - **Failure isolation**: a failing or panicking sink never stops the
//!   others, and every failure reaches the error-notification channel
//! - **Sinks**: console, rotating file (size/time, gzip, retention),
//!   batched HTTP with capped exponential backoff, in-memory
//! - **Pipeline**: plugins for redaction, sampling and enrichment
//!
//! ## Example
//!
//! ```
//! use rust_log_dispatch::prelude::*;
//!
//! let memory = MemorySink::new();
//! let records = memory.handle();
//!
//! let logger = Logger::builder()
//!     .min_level(LogLevel::Info)
//!     .buffer(BufferConfig::new(3))
//!     .sink(memory)
//!     .build()
//!     .unwrap();
//!
//! logger.debug("x");
//! logger.info("a");
//! logger.info("b");
//! logger.info("c");
//! assert_eq!(records.messages(), ["a", "b", "c"]);
//!
//! logger.error("boom");
//! assert_eq!(records.messages().last().map(String::as_str), Some("boom"));
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        BufferConfig, ContextGuard, DeliveryMode, DeliveryPolicy, ErrorInfo, FieldValue,
        LogContext, LogLevel, LogRecord, Logger, LoggerBuilder, LoggerConfig, LoggerContext,
        LoggerError, LoggerMetrics, OutputFormat, Plugin, RecordDraft, Result, SamplingConfig,
        Sink, SinkFailure, SinkOptions, StepOutcome, TimestampFormat, WriteOutcome,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{ConsoleSink, MemorySink, RotatingFileSink, RotationPolicy};
}

pub use crate::core::{
    parse_duration, parse_size, BufferConfig, ContextGuard, DeliveryMode, DeliveryPolicy,
    Environment, ErrorInfo, FieldValue, Fields, LogContext, LogLevel, LogRecord, LogSampler,
    Logger, LoggerBuilder, LoggerConfig, LoggerContext, LoggerError, LoggerMetrics, OutputFormat,
    Plugin, RecordDraft, RecordFormatter, Result, SamplerMetrics, SamplingConfig, Sink,
    SinkFailure, SinkOptions, StepOutcome, TimestampFormat, WriteOutcome,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::sinks::{ConsoleSink, HttpSink, MemorySink, RotatingFileSink};
