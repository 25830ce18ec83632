//! Core types: records, levels, the logger, the dispatch engine and the
//! sink contract

#[cfg(feature = "async-sinks")]
pub mod async_sink;
pub mod buffer;
pub mod config;
pub mod delivery_policy;
pub(crate) mod dispatch;
pub mod error;
pub mod error_channel;
pub mod log_context;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub mod output_format;
pub mod pipeline;
pub mod record_builder;
pub mod redact;
pub mod sampling;
pub mod sink;
pub mod timestamp;

#[cfg(feature = "async-sinks")]
pub use async_sink::AsyncSink;
pub use buffer::BufferConfig;
pub use config::{parse_duration, parse_size, DurationValue, LoggerConfig, SizeValue};
pub use delivery_policy::{DeliveryMode, DeliveryPolicy};
pub use dispatch::DEFAULT_SHUTDOWN_TIMEOUT;
pub use error::{LoggerError, Result};
pub use error_channel::{ErrorHandler, ErrorReporter, SinkFailure};
pub use log_context::{ContextGuard, FieldValue, Fields, LogContext, LoggerContext};
pub use log_level::LogLevel;
pub use log_record::{ErrorInfo, LogRecord, RecordDraft};
pub use logger::{Logger, LoggerBuilder};
pub use metrics::LoggerMetrics;
pub use output_format::{OutputFormat, RecordFormatter};
pub use pipeline::{PipelineContext, PipelineStep, Plugin, StepOutcome};
pub use record_builder::RecordBuilder;
pub use redact::{redact, REDACTED};
pub use sampling::{LogSampler, SamplerMetrics, SamplingConfig};
pub use sink::{Environment, PendingWrite, Sink, SinkOptions, WriteCompleter, WriteOutcome};
pub use timestamp::TimestampFormat;
