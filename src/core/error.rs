//! Error types for the logging engine

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// A sink with the same name is already registered
    #[error("Sink '{name}' is already registered")]
    DuplicateSink { name: String },

    /// No sink with this name is registered
    #[error("No sink named '{name}' is registered")]
    UnknownSink { name: String },

    /// Write, flush or close on a sink that has already been closed
    #[error("Sink '{name}' is closed")]
    SinkClosed { name: String },

    /// A sink panicked while handling a record
    #[error("Sink panicked: {0}")]
    SinkPanicked(String),

    /// File sink error with path
    #[error("File sink error for '{path}': {message}")]
    FileSinkError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Endpoint answered with a non-success status
    #[error("HTTP endpoint '{url}' returned status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Request could not be sent at all
    #[error("Transport error: {0}")]
    Transport(String),

    /// Batch could not be delivered after all attempts
    #[error("Delivery of {records} records failed after {attempts} attempts: {last_error}")]
    DeliveryFailed {
        records: usize,
        attempts: u32,
        last_error: Box<LoggerError>,
    },

    /// Pending write did not complete in time
    #[error("Timed out waiting for pending write to complete")]
    PendingTimeout,

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn duplicate_sink(name: impl Into<String>) -> Self {
        LoggerError::DuplicateSink { name: name.into() }
    }

    pub fn unknown_sink(name: impl Into<String>) -> Self {
        LoggerError::UnknownSink { name: name.into() }
    }

    pub fn sink_closed(name: impl Into<String>) -> Self {
        LoggerError::SinkClosed { name: name.into() }
    }

    /// Create a file sink error
    pub fn file_sink(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileSinkError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        LoggerError::HttpStatus {
            url: url.into(),
            status,
        }
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        LoggerError::Transport(msg.into())
    }

    pub fn delivery_failed(records: usize, attempts: u32, last_error: LoggerError) -> Self {
        LoggerError::DeliveryFailed {
            records,
            attempts,
            last_error: Box::new(last_error),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Whether the failure is transient and handled by the sink's own
    /// retry or rotation logic.
    ///
    /// Configuration errors and writes to closed sinks are permanent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            LoggerError::InvalidConfiguration { .. }
                | LoggerError::DuplicateSink { .. }
                | LoggerError::UnknownSink { .. }
                | LoggerError::SinkClosed { .. }
        )
    }
}
