//! Async sink trait for destinations with native async I/O

use super::error::Result;
use super::log_record::LogRecord;
use async_trait::async_trait;

/// Asynchronous counterpart of [`Sink`](super::Sink)
///
/// Register one through [`AsyncSinkBridge`](crate::sinks::AsyncSinkBridge),
/// which runs it on a tokio runtime and hands its writes to the dispatch
/// engine as pending results.
///
/// # Example
///
/// ```no_run
/// use rust_log_dispatch::core::{AsyncSink, LogRecord, Result};
/// use async_trait::async_trait;
///
/// struct QueueSink;
///
/// #[async_trait]
/// impl AsyncSink for QueueSink {
///     fn name(&self) -> &str {
///         "queue"
///     }
///
///     async fn write(&mut self, record: &LogRecord) -> Result<()> {
///         // publish asynchronously
///         let _ = record.message();
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncSink: Send + 'static {
    fn name(&self) -> &str;

    async fn write(&mut self, record: &LogRecord) -> Result<()>;

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release resources, flushing first
    async fn close(&mut self) -> Result<()> {
        self.flush().await
    }
}
