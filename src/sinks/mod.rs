//! Built-in sinks

#[cfg(feature = "async-sinks")]
pub mod async_bridge;
pub mod console;
pub mod http;
pub mod memory;
pub mod rotating_file;

#[cfg(feature = "async-sinks")]
pub use async_bridge::AsyncSinkBridge;
pub use console::ConsoleSink;
pub use http::{
    Backoff, BatchMetrics, HttpMethod, HttpRequest, HttpSink, HttpSinkConfig, ReqwestTransport,
    Transport,
};
pub use memory::{MemorySink, MemorySinkHandle};
pub use rotating_file::{
    FileSinkConfig, FileSinkState, RotatingFileSink, RotationPolicy, RotationStrategy,
};
