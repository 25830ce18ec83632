//! Basic logger usage example
//!
//! Demonstrates the level gate, buffered versus synchronous delivery and
//! structured fields with the console sink.
//!
//! Run with: cargo run --example basic_usage

use rust_log_dispatch::prelude::*;
use rust_log_dispatch::{info, warn};

fn main() -> Result<()> {
    println!("=== Rust Log Dispatch - Basic Usage Example ===\n");

    let logger = Logger::builder()
        .min_level(LogLevel::Trace)
        .buffer(BufferConfig::new(3))
        .sink(ConsoleSink::new())
        .on_sink_error(|failure| eprintln!("sink {} failed: {}", failure.sink, failure.error))
        .build()?;

    println!("1. Logging at different levels:");
    logger.trace("This is a trace message");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message (written immediately)");
    logger.fatal("This is a fatal message");
    logger.flush()?;

    println!("\n2. Raising the minimum level to INFO:");
    logger.set_min_level(LogLevel::Info);
    logger.trace("Trace message (hidden)");
    logger.debug("Debug message (hidden)");
    logger.info("Info message (visible)");
    warn!(logger, "Warning number {} (visible)", 2);
    logger.flush()?;

    println!("\n3. Structured fields and bound context:");
    let request = logger.with_correlation_id("req-42");
    info!(request, { "user_id" => 7, "action" => "login" }, "User {} signed in", "alice");
    {
        let _guard = request.with_context("region", "eu-west");
        request.info("Scoped field attached");
    }
    request.info("Scoped field removed");

    let failures = logger.close();
    println!("\n=== Example completed ({} sink failures) ===", failures.len());

    Ok(())
}
