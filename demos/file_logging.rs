//! File logging example
//!
//! Demonstrates logging to the console and a rotating file simultaneously,
//! with size-based rotation, gzip compression and retention.
//!
//! Run with: cargo run --example file_logging

use rust_log_dispatch::prelude::*;
use rust_log_dispatch::sinks::FileSinkConfig;

fn main() -> Result<()> {
    println!("=== Rust Log Dispatch - File Logging Example ===\n");

    let config: FileSinkConfig = serde_json::from_str(
        r#"{
            "path": "logs/application.log",
            "max_size": "4kb",
            "max_files": 3,
            "compress": true,
            "format": { "format": "json" }
        }"#,
    )?;
    let file = RotatingFileSink::from_config(&config)?;

    let logger = Logger::builder()
        .min_level(LogLevel::Debug)
        .sink(ConsoleSink::new())
        .sink(file)
        .build()?;

    println!("1. Logging to both console and file:");
    logger.info("Application started");
    logger.debug("Loading configuration...");
    logger.info("Configuration loaded successfully");
    logger.warn("Using default settings for some options");
    logger.error("Failed to load optional plugin");

    println!("\n2. Writing enough records to rotate:");
    for i in 1..=100 {
        logger
            .info_builder()
            .message(format!("Processing item {}/100", i))
            .field("item", i)
            .log();
    }

    logger.info("All operations completed");
    logger.flush()?;
    let failures = logger.close();

    println!("\n=== Example completed ({} sink failures) ===", failures.len());
    println!("Check 'logs/' for the live file and up to 3 compressed generations");

    Ok(())
}
