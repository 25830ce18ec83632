//! HTTP batching example
//!
//! Demonstrates batched delivery with retries. A stand-in transport prints
//! each batch and fails every third request so the retry path is visible.
//!
//! Run with: cargo run --example http_batching

use rust_log_dispatch::prelude::*;
use rust_log_dispatch::sinks::{Backoff, HttpRequest, HttpSink, HttpSinkConfig, Transport};
use rust_log_dispatch::LoggerError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct PrintingTransport {
    requests: AtomicUsize,
}

impl Transport for PrintingTransport {
    fn send(&self, request: &HttpRequest) -> Result<()> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if n % 3 == 0 {
            println!("   request #{} -> 503", n);
            return Err(LoggerError::http_status(&request.url, 503));
        }
        let batch: Vec<serde_json::Value> = serde_json::from_slice(&request.body)?;
        println!(
            "   request #{} {} {} -> 200 ({} records)",
            n,
            request.method.as_str(),
            request.url,
            batch.len()
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    println!("=== Rust Log Dispatch - HTTP Batching Example ===\n");

    let config = HttpSinkConfig::new("https://logs.example.com/ingest")
        .with_header("Authorization", "Bearer demo-token")
        .with_batch_size(10)
        .with_interval(Duration::from_millis(200))
        .with_retry_count(2)
        .with_backoff(Backoff::new(
            Duration::from_millis(20),
            Duration::from_millis(100),
        ));
    let sink = HttpSink::with_transport(
        config,
        PrintingTransport {
            requests: AtomicUsize::new(0),
        },
    )?;
    let metrics = sink.metrics();

    let logger = Logger::builder()
        .sink(sink)
        .on_sink_error(|failure| eprintln!("   delivery failed: {}", failure.error))
        .build()?;

    println!("1. Logging 35 records in batches of 10:");
    for i in 0..35 {
        logger
            .info_builder()
            .message("order placed")
            .field("order_id", i)
            .log();
    }
    logger.flush()?;
    std::thread::sleep(Duration::from_millis(300));

    println!("\n2. Closing sends the remainder:");
    let failures = logger.close();

    println!(
        "\n=== Example completed: {} batches, {} records sent, {} failures ===",
        metrics.batches_sent(),
        metrics.records_sent(),
        failures.len()
    );

    Ok(())
}
