//! Stress tests for concurrent dispatch
//!
//! These tests verify:
//! - Per-sink ordering holds while many threads log through shared handles
//! - Capacity drains and timer drains racing never lose or reorder records
//! - Closing while other threads are logging neither panics nor deadlocks

use rust_log_dispatch::prelude::*;
use rust_log_dispatch::sinks::MemorySinkHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;
const PER_THREAD: usize = 500;

fn memory_logger(buffer: BufferConfig) -> (Logger, MemorySinkHandle) {
    let memory = MemorySink::new();
    let handle = memory.handle();
    let logger = Logger::builder()
        .min_level(LogLevel::Trace)
        .buffer(buffer)
        .sink(memory)
        .build()
        .expect("Failed to build logger");
    (logger, handle)
}

/// Messages are `"<thread>:<seq>"`; each thread's sequence must arrive in order
fn assert_per_thread_order(messages: &[String]) {
    let mut last_seen: HashMap<usize, usize> = HashMap::new();
    for message in messages {
        let (thread_id, seq) = message.split_once(':').expect("tagged message");
        let thread_id: usize = thread_id.parse().unwrap();
        let seq: usize = seq.parse().unwrap();
        if let Some(previous) = last_seen.insert(thread_id, seq) {
            assert!(
                seq > previous,
                "thread {} delivered {} after {}",
                thread_id,
                seq,
                previous
            );
        }
    }
}

fn spawn_loggers(logger: &Logger, level: LogLevel) -> Vec<thread::JoinHandle<()>> {
    (0..THREADS)
        .map(|t| {
            let logger = logger.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    logger.log(level, format!("{}:{}", t, i));
                }
            })
        })
        .collect()
}

#[test]
fn test_concurrent_buffered_logging_preserves_order() {
    let (logger, records) =
        memory_logger(BufferConfig::new(64).with_flush_interval(Duration::from_millis(1)));

    for handle in spawn_loggers(&logger, LogLevel::Info) {
        handle.join().expect("logging thread panicked");
    }
    logger.flush().expect("Failed to flush");

    let messages = records.messages();
    assert_eq!(messages.len(), THREADS * PER_THREAD);
    assert_per_thread_order(&messages);
    assert_eq!(logger.metrics().dispatched(), (THREADS * PER_THREAD) as u64);
}

#[test]
fn test_concurrent_sync_logging_preserves_order() {
    let (logger, records) = memory_logger(BufferConfig::default());

    for handle in spawn_loggers(&logger, LogLevel::Error) {
        handle.join().expect("logging thread panicked");
    }

    let messages = records.messages();
    assert_eq!(messages.len(), THREADS * PER_THREAD);
    assert_per_thread_order(&messages);
    assert_eq!(logger.buffered_len(), 0);
}

#[test]
fn test_mixed_levels_each_level_in_order() {
    let (logger, records) = memory_logger(BufferConfig::new(16).without_timer());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = logger.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    // odd threads log synchronously, even threads are buffered
                    let level = if t % 2 == 0 { LogLevel::Info } else { LogLevel::Error };
                    logger.log(level, format!("{}:{}", t, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("logging thread panicked");
    }
    logger.flush().expect("Failed to flush");

    let messages = records.messages();
    assert_eq!(messages.len(), THREADS * PER_THREAD);
    assert_per_thread_order(&messages);
}

#[test]
fn test_close_while_logging() {
    let (logger, records) =
        memory_logger(BufferConfig::new(32).with_flush_interval(Duration::from_millis(1)));
    let stop = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = logger.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut i = 0;
                while !stop.load(Ordering::Relaxed) {
                    logger.info(format!("{}:{}", t, i));
                    i += 1;
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    let failures = logger.close();
    stop.store(true, Ordering::Relaxed);
    for handle in handles {
        handle.join().expect("logging thread panicked");
    }

    assert!(failures.is_empty());
    assert!(records.is_closed());

    let metrics = logger.metrics();
    let delivered = records.len() as u64;
    assert_eq!(delivered, metrics.dispatched());
    assert!(metrics.rejected_after_close() > 0);
    assert_per_thread_order(&records.messages());
}
