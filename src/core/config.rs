//! Configuration values and human-readable size/duration parsing
//!
//! Every config struct deserializes from JSON with serde; fields left out
//! take their defaults. Sizes and intervals accept either a bare number or
//! a string with a unit (`"10MB"`, `"1d"`).

use super::buffer::BufferConfig;
use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::sampling::SamplingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Split `"10 MB"` into `(10.0, "mb")`
fn split_number(input: &str) -> Option<(f64, String)> {
    let trimmed = input.trim();
    let unit_start = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(unit_start);
    if number.is_empty() {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    Some((value, unit.trim().to_ascii_lowercase()))
}

/// Parse a byte size such as `"512"`, `"64kb"`, `"10MB"` or `"1.5 GB"`
///
/// Units are 1024-based and case-insensitive; a bare number is bytes.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::core::parse_size;
///
/// assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
/// assert_eq!(parse_size("512").unwrap(), 512);
/// assert!(parse_size("ten megabytes").is_err());
/// ```
pub fn parse_size(input: &str) -> Result<u64> {
    let invalid = || LoggerError::config("size", format!("invalid size '{}'", input));
    let (value, unit) = split_number(input).ok_or_else(invalid)?;

    let multiplier: u64 = match unit.as_str() {
        "" | "b" => 1,
        "kb" | "k" => 1024,
        "mb" | "m" => 1024 * 1024,
        "gb" | "g" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };
    Ok((value * multiplier as f64) as u64)
}

/// Parse a duration such as `"250ms"`, `"30s"`, `"5m"`, `"12h"`, `"1d"` or `"2w"`
///
/// A bare number is milliseconds.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::core::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
/// assert_eq!(parse_duration("1500").unwrap(), Duration::from_millis(1500));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || LoggerError::config("duration", format!("invalid duration '{}'", input));
    let (value, unit) = split_number(input).ok_or_else(invalid)?;

    let millis_per_unit: f64 = match unit.as_str() {
        "" | "ms" => 1.0,
        "s" => 1_000.0,
        "m" => 60_000.0,
        "h" => 3_600_000.0,
        "d" => 86_400_000.0,
        "w" => 604_800_000.0,
        _ => return Err(invalid()),
    };
    Ok(Duration::from_millis((value * millis_per_unit) as u64))
}

/// Byte size given as a number of bytes or a string with a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    pub fn to_bytes(&self) -> Result<u64> {
        match self {
            SizeValue::Bytes(bytes) => Ok(*bytes),
            SizeValue::Text(text) => parse_size(text),
        }
    }
}

impl From<u64> for SizeValue {
    fn from(bytes: u64) -> Self {
        SizeValue::Bytes(bytes)
    }
}

impl From<&str> for SizeValue {
    fn from(text: &str) -> Self {
        SizeValue::Text(text.to_string())
    }
}

/// Duration given as milliseconds or a string with a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Millis(u64),
    Text(String),
}

impl DurationValue {
    pub fn to_duration(&self) -> Result<Duration> {
        match self {
            DurationValue::Millis(ms) => Ok(Duration::from_millis(*ms)),
            DurationValue::Text(text) => parse_duration(text),
        }
    }
}

impl From<Duration> for DurationValue {
    fn from(duration: Duration) -> Self {
        DurationValue::Millis(duration.as_millis() as u64)
    }
}

impl From<&str> for DurationValue {
    fn from(text: &str) -> Self {
        DurationValue::Text(text.to_string())
    }
}

/// Logger-level configuration
///
/// # Example
///
/// ```
/// use rust_log_dispatch::core::LoggerConfig;
/// use rust_log_dispatch::{Logger, LogLevel};
///
/// let config = LoggerConfig::from_json(r#"{
///     "level": "debug",
///     "sync": { "warn": true },
///     "buffer": { "size": 50, "flush_interval_ms": 500 },
///     "redact": ["password"]
/// }"#).unwrap();
///
/// assert_eq!(config.level, LogLevel::Debug);
/// let logger = Logger::builder().config(&config).build().unwrap();
/// assert!(logger.delivery_policy().is_sync(LogLevel::Warn));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum level passed by the level gate
    pub level: LogLevel,
    /// Per-level synchronous flags, overlaid on the default policy
    pub sync: HashMap<LogLevel, bool>,
    pub buffer: BufferConfig,
    pub sampling: Option<SamplingConfig>,
    /// Field paths masked in every record
    pub redact: Vec<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            sync: HashMap::new(),
            buffer: BufferConfig::default(),
            sampling: None,
            redact: Vec::new(),
        }
    }
}

impl LoggerConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            LoggerError::config("logger", format!("invalid configuration document: {}", e))
        })?;
        config.buffer.validate()?;
        Ok(config)
    }
}
