//! Line formats for rendered records
//!
//! - Text: human-readable (default)
//! - Json: one JSON object per line
//! - Logfmt: `key=value` pairs, compatible with log aggregation tools

use super::log_context::{format_fields, FieldValue};
use super::log_record::LogRecord;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};

/// Output format for rendered records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `[2025-01-08T10:30:45.123Z] [INFO ] main - Request processed user_id=7`
    #[default]
    Text,

    /// `{"timestamp":"2025-01-08T10:30:45.123Z","level":"info","message":"Request processed"}`
    Json,

    /// `timestamp=2025-01-08T10:30:45.123Z level=info message="Request processed"`
    Logfmt,
}

/// Renders records as single lines
///
/// # Example
///
/// ```
/// use rust_log_dispatch::core::{LogLevel, LogRecord, OutputFormat, RecordFormatter};
///
/// let formatter = RecordFormatter::new(OutputFormat::Logfmt);
/// let line = formatter.format(&LogRecord::new(LogLevel::Warn, "disk low"));
/// assert!(line.contains("level=warn"));
/// assert!(line.contains("message=\"disk low\""));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFormatter {
    pub format: OutputFormat,
    pub timestamp: TimestampFormat,
    /// Include the thread name (or id) in text and logfmt output
    pub include_thread: bool,
}

impl RecordFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, timestamp: TimestampFormat) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_thread(mut self, include: bool) -> Self {
        self.include_thread = include;
        self
    }

    /// Render without a trailing newline
    pub fn format(&self, record: &LogRecord) -> String {
        match self.format {
            OutputFormat::Text => self.format_text(record),
            OutputFormat::Json => self.format_json(record),
            OutputFormat::Logfmt => self.format_logfmt(record),
        }
    }

    fn format_text(&self, record: &LogRecord) -> String {
        let mut line = format!(
            "[{}] [{:5}]",
            self.timestamp.format(record.timestamp()),
            record.level().to_str()
        );
        if self.include_thread {
            line.push(' ');
            line.push_str(record.thread_label());
            line.push_str(" -");
        }
        line.push(' ');
        line.push_str(record.message());

        if !record.fields().is_empty() {
            line.push(' ');
            line.push_str(&format_fields(record.fields()));
        }
        if let Some(id) = record.correlation_id() {
            line.push_str(&format!(" correlation_id={}", id));
        }
        if let Some(error) = record.error() {
            line.push_str(&format!(" error={}: {}", error.kind, error.message));
        }
        line
    }

    fn format_json(&self, record: &LogRecord) -> String {
        let mut value = record.to_json_value();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                self.timestamp.to_json_value(record.timestamp()),
            );
            if self.include_thread {
                obj.insert("thread".to_string(), record.thread_label().into());
            }
        }
        value.to_string()
    }

    fn format_logfmt(&self, record: &LogRecord) -> String {
        let mut parts = vec![
            format!(
                "timestamp={}",
                escape_value(&self.timestamp.format(record.timestamp()))
            ),
            format!("level={}", record.level().as_name()),
            format!("message={}", quote(record.message())),
        ];
        if self.include_thread {
            parts.push(format!("thread={}", escape_value(record.thread_label())));
        }
        if let Some(id) = record.correlation_id() {
            parts.push(format!("correlation_id={}", escape_value(id)));
        }
        if let Some(error) = record.error() {
            parts.push(format!("error_kind={}", escape_value(&error.kind)));
            parts.push(format!("error_message={}", quote(&error.message)));
        }

        let mut keys: Vec<&String> = record.fields().keys().collect();
        keys.sort();
        for key in keys {
            let rendered = match &record.fields()[key] {
                FieldValue::String(s) => quote(s),
                other @ (FieldValue::Array(_) | FieldValue::Map(_)) => quote(&other.to_string()),
                other => other.to_string(),
            };
            parts.push(format!("{}={}", escape_key(key), rendered));
        }

        parts.join(" ")
    }
}

fn escape_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

fn escape_value(value: &str) -> String {
    if value.contains(' ') || value.contains('"') || value.contains('=') {
        quote(value)
    } else {
        value.to_string()
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
