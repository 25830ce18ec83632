//! Log record structure
//!
//! A [`LogRecord`] is assembled once per accepted log call and is immutable
//! afterwards. Pipeline steps work on a [`RecordDraft`] which is frozen into
//! a record right before dispatch.

use super::log_context::{FieldValue, Fields};
use super::log_level::LogLevel;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::sync::atomic::{AtomicI64, Ordering};

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn get_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn get_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

static LAST_TIMESTAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Wall-clock milliseconds, clamped so successive calls never go backwards.
fn monotonic_now_ms() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_TIMESTAMP_MS.fetch_max(now, Ordering::AcqRel);
    previous.max(now)
}

fn timestamp_from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

/// Replace newlines, carriage returns and tabs with escape sequences so a
/// message can never forge additional log lines.
fn sanitize_message(message: &str) -> String {
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Error descriptor attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Describe an error value; the stack text is its `source()` chain.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let kind = std::any::type_name::<E>()
            .rsplit("::")
            .next()
            .unwrap_or("Error")
            .to_string();

        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            kind,
            message: error.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("kind".into(), self.kind.clone().into());
        obj.insert("message".into(), self.message.clone().into());
        if let Some(ref stack) = self.stack {
            obj.insert("stack".into(), stack.clone().into());
        }
        serde_json::Value::Object(obj)
    }
}

/// Immutable log record handed to every sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    level: LogLevel,
    timestamp: DateTime<Utc>,
    message: String,
    fields: Fields,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_name: Option<String>,
}

impl LogRecord {
    /// Build a record with no structured fields
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        RecordDraft::new(level, message).into_record()
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.level
    }

    #[inline]
    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Thread name if known, thread id otherwise
    pub fn thread_label(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }

    /// Flat JSON object: structured fields first, then the reserved keys
    /// (`timestamp`, `level`, `message`, ...) which win on collision.
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut obj: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json_value()))
            .collect();

        obj.insert("timestamp".into(), self.timestamp_millis().into());
        obj.insert("level".into(), self.level.as_name().into());
        obj.insert("message".into(), self.message.clone().into());
        if let Some(ref id) = self.correlation_id {
            obj.insert("correlation_id".into(), id.clone().into());
        }
        if let Some(ref error) = self.error {
            obj.insert("error".into(), error.to_json_value());
        }
        serde_json::Value::Object(obj)
    }
}

/// Mutable record under construction
///
/// Level and timestamp are fixed when the draft is created; pipeline steps
/// may change everything else before the draft is frozen.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    level: LogLevel,
    timestamp_ms: i64,
    pub message: String,
    pub fields: Fields,
    pub error: Option<ErrorInfo>,
    pub correlation_id: Option<String>,
}

impl RecordDraft {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp_ms: monotonic_now_ms(),
            message: message.into(),
            fields: Fields::new(),
            error: None,
            correlation_id: None,
        }
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_ms
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields.extend(fields);
        self
    }

    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Freeze into an immutable record
    pub fn into_record(self) -> LogRecord {
        LogRecord {
            level: self.level,
            timestamp: timestamp_from_ms(self.timestamp_ms),
            message: sanitize_message(&self.message),
            fields: self.fields,
            error: self.error,
            correlation_id: self.correlation_id,
            thread_id: get_thread_id(),
            thread_name: get_thread_name(),
        }
    }
}
