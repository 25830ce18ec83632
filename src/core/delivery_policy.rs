//! Per-level delivery policy
//!
//! Decides, for each severity, whether a record is written to sinks while
//! the caller waits or handed to the buffering subsystem.

use super::log_level::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How records of one severity reach the sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Written before the log call returns
    Synchronous,
    /// Queued and written on the next buffer drain
    Buffered,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Synchronous => write!(f, "synchronous"),
            DeliveryMode::Buffered => write!(f, "buffered"),
        }
    }
}

/// Severity to delivery-mode mapping
///
/// `error` and `fatal` are synchronous by default, everything else is
/// buffered.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::{DeliveryMode, DeliveryPolicy, LogLevel};
///
/// let policy = DeliveryPolicy::default().with(LogLevel::Warn, DeliveryMode::Synchronous);
///
/// assert!(policy.is_sync(LogLevel::Warn));
/// assert!(policy.is_sync(LogLevel::Fatal));
/// assert!(!policy.is_sync(LogLevel::Info));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    modes: [DeliveryMode; 6],
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        let mut modes = [DeliveryMode::Buffered; 6];
        modes[LogLevel::Error.index()] = DeliveryMode::Synchronous;
        modes[LogLevel::Fatal.index()] = DeliveryMode::Synchronous;
        Self { modes }
    }
}

impl DeliveryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level synchronous
    pub fn all_sync() -> Self {
        Self {
            modes: [DeliveryMode::Synchronous; 6],
        }
    }

    /// Every level buffered
    pub fn all_buffered() -> Self {
        Self {
            modes: [DeliveryMode::Buffered; 6],
        }
    }

    /// Overlay a `level -> sync?` map on the defaults
    pub fn from_sync_map(map: &HashMap<LogLevel, bool>) -> Self {
        map.iter().fold(Self::default(), |policy, (level, sync)| {
            policy.with(*level, Self::mode_for(*sync))
        })
    }

    #[must_use = "builder methods return a new value"]
    pub fn with(mut self, level: LogLevel, mode: DeliveryMode) -> Self {
        self.modes[level.index()] = mode;
        self
    }

    pub fn set(&mut self, level: LogLevel, mode: DeliveryMode) {
        self.modes[level.index()] = mode;
    }

    #[inline]
    pub fn mode(&self, level: LogLevel) -> DeliveryMode {
        self.modes[level.index()]
    }

    #[inline]
    pub fn is_sync(&self, level: LogLevel) -> bool {
        self.mode(level) == DeliveryMode::Synchronous
    }

    fn mode_for(sync: bool) -> DeliveryMode {
        if sync {
            DeliveryMode::Synchronous
        } else {
            DeliveryMode::Buffered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = DeliveryPolicy::default();
        assert!(policy.is_sync(LogLevel::Error));
        assert!(policy.is_sync(LogLevel::Fatal));
        for level in [LogLevel::Trace, LogLevel::Debug, LogLevel::Info, LogLevel::Warn] {
            assert_eq!(policy.mode(level), DeliveryMode::Buffered);
        }
    }

    #[test]
    fn test_sync_map_overlays_defaults() {
        let mut map = HashMap::new();
        map.insert(LogLevel::Info, true);
        map.insert(LogLevel::Error, false);

        let policy = DeliveryPolicy::from_sync_map(&map);
        assert!(policy.is_sync(LogLevel::Info));
        assert!(!policy.is_sync(LogLevel::Error));
        assert!(policy.is_sync(LogLevel::Fatal));
        assert!(!policy.is_sync(LogLevel::Debug));
    }

    #[test]
    fn test_delivery_mode_display() {
        assert_eq!(DeliveryMode::Synchronous.to_string(), "synchronous");
        assert_eq!(DeliveryMode::Buffered.to_string(), "buffered");
    }
}
