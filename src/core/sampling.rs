//! Probabilistic sampling of high-volume records
//!
//! Installed as a pipeline step through [`Plugin::sampling`]. Levels listed
//! in `always_sample` bypass the sampler; everything else is kept with the
//! configured probability, optionally overridden per category (the string
//! value of the record's `category` field).
//!
//! [`Plugin::sampling`]: crate::core::Plugin::sampling

use super::log_context::{FieldValue, Fields};
use super::log_level::LogLevel;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Field consulted for per-category rates
pub const CATEGORY_FIELD: &str = "category";

/// Sampling configuration
///
/// # Example
///
/// ```
/// use rust_log_dispatch::{LogLevel, SamplingConfig};
///
/// // Keep 10% of records, every warning and above, and all "billing" records
/// let config = SamplingConfig::new(0.1)
///     .with_always_sample(vec![LogLevel::Warn, LogLevel::Error, LogLevel::Fatal])
///     .with_category_rate("billing", 1.0);
/// assert_eq!(config.rate, 0.1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Probability of keeping a record, 0.0 - 1.0
    pub rate: f64,

    /// Levels that are never sampled out
    pub always_sample: Vec<LogLevel>,

    /// Rates overriding `rate` for records with a matching `category` field
    pub category_rates: HashMap<String, f64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            always_sample: vec![LogLevel::Error, LogLevel::Fatal],
            category_rates: HashMap::new(),
        }
    }
}

impl SamplingConfig {
    /// Sampling at `rate`, clamped to 0.0 - 1.0
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_always_sample(mut self, levels: Vec<LogLevel>) -> Self {
        self.always_sample = levels;
        self
    }

    #[must_use]
    pub fn with_category_rate(mut self, category: impl Into<String>, rate: f64) -> Self {
        self.category_rates
            .insert(category.into(), rate.clamp(0.0, 1.0));
        self
    }
}

/// Kept/dropped counters of one sampler
#[derive(Debug, Default)]
pub struct SamplerMetrics {
    sampled: AtomicU64,
    dropped: AtomicU64,
}

impl SamplerMetrics {
    #[inline]
    pub fn sampled_count(&self) -> u64 {
        self.sampled.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Share of records kept; 1.0 before anything was seen
    pub fn effective_sample_rate(&self) -> f64 {
        let sampled = self.sampled_count() as f64;
        let total = sampled + self.dropped_count() as f64;
        if total == 0.0 {
            1.0
        } else {
            sampled / total
        }
    }

    fn record(&self, kept: bool) -> bool {
        if kept {
            self.sampled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        kept
    }
}

/// Decides whether a record is kept
#[derive(Debug)]
pub struct LogSampler {
    config: SamplingConfig,
    metrics: SamplerMetrics,
}

impl LogSampler {
    pub fn new(config: SamplingConfig) -> Self {
        Self {
            config,
            metrics: SamplerMetrics::default(),
        }
    }

    /// `true` if a record at `level` in `category` should be kept
    pub fn should_sample(&self, level: LogLevel, category: Option<&str>) -> bool {
        if self.config.always_sample.contains(&level) {
            return self.metrics.record(true);
        }

        let rate = category
            .and_then(|c| self.config.category_rates.get(c).copied())
            .unwrap_or(self.config.rate);

        let kept = if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            rand::thread_rng().gen::<f64>() < rate
        };
        self.metrics.record(kept)
    }

    /// [`should_sample`](Self::should_sample) using the record's `category` field
    pub fn should_sample_fields(&self, level: LogLevel, fields: &Fields) -> bool {
        let category = match fields.get(CATEGORY_FIELD) {
            Some(FieldValue::String(s)) => Some(s.as_str()),
            _ => None,
        };
        self.should_sample(level, category)
    }

    pub fn metrics(&self) -> &SamplerMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_is_clamped() {
        assert_eq!(SamplingConfig::new(1.5).rate, 1.0);
        assert_eq!(SamplingConfig::new(-0.5).rate, 0.0);
    }

    #[test]
    fn test_always_sample_bypasses_zero_rate() {
        let sampler = LogSampler::new(SamplingConfig::new(0.0));

        assert!(sampler.should_sample(LogLevel::Error, None));
        assert!(sampler.should_sample(LogLevel::Fatal, None));
        for _ in 0..10 {
            assert!(!sampler.should_sample(LogLevel::Info, None));
        }
        assert_eq!(sampler.metrics().sampled_count(), 2);
        assert_eq!(sampler.metrics().dropped_count(), 10);
    }

    #[test]
    fn test_category_rate_from_fields() {
        let sampler = LogSampler::new(SamplingConfig::new(1.0).with_category_rate("noisy", 0.0));

        let mut fields = Fields::new();
        assert!(sampler.should_sample_fields(LogLevel::Info, &fields));

        fields.insert(CATEGORY_FIELD.to_string(), "noisy".into());
        for _ in 0..10 {
            assert!(!sampler.should_sample_fields(LogLevel::Info, &fields));
        }
    }

    #[test]
    fn test_statistical_rate() {
        let sampler = LogSampler::new(SamplingConfig::new(0.5));
        let total = 10_000;
        let kept = (0..total)
            .filter(|_| sampler.should_sample(LogLevel::Info, None))
            .count();

        let rate = kept as f64 / total as f64;
        assert!((0.45..=0.55).contains(&rate), "Expected ~50%, got {}", rate);
        assert!((sampler.metrics().effective_sample_rate() - rate).abs() < 1e-9);
    }

    #[test]
    fn test_config_from_json() {
        let config: SamplingConfig =
            serde_json::from_str(r#"{"rate": 0.25, "always_sample": ["warn"]}"#).unwrap();
        assert_eq!(config.rate, 0.25);
        assert_eq!(config.always_sample, vec![LogLevel::Warn]);
        assert!(config.category_rates.is_empty());
    }
}
