//! Desk configuration
//!
//! Every field has a default, so a TOML file only needs to name what it
//! overrides:
//!
//! ```toml
//! fault_rate = 0.0
//! rng_seed = 7
//!
//! [engine]
//! ko_probability = 0.5
//! ```

use crate::error::AuditError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Inclusive delay range in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    #[inline]
    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Range that always yields `ms`
    #[inline]
    #[must_use]
    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    /// No delay at all
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::fixed(0)
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    /// Upper bound as a duration
    #[must_use]
    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    fn validate(&self, name: &str) -> Result<(), AuditError> {
        if self.min_ms > self.max_ms {
            return Err(AuditError::Config(format!(
                "{name}: min_ms ({}) exceeds max_ms ({})",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

/// Per-operation latency overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationLatency {
    pub list_audits: Option<DelayRange>,
    pub get_audit: Option<DelayRange>,
    pub list_templates: Option<DelayRange>,
    pub create_audit: Option<DelayRange>,
    pub run_audit: Option<DelayRange>,
    pub update_check: Option<DelayRange>,
}

impl Default for OperationLatency {
    fn default() -> Self {
        Self {
            list_audits: None,
            get_audit: None,
            list_templates: None,
            create_audit: None,
            run_audit: Some(DelayRange::fixed(400)),
            update_check: Some(DelayRange::fixed(300)),
        }
    }
}

impl OperationLatency {
    /// Every operation overridden to no delay
    #[must_use]
    pub fn zero() -> Self {
        let zero = Some(DelayRange::zero());
        Self {
            list_audits: zero,
            get_audit: zero,
            list_templates: zero,
            create_audit: zero,
            run_audit: zero,
            update_check: zero,
        }
    }
}

/// Execution engine timing and outcome settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Probability that a check ends KO
    pub ko_probability: f64,
    /// Wait before a PENDING check is queued
    pub queue_delay: DelayRange,
    /// Wait between QUEUED and RUNNING
    pub start_delay: DelayRange,
    /// Wait between RUNNING and the outcome
    pub finish_delay: DelayRange,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ko_probability: 0.15,
            queue_delay: DelayRange::new(600, 1400),
            start_delay: DelayRange::new(300, 700),
            finish_delay: DelayRange::new(500, 1200),
        }
    }
}

impl EngineConfig {
    /// No delays between transitions
    #[must_use]
    pub fn instant() -> Self {
        Self {
            queue_delay: DelayRange::zero(),
            start_delay: DelayRange::zero(),
            finish_delay: DelayRange::zero(),
            ..Self::default()
        }
    }

    /// Longest a single check can take to settle
    #[must_use]
    pub fn max_check_duration(&self) -> Duration {
        self.queue_delay.max() + self.start_delay.max() + self.finish_delay.max()
    }
}

/// Desk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Default latency for injector-wrapped calls
    pub latency: DelayRange,
    /// Per-operation latency overrides
    pub operation_latency: OperationLatency,
    /// Probability of a simulated fault per call
    pub fault_rate: f64,
    /// Status code carried by simulated faults
    pub fault_status: u16,
    /// Engine settings
    pub engine: EngineConfig,
    /// Interval used by polling observers
    pub poll_interval_ms: u64,
    /// Page size when a listing does not specify one
    pub default_page_size: usize,
    /// Number of audits in the seed dataset
    pub seed_audits: usize,
    /// Fixed RNG seed for reproducible runs
    pub rng_seed: Option<u64>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            latency: DelayRange::new(300, 1200),
            operation_latency: OperationLatency::default(),
            fault_rate: 0.12,
            fault_status: 500,
            engine: EngineConfig::default(),
            poll_interval_ms: 800,
            default_page_size: 10,
            seed_audits: 60,
            rng_seed: None,
        }
    }
}

impl DeskConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero latency, zero faults, zero engine delays
    #[must_use]
    pub fn instant() -> Self {
        Self {
            latency: DelayRange::zero(),
            operation_latency: OperationLatency::zero(),
            fault_rate: 0.0,
            engine: EngineConfig::instant(),
            poll_interval_ms: 10,
            ..Self::default()
        }
    }

    /// With fault rate
    #[inline]
    #[must_use]
    pub fn with_fault_rate(mut self, rate: f64) -> Self {
        self.fault_rate = rate;
        self
    }

    /// With KO probability
    #[inline]
    #[must_use]
    pub fn with_ko_probability(mut self, p: f64) -> Self {
        self.engine.ko_probability = p;
        self
    }

    /// With RNG seed
    #[inline]
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// With engine settings
    #[inline]
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// With seed dataset size
    #[inline]
    #[must_use]
    pub fn with_seed_audits(mut self, count: usize) -> Self {
        self.seed_audits = count;
        self
    }

    /// Poll interval as a duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// `AuditError::Config` on malformed TOML or out-of-range values
    pub fn from_toml_str(source: &str) -> Result<Self, AuditError> {
        let config: Self =
            toml::from_str(source).map_err(|e| AuditError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `AuditError::Config` if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| AuditError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Check ranges and probabilities
    ///
    /// # Errors
    /// `AuditError::Config` naming the first offending field
    pub fn validate(&self) -> Result<(), AuditError> {
        check_probability("fault_rate", self.fault_rate)?;
        check_probability("engine.ko_probability", self.engine.ko_probability)?;
        self.latency.validate("latency")?;
        self.engine.queue_delay.validate("engine.queue_delay")?;
        self.engine.start_delay.validate("engine.start_delay")?;
        self.engine.finish_delay.validate("engine.finish_delay")?;

        let ops = &self.operation_latency;
        for (name, range) in [
            ("operation_latency.list_audits", ops.list_audits),
            ("operation_latency.get_audit", ops.get_audit),
            ("operation_latency.list_templates", ops.list_templates),
            ("operation_latency.create_audit", ops.create_audit),
            ("operation_latency.run_audit", ops.run_audit),
            ("operation_latency.update_check", ops.update_check),
        ] {
            if let Some(range) = range {
                range.validate(name)?;
            }
        }

        if self.default_page_size == 0 {
            return Err(AuditError::Config(
                "default_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), AuditError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AuditError::Config(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_simulated_backend() {
        let config = DeskConfig::default();
        assert_eq!(config.latency, DelayRange::new(300, 1200));
        assert_eq!(config.fault_rate, 0.12);
        assert_eq!(config.fault_status, 500);
        assert_eq!(config.engine.ko_probability, 0.15);
        assert_eq!(
            config.operation_latency.run_audit,
            Some(DelayRange::fixed(400))
        );
        assert_eq!(config.default_page_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DeskConfig::from_toml_str(
            r#"
            fault_rate = 0.0
            rng_seed = 7

            [engine]
            ko_probability = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.fault_rate, 0.0);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.engine.ko_probability, 0.5);
        assert_eq!(config.engine.queue_delay, DelayRange::new(600, 1400));
        assert_eq!(config.poll_interval_ms, 800);
    }

    #[test]
    fn rejects_bad_probability() {
        let err = DeskConfig::new().with_fault_rate(1.5).validate().unwrap_err();
        assert!(matches!(err, AuditError::Config(msg) if msg.contains("fault_rate")));
    }

    #[test]
    fn rejects_inverted_range() {
        let mut config = DeskConfig::instant();
        config.engine.start_delay = DelayRange::new(10, 5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn instant_has_no_delays() {
        let config = DeskConfig::instant();
        assert!(config.latency.is_zero());
        assert_eq!(config.engine.max_check_duration(), Duration::ZERO);
        assert_eq!(config.fault_rate, 0.0);
    }
}
