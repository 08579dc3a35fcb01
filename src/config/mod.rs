//! Configuration: cache lifetimes, policy knobs and prediction overrides.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! Durations are given in milliseconds.
//!
//! ```toml
//! [cache]
//! ttl_ms = 300000
//! sweep_interval_ms = 120000
//! max_entries = 50
//!
//! [policy]
//! top_n = 3
//! max_prefetches = 10
//! idle_delay_ms = 2000
//! intent_delay_ms = 100
//! fast_downlink_mbps = 1.5
//! builtin_table = true
//!
//! [[predictions]]
//! from = "/nda"
//! next = [{ route = "/kyc-portal", weight = 0.95 }]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, RouteCache};
use crate::policy::{
    DEFAULT_FAST_DOWNLINK_MBPS, DEFAULT_MAX_PREFETCHES, DEFAULT_TOP_N, PolicyError,
    PredictionRule, PredictionTable, PrefetchPolicy,
};

/// Default inactivity before an idle prefetch pass.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_secs(2);

/// Default hover/touch debounce before an intent prefetch fires.
pub const DEFAULT_INTENT_DELAY: Duration = Duration::from_millis(100);

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub cache: CacheConfig,
    pub policy: PolicyConfig,
    /// Extra or replacement predictions; merged over the built-in table
    /// unless `policy.builtin_table` is off.
    pub predictions: Vec<PredictionRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub sweep_interval_ms: u64,
    /// 0 disables the bound.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL.as_millis() as u64,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub top_n: usize,
    pub max_prefetches: usize,
    pub idle_delay_ms: u64,
    pub intent_delay_ms: u64,
    pub fast_downlink_mbps: f64,
    /// Start from the onboarding-portal table before applying `predictions`.
    pub builtin_table: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            max_prefetches: DEFAULT_MAX_PREFETCHES,
            idle_delay_ms: DEFAULT_IDLE_DELAY.as_millis() as u64,
            intent_delay_ms: DEFAULT_INTENT_DELAY.as_millis() as u64,
            fast_downlink_mbps: DEFAULT_FAST_DOWNLINK_MBPS,
            builtin_table: true,
        }
    }
}

impl PolicyConfig {
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn intent_delay(&self) -> Duration {
        Duration::from_millis(self.intent_delay_ms)
    }
}

impl PrefetchConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file; `.json` files are parsed as JSON, anything else as TOML.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        debug!(path = %path.display(), "loaded prefetch config");
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Rejects values that would make the cache or scheduler misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_ms == 0 {
            return Err(ConfigError::Invalid("cache.ttl_ms must be positive".into()));
        }
        if self.cache.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "cache.sweep_interval_ms must be positive".into(),
            ));
        }
        if !self.policy.fast_downlink_mbps.is_finite() || self.policy.fast_downlink_mbps < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "policy.fast_downlink_mbps must be a non-negative number, got {}",
                self.policy.fast_downlink_mbps
            )));
        }
        Ok(())
    }

    /// Builds the prediction table: the built-in one (if enabled) with
    /// `predictions` applied on top.
    pub fn prediction_table(&self) -> Result<PredictionTable, ConfigError> {
        let mut table = if self.policy.builtin_table {
            PredictionTable::onboarding_portal()
        } else {
            PredictionTable::new()
        };

        for rule in &self.predictions {
            for prediction in &rule.next {
                table.insert(&rule.from, &prediction.route, prediction.weight)?;
            }
        }
        Ok(table)
    }

    pub fn build_cache(&self) -> RouteCache {
        RouteCache::new()
            .ttl(self.cache.ttl())
            .max_entries(self.cache.max_entries)
    }

    pub fn build_policy(&self) -> Result<PrefetchPolicy, ConfigError> {
        Ok(PrefetchPolicy::new(self.prediction_table()?)
            .top_n(self.policy.top_n)
            .max_prefetches(self.policy.max_prefetches)
            .fast_downlink_mbps(self.policy.fast_downlink_mbps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PrefetchConfig::from_toml_str("").unwrap();
        assert_eq!(config, PrefetchConfig::default());
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(120));
        assert_eq!(config.policy.top_n, 3);
        assert_eq!(config.policy.idle_delay(), DEFAULT_IDLE_DELAY);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = PrefetchConfig::from_toml_str(
            r#"
            [cache]
            ttl_ms = 60000

            [policy]
            max_prefetches = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.policy.max_prefetches, 2);
        assert_eq!(config.policy.top_n, DEFAULT_TOP_N);
    }

    #[test]
    fn predictions_override_builtin_table() {
        let config = PrefetchConfig::from_toml_str(
            r#"
            [[predictions]]
            from = "/nda"
            next = [{ route = "/help/nda", weight = 1.0 }]

            [[predictions]]
            from = "/faq"
            next = [{ route = "/auth/signup", weight = 0.4 }]
            "#,
        )
        .unwrap();

        let table = config.prediction_table().unwrap();
        assert_eq!(table.top("/nda", 2), vec!["/help/nda", "/kyc-portal"]);
        assert_eq!(table.top("/faq", 3), vec!["/auth/signup"]);
    }

    #[test]
    fn builtin_table_can_be_disabled() {
        let config = PrefetchConfig::from_toml_str(
            r#"
            [policy]
            builtin_table = false
            "#,
        )
        .unwrap();
        assert!(config.prediction_table().unwrap().is_empty());
    }

    #[test]
    fn invalid_prediction_weight_surfaces() {
        let config = PrefetchConfig::from_toml_str(
            r#"
            [[predictions]]
            from = "/nda"
            next = [{ route = "/kyc-portal", weight = 2.0 }]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.build_policy(),
            Err(ConfigError::Policy(PolicyError::InvalidWeight { .. }))
        ));
    }

    #[test]
    fn zero_ttl_rejected() {
        let err = PrefetchConfig::from_toml_str("[cache]\nttl_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn negative_downlink_rejected() {
        let err = PrefetchConfig::from_json_str(r#"{"policy": {"fast_downlink_mbps": -1.0}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_reported() {
        let err = PrefetchConfig::from_toml_str("[cache\nttl_ms = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn json_config_parses() {
        let config = PrefetchConfig::from_json_str(r#"{"cache": {"max_entries": 5}}"#).unwrap();
        assert_eq!(config.build_cache().entry_ttl(), DEFAULT_TTL);
        assert_eq!(config.cache.max_entries, 5);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let toml = PrefetchConfig::default().to_toml_string().unwrap();
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("[policy]"));
        assert_eq!(
            PrefetchConfig::from_toml_str(&toml).unwrap(),
            PrefetchConfig::default()
        );
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let err = PrefetchConfig::load(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
