//! Runtime configuration loaded from YAML.
//!
//! Every section has defaults, so an empty file (or no file) is valid.
//!
//! ```yaml
//! fingerprint:
//!   width: 64
//!   duplicate_threshold: 10
//!   min_content_length: 500
//! retry:
//!   backoff_secs: [3600, 21600, 43200]
//!   max_age_secs: 86400
//!   after_last_tier: stop
//! pipeline:
//!   workers: 5
//!   batch_size: 30
//!   min_summary_input: 100
//! ```

use crate::error::Result;
use crate::fingerprint::{DEFAULT_DUPLICATE_THRESHOLD, DEFAULT_WIDTH, SimHasher};
use crate::retry::{AfterLastTier, BackoffSchedule, RetryPolicy};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fingerprint: FingerprintConfig,
    pub retry: RetryConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    pub width: u32,
    pub duplicate_threshold: u32,
    /// Bodies shorter than this (in characters) skip the duplicate check.
    pub min_content_length: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            min_content_length: 500,
        }
    }
}

impl FingerprintConfig {
    pub fn hasher(&self) -> SimHasher {
        SimHasher::new(self.width)
    }
}

/// Backoff table in seconds; index 0 applies after the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub backoff_secs: Vec<u64>,
    pub max_age_secs: Option<u64>,
    pub after_last_tier: AfterLastTier,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig::from(&RetryPolicy::default())
    }
}

fn secs_to_delta(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            schedule: BackoffSchedule::new(
                self.backoff_secs.iter().copied().map(secs_to_delta).collect(),
                self.after_last_tier,
            ),
            max_age: self.max_age_secs.map(secs_to_delta),
        }
    }
}

impl From<&RetryPolicy> for RetryConfig {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            backoff_secs: policy
                .schedule
                .tiers()
                .iter()
                .map(|d| d.num_seconds().max(0) as u64)
                .collect(),
            max_age_secs: policy.max_age.map(|d| d.num_seconds().max(0) as u64),
            after_last_tier: policy.schedule.after_last_tier(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent items per batch.
    pub workers: usize,
    /// Items selected per scan.
    pub batch_size: usize,
    /// Bodies shorter than this are not sent to a summarizer.
    pub min_summary_input: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            batch_size: 30,
            min_summary_input: 100,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_yaml(&raw)?;
        info!(
            width = config.fingerprint.width,
            threshold = config.fingerprint.duplicate_threshold,
            tiers = config.retry.backoff_secs.len(),
            workers = config.pipeline.workers,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load `path` when given, otherwise defaults.
    pub async fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p).await,
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_three_tier() {
        let config = Config::default();
        assert_eq!(config.retry.backoff_secs, vec![3600, 21600, 43200]);
        assert_eq!(config.retry.max_age_secs, Some(86400));
        assert_eq!(config.retry.policy(), RetryPolicy::three_tier());
        assert_eq!(config.fingerprint.duplicate_threshold, 10);
        assert_eq!(config.pipeline.workers, 5);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = Config::from_yaml("pipeline:\n  workers: 12\n").unwrap();
        assert_eq!(config.pipeline.workers, 12);
        assert_eq!(config.pipeline.batch_size, 30);
        assert_eq!(config.fingerprint, FingerprintConfig::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_four_tier_yaml() {
        let yaml = r#"
retry:
  backoff_secs: [3600, 21600, 86400, 604800]
  max_age_secs: null
  after_last_tier: stop
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.retry.policy(), RetryPolicy::four_tier());
    }

    #[test]
    fn test_repeat_last_parses() {
        let config = Config::from_yaml("retry:\n  after_last_tier: repeat_last\n").unwrap();
        assert_eq!(config.retry.after_last_tier, AfterLastTier::RepeatLast);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(Config::from_yaml("pipeline: [").is_err());
        assert!(Config::from_yaml("pipeline:\n  workers: many\n").is_err());
    }

    #[test]
    fn test_huge_secs_saturate() {
        let config = RetryConfig {
            backoff_secs: vec![u64::MAX],
            max_age_secs: None,
            after_last_tier: AfterLastTier::Stop,
        };
        assert_eq!(config.policy().schedule.tiers()[0], TimeDelta::MAX);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        tokio::fs::write(&path, "fingerprint:\n  duplicate_threshold: 6\n")
            .await
            .unwrap();
        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.fingerprint.duplicate_threshold, 6);

        let missing = Config::load(tmp.path().join("nope.yaml")).await;
        assert!(missing.is_err());
        assert_eq!(Config::load_or_default(None).await.unwrap(), Config::default());
    }
}
