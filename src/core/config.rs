use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::errors::{ProofError, ProofResult};
use crate::core::logging::LoggerConfig;
use crate::core::types::{CurveId, TaskKind, MOVING_AVERAGE_ALPHA};

/// Validator-side engine configuration.
///
/// Every field has a default, so a partial JSON document only needs to name
/// what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub curve: CurveId,
    pub moving_average_alpha: f64,
    /// Cap on concurrent outbound provider requests
    pub max_in_flight: usize,
    pub store_timeout_secs: u64,
    pub retrieve_timeout_secs: u64,
    pub challenge_timeout_secs: u64,
    /// Rounds between tier recomputations
    pub tier_refresh_interval: u64,
    /// How long an issued seed stays redeemable
    pub seed_ttl_secs: u64,
    pub verbose: bool,
    pub logger: LoggerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            curve: CurveId::Secp256k1,
            moving_average_alpha: MOVING_AVERAGE_ALPHA,
            max_in_flight: 32,
            store_timeout_secs: 60,
            retrieve_timeout_secs: 60,
            challenge_timeout_secs: 45,
            tier_refresh_interval: 360,
            seed_ttl_secs: 600,
            verbose: false,
            logger: LoggerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> ProofResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ProofResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> ProofResult<()> {
        if !(self.moving_average_alpha > 0.0 && self.moving_average_alpha <= 1.0) {
            return Err(ProofError::Config {
                reason: format!(
                    "moving_average_alpha must be in (0, 1], got {}",
                    self.moving_average_alpha
                ),
            });
        }
        if self.max_in_flight == 0 {
            return Err(ProofError::Config {
                reason: "max_in_flight must be at least 1".to_string(),
            });
        }
        for task in TaskKind::ALL {
            if self.timeout_secs(task) == 0 {
                return Err(ProofError::Config {
                    reason: format!("{} timeout must be non-zero", task),
                });
            }
        }
        if self.tier_refresh_interval == 0 {
            return Err(ProofError::Config {
                reason: "tier_refresh_interval must be at least 1".to_string(),
            });
        }
        let longest = TaskKind::ALL
            .iter()
            .map(|task| self.timeout_secs(*task))
            .max()
            .unwrap_or(0);
        if self.seed_ttl_secs < longest {
            return Err(ProofError::Config {
                reason: format!(
                    "seed_ttl_secs ({}) must cover the longest timeout ({}s)",
                    self.seed_ttl_secs, longest
                ),
            });
        }
        Ok(())
    }

    pub fn timeout_secs(&self, task: TaskKind) -> u64 {
        match task {
            TaskKind::Store => self.store_timeout_secs,
            TaskKind::Retrieve => self.retrieve_timeout_secs,
            TaskKind::Challenge => self.challenge_timeout_secs,
        }
    }

    pub fn timeout(&self, task: TaskKind) -> Duration {
        Duration::from_secs(self.timeout_secs(task))
    }

    pub fn seed_ttl(&self) -> Duration {
        Duration::from_secs(self.seed_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.curve, CurveId::Secp256k1);
        assert_eq!(config.moving_average_alpha, 0.05);
        assert_eq!(config.timeout(TaskKind::Challenge), Duration::from_secs(45));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config =
            EngineConfig::from_json_str(r#"{"max_in_flight": 4, "logger": {"level": "debug"}}"#)
                .unwrap();
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.store_timeout_secs, 60);
    }

    #[test]
    fn test_rejects_unknown_curve() {
        assert!(EngineConfig::from_json_str(r#"{"curve": "ed448"}"#).is_err());
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let err = EngineConfig::from_json_str(r#"{"moving_average_alpha": 0.0}"#).unwrap_err();
        assert!(matches!(err, ProofError::Config { .. }));
        assert!(EngineConfig::from_json_str(r#"{"max_in_flight": 0}"#).is_err());
    }

    #[test]
    fn test_seed_ttl_must_cover_timeouts() {
        let err = EngineConfig::from_json_str(r#"{"seed_ttl_secs": 30}"#).unwrap_err();
        assert!(matches!(err, ProofError::Config { .. }));
        let config = EngineConfig::from_json_str(r#"{"seed_ttl_secs": 60}"#).unwrap();
        assert_eq!(config.seed_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"challenge_timeout_secs": 10}}"#).unwrap();
        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.challenge_timeout_secs, 10);
    }
}
