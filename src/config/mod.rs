//! Static router configuration.
//!
//! Configuration is loaded once at startup — a JSON file or an in-code
//! builder — and validated before any component is constructed. There is
//! no hot reload: changing a venue's parameters (including lifting the
//! maintenance flag) means restarting the process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::positions::RiskThresholds;
use crate::registry::HealthThresholds;
use crate::routing::{CostModelConfig, ScoringWeights};
use crate::shadow::ShadowModeConfig;
use crate::venue::VenueConfig;

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Configuration file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Field has an invalid value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Required section is missing or empty
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Health probe scheduling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Seconds between probe rounds
    pub interval_secs: u64,
    /// Per-venue probe timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 5,
        }
    }
}

impl ProbeSettings {
    /// Probe interval as a `Duration`.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Probe timeout as a `Duration`.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Root configuration for the routing core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Configured venues; at least one is required
    pub venues: Vec<VenueConfig>,
    /// Consecutive-failure thresholds for health transitions
    pub health: HealthThresholds,
    /// Probe scheduling
    pub probe: ProbeSettings,
    /// Scoring weights for routing
    pub scoring: ScoringWeights,
    /// Shadow-mode evaluation settings
    pub shadow: ShadowModeConfig,
    /// Liquidation-risk thresholds
    pub risk: RiskThresholds,
    /// Cost model tunables
    pub cost: CostModelConfig,
}

impl RouterConfig {
    /// Load and validate configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.venues.is_empty() {
            return Err(ConfigError::MissingField("venues".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for venue in &self.venues {
            if venue.name.is_empty() {
                return Err(ConfigError::MissingField("venues[].name".to_string()));
            }
            if !seen.insert(venue.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "venues[].name".to_string(),
                    reason: format!("duplicate venue name '{}'", venue.name),
                });
            }
            if venue.endpoint.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "venues[{}].endpoint",
                    venue.name
                )));
            }
            if venue.supported_assets.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "venues[{}].supported_assets",
                    venue.name
                )));
            }
            if venue.min_order_usd > venue.max_order_usd {
                return Err(ConfigError::InvalidValue {
                    field: format!("venues[{}].min_order_usd", venue.name),
                    reason: "minimum exceeds maximum order size".to_string(),
                });
            }
            if venue.fees.maker_rate.is_sign_negative()
                || venue.fees.taker_rate.is_sign_negative()
            {
                return Err(ConfigError::InvalidValue {
                    field: format!("venues[{}].fees", venue.name),
                    reason: "fee rates must be non-negative".to_string(),
                });
            }
        }

        if self.health.degraded_after == 0 || self.health.down_after < self.health.degraded_after
        {
            return Err(ConfigError::InvalidValue {
                field: "health".to_string(),
                reason: "degraded_after must be positive and no greater than down_after"
                    .to_string(),
            });
        }

        if self.probe.interval_secs == 0 || self.probe.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probe".to_string(),
                reason: "interval and timeout must be positive".to_string(),
            });
        }

        let w = &self.scoring;
        if w.slippage < 0.0 || w.fee < 0.0 || w.funding < 0.0 || w.latency < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "scoring".to_string(),
                reason: "weights must be non-negative".to_string(),
            });
        }
        if w.slippage + w.fee + w.funding + w.latency <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "scoring".to_string(),
                reason: "at least one weight must be positive".to_string(),
            });
        }

        if !(self.risk.critical < self.risk.high && self.risk.high < self.risk.medium) {
            return Err(ConfigError::InvalidValue {
                field: "risk".to_string(),
                reason: "thresholds must satisfy critical < high < medium".to_string(),
            });
        }

        if self.shadow.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "shadow.max_concurrency".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}
