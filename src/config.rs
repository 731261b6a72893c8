//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! is a valid configuration. Immutable once an execution starts.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attribute::Strategy;
use crate::observability::Severity;
use crate::planner::CostModel;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Open-attribute engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Global cap on candidates per key and on every odometer radix
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Which factors enter the cost estimate
    #[serde(default)]
    pub cost_model: CostModel,

    /// Selectivity assumed for an attribute before resolution
    #[serde(default = "default_selectivity")]
    pub default_selectivity: f64,

    /// Margin applied to the combinatorial cost before switching to direct
    #[serde(default = "default_correction_factor")]
    pub correction_factor: f64,

    /// Skip rows whose key passes the filter under no candidate
    #[serde(default)]
    pub preselection: bool,

    /// Allow the reoptimizer to switch attributes to direct at runtime
    #[serde(default = "default_true")]
    pub dynamic_strategy: bool,

    /// Feed observed selectivities back into the attribute estimate
    #[serde(default)]
    pub static_reoptimization: bool,

    /// Request one full replan once real selectivities are known
    #[serde(default)]
    pub reoptimization: bool,

    /// Send restriction predicates to the resolver
    #[serde(default = "default_true")]
    pub send_predicates: bool,

    /// Append `isNumeric()` to the restriction predicates
    #[serde(default)]
    pub send_numeric_constraint: bool,

    /// Strategy attributes start with
    #[serde(default = "default_strategy")]
    pub default_strategy: Strategy,

    /// Minimum log severity
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_max_candidates() -> usize {
    3
}

fn default_selectivity() -> f64 {
    0.33
}

fn default_correction_factor() -> f64 {
    0.8
}

fn default_true() -> bool {
    true
}

fn default_strategy() -> Strategy {
    Strategy::Deferred
}

fn default_log_level() -> Severity {
    Severity::Warn
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            cost_model: CostModel::default(),
            default_selectivity: default_selectivity(),
            correction_factor: default_correction_factor(),
            preselection: false,
            dynamic_strategy: default_true(),
            static_reoptimization: false,
            reoptimization: false,
            send_predicates: default_true(),
            send_numeric_constraint: false,
            default_strategy: default_strategy(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_candidates == 0 {
            return Err(ConfigError::Invalid("max_candidates must be > 0".into()));
        }
        if !(self.default_selectivity > 0.0 && self.default_selectivity <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "default_selectivity must be in (0, 1], got {}",
                self.default_selectivity
            )));
        }
        if !(self.correction_factor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "correction_factor must be > 0, got {}",
                self.correction_factor
            )));
        }
        Ok(())
    }
}
