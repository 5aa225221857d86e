use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use tracing::warn;

use crate::{
    error::{ConfigError, ConfigurationAnomaly},
    model::{
        constants::{BEST_AMOUNT, FORMULA_WEIGHT, RECENT_AMOUNT, RECENT_DIVERSITY_FLOOR, RECENT_WINDOW_CAPACITY},
        structures::formula::{AggregateKind, FormulaTerm}
    }
};

/// Engine configuration. Immutable once a processor is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Weighted sum of best/recent aggregates making up a player's potential
    pub potential_formula: Vec<FormulaTerm>,
    pub recent_window: RecentWindowConfig,
    /// Charts missing from the catalog are rated as unranked instead of rejected
    pub allow_unknown_charts: bool,
    /// A song token that skips session lookup and integrity checks (debug clients)
    pub session_bypass_token: Option<String>,
    pub background: BackgroundConfig
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentWindowConfig {
    pub capacity: usize,
    /// Distinct charts the window must keep before any chart's only slot can be evicted
    pub diversity_floor: usize
}

/// Retry policy for fire-and-forget writes (play log, rating snapshots).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub retry_attempts: u32,
    /// Delay before the first retry, doubled for each following one
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64
}

impl Default for RatingConfig {
    fn default() -> Self {
        RatingConfig {
            potential_formula: vec![
                FormulaTerm::new(AggregateKind::Best, BEST_AMOUNT, FORMULA_WEIGHT),
                FormulaTerm::new(AggregateKind::Recent, RECENT_AMOUNT, FORMULA_WEIGHT),
            ],
            recent_window: RecentWindowConfig::default(),
            allow_unknown_charts: true,
            session_bypass_token: None,
            background: BackgroundConfig::default()
        }
    }
}

impl Default for RecentWindowConfig {
    fn default() -> Self {
        RecentWindowConfig {
            capacity: RECENT_WINDOW_CAPACITY,
            diversity_floor: RECENT_DIVERSITY_FLOOR
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        BackgroundConfig {
            retry_attempts: 3,
            retry_delay_ms: 200,
            max_retry_delay_ms: 5_000
        }
    }
}

impl BackgroundConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor).min(self.max_retry_delay_ms))
    }
}

impl RatingConfig {
    /// Loads and validates a JSON configuration. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<RatingConfig, ConfigError> {
        let contents = fs::read_to_string(path)?;
        RatingConfig::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<RatingConfig, ConfigError> {
        let config: RatingConfig = serde_json::from_str(json)?;
        config.validate()?;

        for anomaly in config.anomalies() {
            warn!("Configuration anomaly: {}", anomaly);
        }

        Ok(config)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = &self.recent_window;

        if window.capacity == 0 {
            return Err(ConfigError::Invalid("recent_window.capacity must be positive".to_string()));
        }
        if window.capacity > u8::MAX as usize + 1 {
            return Err(ConfigError::Invalid(format!(
                "recent_window.capacity {} exceeds the slot id range",
                window.capacity
            )));
        }
        if window.diversity_floor >= window.capacity {
            return Err(ConfigError::Invalid(format!(
                "recent_window.diversity_floor {} must be below capacity {}",
                window.diversity_floor, window.capacity
            )));
        }

        if let Some(term) = self
            .potential_formula
            .iter()
            .find(|t| !t.weight.is_finite() || t.weight < 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "formula weight {} is not a non-negative number",
                term.weight
            )));
        }

        Ok(())
    }

    /// Accepted but surprising settings. Never corrected, only reported.
    pub fn anomalies(&self) -> Vec<ConfigurationAnomaly> {
        let mut anomalies = Vec::new();

        if self.potential_formula.is_empty() {
            anomalies.push(ConfigurationAnomaly::EmptyFormula);
        }

        for term in &self.potential_formula {
            if term.kind == AggregateKind::Recent && term.amount > self.recent_window.capacity {
                anomalies.push(ConfigurationAnomaly::RecentAmountExceedsWindow {
                    amount: term.amount,
                    capacity: self.recent_window.capacity
                });
            }
        }

        anomalies
    }
}
