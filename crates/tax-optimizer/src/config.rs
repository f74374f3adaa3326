use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Heuristic thresholds for the harvesting pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestingConfig {
    // Holding period
    pub long_term_threshold_days: i64,     // 365

    // Loss harvesting
    pub loss_confidence: f64,              // 0.98
    pub default_loss_priority: u8,         // 5
    pub high_volatility_threshold: f64,    // 0.4
    pub high_volatility_priority: u8,      // 2
    pub small_cap_threshold: f64,          // 5,000 (millions)
    pub small_cap_priority: u8,            // 3
    pub long_term_loss_priority: u8,       // 1

    // Gain rebalancing
    pub gain_confidence: f64,              // 0.92
    pub rebalance_fraction: f64,           // 0.15 of held shares
    pub overweight_threshold: f64,         // 0.20 of portfolio value
    pub overweight_volatility: f64,        // 0.35
    pub overweight_priority: u8,           // 3
    pub default_gain_priority: u8,         // 7

    // Risk score
    /// Divisor applied to the sector-concentration variance
    pub risk_variance_scale: f64,          // 1,000,000,000
}

impl Default for HarvestingConfig {
    fn default() -> Self {
        Self {
            long_term_threshold_days: 365,
            loss_confidence: 0.98,
            default_loss_priority: 5,
            high_volatility_threshold: 0.4,
            high_volatility_priority: 2,
            small_cap_threshold: 5_000.0,
            small_cap_priority: 3,
            long_term_loss_priority: 1,
            gain_confidence: 0.92,
            rebalance_fraction: 0.15,
            overweight_threshold: 0.20,
            overweight_volatility: 0.35,
            overweight_priority: 3,
            default_gain_priority: 7,
            risk_variance_scale: 1_000_000_000.0,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("invalid value for {}", key))
}

impl HarvestingConfig {
    /// Load from `HARVEST_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let config = Self {
            long_term_threshold_days: env_or("HARVEST_LONG_TERM_DAYS", d.long_term_threshold_days)?,
            loss_confidence: env_or("HARVEST_LOSS_CONFIDENCE", d.loss_confidence)?,
            default_loss_priority: env_or("HARVEST_LOSS_PRIORITY", d.default_loss_priority)?,
            high_volatility_threshold: env_or("HARVEST_HIGH_VOLATILITY", d.high_volatility_threshold)?,
            high_volatility_priority: env_or("HARVEST_HIGH_VOLATILITY_PRIORITY", d.high_volatility_priority)?,
            small_cap_threshold: env_or("HARVEST_SMALL_CAP", d.small_cap_threshold)?,
            small_cap_priority: env_or("HARVEST_SMALL_CAP_PRIORITY", d.small_cap_priority)?,
            long_term_loss_priority: env_or("HARVEST_LONG_TERM_PRIORITY", d.long_term_loss_priority)?,
            gain_confidence: env_or("HARVEST_GAIN_CONFIDENCE", d.gain_confidence)?,
            rebalance_fraction: env_or("HARVEST_REBALANCE_FRACTION", d.rebalance_fraction)?,
            overweight_threshold: env_or("HARVEST_OVERWEIGHT_THRESHOLD", d.overweight_threshold)?,
            overweight_volatility: env_or("HARVEST_OVERWEIGHT_VOLATILITY", d.overweight_volatility)?,
            overweight_priority: env_or("HARVEST_OVERWEIGHT_PRIORITY", d.overweight_priority)?,
            default_gain_priority: env_or("HARVEST_GAIN_PRIORITY", d.default_gain_priority)?,
            risk_variance_scale: env_or("HARVEST_RISK_VARIANCE_SCALE", d.risk_variance_scale)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the heuristics meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.long_term_threshold_days < 0 {
            anyhow::bail!("long_term_threshold_days must be non-negative");
        }
        for (name, value) in [
            ("loss_confidence", self.loss_confidence),
            ("gain_confidence", self.gain_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        for (name, value) in [
            ("rebalance_fraction", self.rebalance_fraction),
            ("overweight_threshold", self.overweight_threshold),
        ] {
            if value <= 0.0 || value > 1.0 {
                anyhow::bail!("{} must be within (0, 1], got {}", name, value);
            }
        }
        if self.risk_variance_scale <= 0.0 {
            anyhow::bail!("risk_variance_scale must be positive");
        }
        Ok(())
    }
}
