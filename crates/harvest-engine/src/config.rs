use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tax_optimizer::HarvestingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub harvesting: HarvestingConfig,
    /// Keep the instrument catalog after the first successful fetch
    pub cache_catalog: bool,
    /// Simulated round trip for paper fills and fetches
    pub paper_latency_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            harvesting: HarvestingConfig::default(),
            cache_catalog: true,
            paper_latency_ms: 150,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            harvesting: HarvestingConfig::from_env()?,
            cache_catalog: env::var("HARVEST_CACHE_CATALOG")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("invalid value for HARVEST_CACHE_CATALOG")?,
            paper_latency_ms: env::var("HARVEST_PAPER_LATENCY_MS")
                .unwrap_or_else(|_| "150".to_string())
                .parse()
                .context("invalid value for HARVEST_PAPER_LATENCY_MS")?,
        })
    }
}
