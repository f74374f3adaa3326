use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tax_optimizer::{Holding, Instrument, Sector};

/// Instruments and holdings loaded into the paper brokerage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioFixture {
    pub instruments: Vec<Instrument>,
    pub holdings: Vec<Holding>,
}

impl PortfolioFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading portfolio file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing portfolio file {}", path.display()))
    }

    /// Small mixed portfolio: short- and long-term losses, an overweight winner and a
    /// holding whose instrument is missing from the catalog
    pub fn demo() -> Self {
        let today = Utc::now().date_naive();
        let ago = |days: i64| -> NaiveDate { today - Duration::days(days) };

        let instrument = |id: &str,
                          name: &str,
                          sector: Sector,
                          price: f64,
                          cost_basis: f64,
                          market_cap: f64,
                          volatility: f64| Instrument {
            id: id.to_string(),
            name: name.to_string(),
            sector,
            price,
            cost_basis,
            market_cap,
            volatility,
        };

        Self {
            instruments: vec![
                instrument("NVX", "Novex Systems", Sector::Technology, 182.40, 121.10, 410_000.0, 0.48),
                instrument("HLX", "Helix Therapeutics", Sector::Healthcare, 31.75, 44.20, 3_200.0, 0.62),
                instrument("GRD", "Gridline Power", Sector::Utilities, 58.10, 61.90, 27_500.0, 0.18),
                instrument("CRB", "Carbon Ridge Energy", Sector::Energy, 74.30, 69.80, 88_000.0, 0.33),
                instrument("SLV", "Silverline Bancorp", Sector::Financials, 22.05, 22.05, 15_400.0, 0.21),
            ],
            holdings: vec![
                Holding::new("NVX", 120, ago(540)),
                Holding::new("HLX", 300, ago(75)),
                Holding::new("GRD", 150, ago(420)),
                Holding::new("CRB", 90, ago(200)),
                Holding::new("SLV", 400, ago(30)),
                Holding::new("OLDCO", 25, ago(900)),
            ],
        }
    }
}
