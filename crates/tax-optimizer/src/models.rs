//! Portfolio Model
//!
//! Reference data, positions and trade suggestions shared by every stage of the
//! harvesting pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Market sector an instrument is classified under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Technology,
    Healthcare,
    Financials,
    Energy,
    ConsumerGoods,
    Industrials,
    Utilities,
    RealEstate,
}

impl Sector {
    /// Every known sector, in display order
    pub const ALL: [Sector; 8] = [
        Sector::Technology,
        Sector::Healthcare,
        Sector::Financials,
        Sector::Energy,
        Sector::ConsumerGoods,
        Sector::Industrials,
        Sector::Utilities,
        Sector::RealEstate,
    ];
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sector::Technology => write!(f, "Technology"),
            Sector::Healthcare => write!(f, "Healthcare"),
            Sector::Financials => write!(f, "Financials"),
            Sector::Energy => write!(f, "Energy"),
            Sector::ConsumerGoods => write!(f, "Consumer Goods"),
            Sector::Industrials => write!(f, "Industrials"),
            Sector::Utilities => write!(f, "Utilities"),
            Sector::RealEstate => write!(f, "Real Estate"),
        }
    }
}

/// Reference data for a tradable instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Ticker or other unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    pub sector: Sector,
    /// Current price per share
    pub price: f64,
    /// Cost basis per share
    pub cost_basis: f64,
    /// Market capitalization, in millions
    pub market_cap: f64,
    /// Volatility index on a 0.0 - 1.0 scale
    pub volatility: f64,
}

/// Read-only lookup of instruments by identifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentCatalog {
    instruments: HashMap<String, Instrument>,
}

impl InstrumentCatalog {
    /// Build a catalog. A later entry with a duplicate id replaces the earlier one.
    pub fn from_instruments(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        Self {
            instruments: instruments
                .into_iter()
                .map(|i| (i.id.clone(), i))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Instrument> {
        self.instruments.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instruments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }
}

/// A position in one instrument, held as a single lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub instrument_id: String,
    pub shares: u64,
    pub acquired_on: NaiveDate,
}

impl Holding {
    pub fn new(instrument_id: impl Into<String>, shares: u64, acquired_on: NaiveDate) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            shares,
            acquired_on,
        }
    }
}

/// Tax strategy a suggestion follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Realize a long-term loss that can be carried forward
    LossCarryforward,
    /// Realize a short-term loss; the holder must avoid repurchasing inside the wash sale window
    WashSaleAvoidance,
    /// Trim a gain to offset losses or reduce concentration
    Rebalancing,
}

impl Strategy {
    /// Short code used in suggestion identifiers
    pub fn code(&self) -> &'static str {
        match self {
            Strategy::LossCarryforward => "LCF",
            Strategy::WashSaleAvoidance => "WSA",
            Strategy::Rebalancing => "RBL",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::LossCarryforward => write!(f, "loss-carryforward"),
            Strategy::WashSaleAvoidance => write!(f, "wash-sale-avoidance"),
            Strategy::Rebalancing => write!(f, "rebalancing"),
        }
    }
}

/// A recommended sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Identifier, unique within a batch and stable across identical analyses
    pub id: String,
    pub instrument_id: String,
    pub shares_to_sell: u64,
    /// Realized gain (positive) or loss (negative) if executed at the current price
    pub realized_gain_loss: f64,
    pub strategy: Strategy,
    /// Human-readable explanation
    pub rationale: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Execution priority, lower is more urgent
    pub priority: u8,
}

impl Suggestion {
    pub fn is_loss(&self) -> bool {
        self.realized_gain_loss < 0.0
    }

    /// Magnitude of the realized amount, used for ranking
    pub fn impact(&self) -> f64 {
        self.realized_gain_loss.abs()
    }
}

/// Non-fatal condition found while reading the portfolio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// A holding references an instrument missing from the catalog; the holding was skipped
    UnresolvedReference {
        holding_index: usize,
        instrument_id: String,
    },
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisWarning::UnresolvedReference {
                holding_index,
                instrument_id,
            } => write!(
                f,
                "holding #{} references unknown instrument {}",
                holding_index, instrument_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_tags_serialize_kebab_case() {
        let json = serde_json::to_string(&Strategy::WashSaleAvoidance).unwrap();
        assert_eq!(json, "\"wash-sale-avoidance\"");
        let parsed: Strategy = serde_json::from_str("\"loss-carryforward\"").unwrap();
        assert_eq!(parsed, Strategy::LossCarryforward);
        assert_eq!(Strategy::Rebalancing.to_string(), "rebalancing");
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = InstrumentCatalog::from_instruments(vec![Instrument {
            id: "NVX".to_string(),
            name: "Novex Systems".to_string(),
            sector: Sector::Technology,
            price: 42.0,
            cost_basis: 40.0,
            market_cap: 12_000.0,
            volatility: 0.3,
        }]);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("NVX"));
        assert!(catalog.get("ZZZ").is_none());
    }
}
