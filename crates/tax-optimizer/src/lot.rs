//! Lot Evaluation
//!
//! Resolves holdings against the catalog and computes per-lot figures.

use crate::models::{AnalysisWarning, Holding, Instrument, InstrumentCatalog};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Holding period classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingPeriod {
    ShortTerm,
    LongTerm,
}

impl HoldingPeriod {
    pub fn classify(days_held: i64, long_term_threshold_days: i64) -> Self {
        if days_held >= long_term_threshold_days {
            HoldingPeriod::LongTerm
        } else {
            HoldingPeriod::ShortTerm
        }
    }
}

impl std::fmt::Display for HoldingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldingPeriod::ShortTerm => write!(f, "short-term"),
            HoldingPeriod::LongTerm => write!(f, "long-term"),
        }
    }
}

/// A holding paired with its catalog entry
#[derive(Debug, Clone, Copy)]
pub struct ResolvedHolding<'a> {
    /// Position of the holding in the input slice
    pub index: usize,
    pub holding: &'a Holding,
    pub instrument: &'a Instrument,
}

/// Pair each holding with its instrument. Holdings whose instrument is unknown are
/// skipped and reported as warnings.
pub fn resolve_holdings<'a>(
    holdings: &'a [Holding],
    catalog: &'a InstrumentCatalog,
) -> (Vec<ResolvedHolding<'a>>, Vec<AnalysisWarning>) {
    let mut resolved = Vec::with_capacity(holdings.len());
    let mut warnings = Vec::new();

    for (index, holding) in holdings.iter().enumerate() {
        match catalog.get(&holding.instrument_id) {
            Some(instrument) => resolved.push(ResolvedHolding {
                index,
                holding,
                instrument,
            }),
            None => {
                tracing::warn!(
                    "Skipping holding #{}: unknown instrument {}",
                    index,
                    holding.instrument_id
                );
                warnings.push(AnalysisWarning::UnresolvedReference {
                    holding_index: index,
                    instrument_id: holding.instrument_id.clone(),
                });
            }
        }
    }

    (resolved, warnings)
}

/// Valuation and tax classification of one lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotMetrics {
    pub shares: u64,
    pub market_value: f64,
    pub cost_basis: f64,
    pub unrealized_pnl: f64,
    pub days_held: i64,
    pub holding_period: HoldingPeriod,
}

impl LotMetrics {
    pub fn evaluate(
        holding: &Holding,
        instrument: &Instrument,
        as_of: NaiveDate,
        long_term_threshold_days: i64,
    ) -> Self {
        let shares = holding.shares as f64;
        let market_value = shares * instrument.price;
        let cost_basis = shares * instrument.cost_basis;
        let days_held = (as_of - holding.acquired_on).num_days();

        Self {
            shares: holding.shares,
            market_value,
            cost_basis,
            unrealized_pnl: market_value - cost_basis,
            days_held,
            holding_period: HoldingPeriod::classify(days_held, long_term_threshold_days),
        }
    }

    pub fn is_long_term(&self) -> bool {
        self.holding_period == HoldingPeriod::LongTerm
    }

    /// Unrealized P/L as a percentage of cost basis
    pub fn unrealized_pnl_percent(&self) -> f64 {
        if self.cost_basis > 0.0 {
            self.unrealized_pnl / self.cost_basis * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sector;

    fn instrument(id: &str, price: f64, cost_basis: f64) -> Instrument {
        Instrument {
            id: id.to_string(),
            name: format!("{} Corp", id),
            sector: Sector::Industrials,
            price,
            cost_basis,
            market_cap: 20_000.0,
            volatility: 0.2,
        }
    }

    #[test]
    fn test_holding_period_boundary() {
        assert_eq!(HoldingPeriod::classify(364, 365), HoldingPeriod::ShortTerm);
        assert_eq!(HoldingPeriod::classify(365, 365), HoldingPeriod::LongTerm);
    }

    #[test]
    fn test_evaluate_lot() {
        let holding = Holding::new("ACM", 50, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let as_of = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let metrics = LotMetrics::evaluate(&holding, &instrument("ACM", 80.0, 100.0), as_of, 365);

        assert_eq!(metrics.market_value, 4000.0);
        assert_eq!(metrics.cost_basis, 5000.0);
        assert_eq!(metrics.unrealized_pnl, -1000.0);
        assert_eq!(metrics.days_held, 100);
        assert!(!metrics.is_long_term());
        assert!((metrics.unrealized_pnl_percent() + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_skips_unknown_instruments() {
        let catalog = InstrumentCatalog::from_instruments(vec![instrument("ACM", 10.0, 8.0)]);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let holdings = vec![Holding::new("GHOST", 5, date), Holding::new("ACM", 10, date)];

        let (resolved, warnings) = resolve_holdings(&holdings, &catalog);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].index, 1);
        assert_eq!(
            warnings,
            vec![AnalysisWarning::UnresolvedReference {
                holding_index: 0,
                instrument_id: "GHOST".to_string(),
            }]
        );
    }
}
