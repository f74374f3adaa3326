//! Portfolio Summary
//!
//! Aggregate valuation, sector exposure and risk score for a set of holdings.

use crate::config::HarvestingConfig;
use crate::lot::resolve_holdings;
use crate::models::{AnalysisWarning, Holding, InstrumentCatalog, Sector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Valuation of a single resolved position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub instrument_id: String,
    pub sector: Sector,
    pub shares: u64,
    pub market_value: f64,
    pub cost_basis: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    /// Share of total market value, in percent
    pub weight_percent: f64,
}

/// Aggregate metrics over every holding that resolves against the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_market_value: f64,
    pub total_cost_basis: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    pub total_shares: u64,
    pub position_count: usize,
    /// Percent of market value per observed sector, one decimal, summing to 100
    pub sector_exposure: BTreeMap<Sector, f64>,
    pub risk_score: f64,
    pub positions: Vec<PositionSnapshot>,
    pub warnings: Vec<AnalysisWarning>,
}

impl PortfolioSummary {
    pub fn exposure(&self, sector: Sector) -> f64 {
        self.sector_exposure.get(&sector).copied().unwrap_or(0.0)
    }
}

/// Summarize a portfolio. Holdings with unknown instruments contribute nothing and
/// are listed in `warnings`.
pub fn summarize(
    holdings: &[Holding],
    catalog: &InstrumentCatalog,
    config: &HarvestingConfig,
) -> PortfolioSummary {
    let (resolved, warnings) = resolve_holdings(holdings, catalog);

    let mut total_market_value = 0.0;
    let mut total_cost_basis = 0.0;
    let mut total_shares = 0u64;
    let mut weighted_volatility = 0.0;
    let mut sector_values: BTreeMap<Sector, f64> = BTreeMap::new();
    let mut positions = Vec::with_capacity(resolved.len());

    for r in &resolved {
        let shares = r.holding.shares as f64;
        let market_value = shares * r.instrument.price;
        let cost_basis = shares * r.instrument.cost_basis;

        total_market_value += market_value;
        total_cost_basis += cost_basis;
        total_shares += r.holding.shares;
        weighted_volatility += market_value * r.instrument.volatility;
        *sector_values.entry(r.instrument.sector).or_insert(0.0) += market_value;

        positions.push(PositionSnapshot {
            instrument_id: r.instrument.id.clone(),
            sector: r.instrument.sector,
            shares: r.holding.shares,
            market_value,
            cost_basis,
            unrealized_pnl: market_value - cost_basis,
            unrealized_pnl_percent: if cost_basis > 0.0 {
                (market_value - cost_basis) / cost_basis * 100.0
            } else {
                0.0
            },
            weight_percent: 0.0,
        });
    }

    if total_market_value > 0.0 {
        for p in &mut positions {
            p.weight_percent = p.market_value / total_market_value * 100.0;
        }
    }

    let unrealized_pnl = total_market_value - total_cost_basis;

    PortfolioSummary {
        total_market_value,
        total_cost_basis,
        unrealized_pnl,
        unrealized_pnl_percent: if total_cost_basis > 0.0 {
            unrealized_pnl / total_cost_basis * 100.0
        } else {
            0.0
        },
        total_shares,
        position_count: positions.len(),
        sector_exposure: sector_exposure(&sector_values, total_market_value),
        risk_score: risk_score(
            weighted_volatility,
            &sector_values,
            total_market_value,
            config.risk_variance_scale,
        ),
        positions,
        warnings,
    }
}

/// Convert per-sector values to percentages rounded to one decimal. Rounding uses the
/// largest-remainder method so the result sums to exactly 100.0.
fn sector_exposure(sector_values: &BTreeMap<Sector, f64>, total: f64) -> BTreeMap<Sector, f64> {
    if total <= 0.0 {
        return BTreeMap::new();
    }

    // Work in tenths of a percent
    let mut shares: Vec<(Sector, i64, f64)> = sector_values
        .iter()
        .map(|(sector, value)| {
            let tenths = value / total * 1000.0;
            (*sector, tenths.floor() as i64, tenths - tenths.floor())
        })
        .collect();

    let assigned: i64 = shares.iter().map(|(_, t, _)| t).sum();
    let mut remaining = 1000 - assigned;

    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| shares[b].2.total_cmp(&shares[a].2).then(a.cmp(&b)));
    for idx in order {
        if remaining <= 0 {
            break;
        }
        shares[idx].1 += 1;
        remaining -= 1;
    }

    shares
        .into_iter()
        .map(|(sector, tenths, _)| (sector, tenths as f64 / 10.0))
        .collect()
}

/// Weighted volatility (x100) plus the variance of sector values around an even split
/// over every known sector, divided by `variance_scale`.
fn risk_score(
    weighted_volatility: f64,
    sector_values: &BTreeMap<Sector, f64>,
    total: f64,
    variance_scale: f64,
) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }

    let avg_volatility = weighted_volatility / total;
    let ideal = total / Sector::ALL.len() as f64;
    let variance = Sector::ALL
        .iter()
        .map(|s| {
            let value = sector_values.get(s).copied().unwrap_or(0.0);
            (value - ideal).powi(2)
        })
        .sum::<f64>()
        / Sector::ALL.len() as f64;

    avg_volatility * 100.0 + variance / variance_scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Instrument;
    use chrono::NaiveDate;

    fn instrument(id: &str, sector: Sector, price: f64, cost_basis: f64, volatility: f64) -> Instrument {
        Instrument {
            id: id.to_string(),
            name: format!("{} Holdings", id),
            sector,
            price,
            cost_basis,
            market_cap: 50_000.0,
            volatility,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()
    }

    #[test]
    fn test_single_position_fixture() {
        let catalog = InstrumentCatalog::from_instruments(vec![instrument(
            "QNT",
            Sector::Technology,
            100.0,
            90.0,
            0.3,
        )]);
        let holdings = vec![Holding::new("QNT", 100, date())];

        let summary = summarize(&holdings, &catalog, &HarvestingConfig::default());

        assert_eq!(summary.total_market_value, 10_000.0);
        assert_eq!(summary.total_cost_basis, 9_000.0);
        assert_eq!(summary.unrealized_pnl, 1_000.0);
        assert_eq!(summary.total_shares, 100);
        assert_eq!(summary.exposure(Sector::Technology), 100.0);
        // 0.3 * 100 + ((8750^2 + 7 * 1250^2) / 8) / 1e9
        assert!((summary.risk_score - 30.0109375).abs() < 1e-9);
    }

    #[test]
    fn test_exposure_sums_to_hundred() {
        let catalog = InstrumentCatalog::from_instruments(vec![
            instrument("A", Sector::Technology, 10.0, 10.0, 0.2),
            instrument("B", Sector::Energy, 10.0, 10.0, 0.2),
            instrument("C", Sector::Utilities, 10.0, 10.0, 0.2),
        ]);
        let holdings = vec![
            Holding::new("A", 1, date()),
            Holding::new("B", 1, date()),
            Holding::new("C", 1, date()),
        ];

        let summary = summarize(&holdings, &catalog, &HarvestingConfig::default());
        let total: f64 = summary.sector_exposure.values().sum();

        assert_eq!(summary.sector_exposure.len(), 3);
        assert!((total - 100.0).abs() < 1e-9);
        for pct in summary.sector_exposure.values() {
            assert!((pct - 33.3).abs() < 0.11);
        }
    }

    #[test]
    fn test_zero_value_portfolio_has_empty_exposure() {
        let catalog = InstrumentCatalog::from_instruments(vec![instrument(
            "DUD",
            Sector::Energy,
            0.0,
            5.0,
            0.9,
        )]);
        let holdings = vec![Holding::new("DUD", 10, date())];

        let summary = summarize(&holdings, &catalog, &HarvestingConfig::default());

        assert_eq!(summary.total_market_value, 0.0);
        assert!(summary.sector_exposure.is_empty());
        assert_eq!(summary.risk_score, 0.0);
        assert!(summary.unrealized_pnl < 0.0);
    }

    #[test]
    fn test_unknown_instrument_contributes_nothing() {
        let catalog = InstrumentCatalog::from_instruments(vec![instrument(
            "REAL",
            Sector::Healthcare,
            20.0,
            10.0,
            0.1,
        )]);
        let holdings = vec![
            Holding::new("REAL", 10, date()),
            Holding::new("GONE", 1_000, date()),
        ];

        let summary = summarize(&holdings, &catalog, &HarvestingConfig::default());

        assert_eq!(summary.total_market_value, 200.0);
        assert_eq!(summary.total_shares, 10);
        assert_eq!(summary.position_count, 1);
        assert_eq!(summary.warnings.len(), 1);
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let catalog = InstrumentCatalog::from_instruments(vec![
            instrument("A", Sector::Technology, 12.5, 10.0, 0.45),
            instrument("B", Sector::Financials, 7.0, 9.0, 0.15),
        ]);
        let holdings = vec![Holding::new("A", 40, date()), Holding::new("B", 70, date())];
        let config = HarvestingConfig::default();

        let first = summarize(&holdings, &catalog, &config);
        let second = summarize(&holdings, &catalog, &config);

        assert_eq!(first, second);
    }
}
