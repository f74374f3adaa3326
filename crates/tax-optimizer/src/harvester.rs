//! Tax-Loss Harvesting Engine
//!
//! Turns a portfolio into sell suggestions: full-lot loss realization plus partial
//! gain trims that offset those losses or reduce concentration.

use crate::config::HarvestingConfig;
use crate::lot::{resolve_holdings, LotMetrics, ResolvedHolding};
use crate::models::{Holding, InstrumentCatalog, Strategy, Suggestion};
use crate::ranker::rank;
use crate::summary::{summarize, PortfolioSummary};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of one full pass: summary, ranked suggestions and their overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestAnalysis {
    pub summary: PortfolioSummary,
    pub suggestions: Vec<Suggestion>,
    pub overview: HarvestOverview,
}

/// Engine for generating harvesting suggestions
#[derive(Debug, Clone, Default)]
pub struct HarvestingEngine {
    config: HarvestingConfig,
}

impl HarvestingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HarvestingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarvestingConfig {
        &self.config
    }

    /// Summarize, analyze and rank in one synchronous pass.
    pub fn run(
        &self,
        holdings: &[Holding],
        catalog: &InstrumentCatalog,
        as_of: NaiveDate,
    ) -> HarvestAnalysis {
        let summary = summarize(holdings, catalog, &self.config);
        let suggestions = rank(self.analyze(holdings, &summary, catalog, as_of));
        let overview = HarvestOverview::from_suggestions(&suggestions);

        HarvestAnalysis {
            summary,
            suggestions,
            overview,
        }
    }

    /// Produce unranked suggestions. Every losing lot is proposed for full liquidation;
    /// gaining lots are trimmed only when losses exist to offset or the lot is an
    /// overweight, volatile, long-term position.
    pub fn analyze(
        &self,
        holdings: &[Holding],
        summary: &PortfolioSummary,
        catalog: &InstrumentCatalog,
        as_of: NaiveDate,
    ) -> Vec<Suggestion> {
        let (resolved, _) = resolve_holdings(holdings, catalog);

        let evaluated: Vec<(ResolvedHolding<'_>, LotMetrics)> = resolved
            .into_iter()
            .map(|r| {
                let metrics = LotMetrics::evaluate(
                    r.holding,
                    r.instrument,
                    as_of,
                    self.config.long_term_threshold_days,
                );
                (r, metrics)
            })
            .collect();

        let mut suggestions: Vec<Suggestion> = evaluated
            .iter()
            .filter(|(_, m)| m.unrealized_pnl < 0.0)
            .map(|(r, m)| self.loss_suggestion(r, m))
            .collect();

        let has_losses = !suggestions.is_empty();

        for (r, m) in evaluated.iter().filter(|(_, m)| m.unrealized_pnl > 0.0) {
            if let Some(s) = self.gain_suggestion(r, m, summary.total_market_value, has_losses) {
                suggestions.push(s);
            }
        }

        tracing::debug!(
            "Generated {} suggestions ({} losses) as of {}",
            suggestions.len(),
            suggestions.iter().filter(|s| s.is_loss()).count(),
            as_of
        );

        suggestions
    }

    fn loss_suggestion(&self, r: &ResolvedHolding<'_>, m: &LotMetrics) -> Suggestion {
        let cfg = &self.config;
        let instrument = r.instrument;
        let mut notes = Vec::new();

        let mut priority = cfg.default_loss_priority;
        if instrument.volatility > cfg.high_volatility_threshold {
            priority = cfg.high_volatility_priority;
            notes.push(format!("high volatility ({:.2})", instrument.volatility));
        }
        if instrument.market_cap < cfg.small_cap_threshold {
            priority = cfg.small_cap_priority;
            notes.push(format!("small-cap exposure (${:.0}M)", instrument.market_cap));
        }

        let strategy = if m.is_long_term() {
            priority = priority.min(cfg.long_term_loss_priority);
            notes.push("long-term loss can be carried forward".to_string());
            Strategy::LossCarryforward
        } else {
            notes.push("avoid repurchasing within the wash sale window".to_string());
            Strategy::WashSaleAvoidance
        };

        let mut rationale = format!(
            "Sell all {} shares of {} to realize a ${:.2} {} loss ({:.1}% below cost, held {} days)",
            m.shares,
            instrument.name,
            m.unrealized_pnl.abs(),
            m.holding_period,
            m.unrealized_pnl_percent().abs(),
            m.days_held
        );
        rationale.push_str("; ");
        rationale.push_str(&notes.join("; "));

        Suggestion {
            id: suggestion_id(r.index, &instrument.id, strategy),
            instrument_id: instrument.id.clone(),
            shares_to_sell: m.shares,
            realized_gain_loss: m.unrealized_pnl,
            strategy,
            rationale,
            confidence: cfg.loss_confidence,
            priority,
        }
    }

    fn gain_suggestion(
        &self,
        r: &ResolvedHolding<'_>,
        m: &LotMetrics,
        total_market_value: f64,
        has_losses: bool,
    ) -> Option<Suggestion> {
        let cfg = &self.config;
        let instrument = r.instrument;

        // Tolerance keeps exact products like 0.15 * 60 from flooring one share short
        let shares_to_sell = (m.shares as f64 * cfg.rebalance_fraction + 1e-9).floor() as u64;
        if shares_to_sell == 0 {
            return None;
        }

        let weight = if total_market_value > 0.0 {
            m.market_value / total_market_value
        } else {
            0.0
        };
        let overweight = weight > cfg.overweight_threshold;
        let concentrated = overweight
            && instrument.volatility > cfg.overweight_volatility
            && m.is_long_term();

        if !has_losses && !concentrated {
            return None;
        }

        let realized_gain_loss = shares_to_sell as f64 * (instrument.price - instrument.cost_basis);

        let mut rationale = format!(
            "Trim {} of {} shares of {} to realize a ${:.2} {} gain",
            shares_to_sell, m.shares, instrument.name, realized_gain_loss, m.holding_period
        );
        if has_losses {
            rationale.push_str("; offsets losses harvested in this batch");
        }
        if overweight {
            rationale.push_str(&format!(
                "; position is {:.1}% of the portfolio",
                weight * 100.0
            ));
        }

        Some(Suggestion {
            id: suggestion_id(r.index, &instrument.id, Strategy::Rebalancing),
            instrument_id: instrument.id.clone(),
            shares_to_sell,
            realized_gain_loss,
            strategy: Strategy::Rebalancing,
            rationale,
            confidence: cfg.gain_confidence,
            priority: if overweight {
                cfg.overweight_priority
            } else {
                cfg.default_gain_priority
            },
        })
    }
}

fn suggestion_id(holding_index: usize, instrument_id: &str, strategy: Strategy) -> String {
    format!("HRV-{:04}-{}-{}", holding_index, instrument_id, strategy.code())
}

/// Aggregate figures over a batch of suggestions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestOverview {
    pub total_suggestions: usize,
    /// Sum of realized losses, as a positive number
    pub total_harvestable_losses: f64,
    pub total_realized_gains: f64,
    /// Gains minus losses
    pub net_realized: f64,
    pub by_strategy: BTreeMap<Strategy, usize>,
    /// Suggestions with priority 2 or more urgent
    pub urgent_suggestions: usize,
}

impl HarvestOverview {
    pub fn from_suggestions(suggestions: &[Suggestion]) -> Self {
        let total_harvestable_losses: f64 = suggestions
            .iter()
            .filter(|s| s.is_loss())
            .map(|s| s.impact())
            .sum();
        let total_realized_gains: f64 = suggestions
            .iter()
            .filter(|s| s.realized_gain_loss > 0.0)
            .map(|s| s.realized_gain_loss)
            .sum();

        let mut by_strategy = BTreeMap::new();
        for s in suggestions {
            *by_strategy.entry(s.strategy).or_insert(0) += 1;
        }

        Self {
            total_suggestions: suggestions.len(),
            total_harvestable_losses,
            total_realized_gains,
            net_realized: total_realized_gains - total_harvestable_losses,
            by_strategy,
            urgent_suggestions: suggestions.iter().filter(|s| s.priority <= 2).count(),
        }
    }
}
