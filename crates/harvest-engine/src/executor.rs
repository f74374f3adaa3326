use std::sync::Arc;

use serde::Serialize;
use tax_optimizer::{Holding, InstrumentCatalog, Suggestion};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::providers::{OrderFill, OrderGateway, SellOrder};
use crate::store::HoldingsSnapshot;

/// Result of a filled suggestion: the fill and the holdings that follow from it
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub fill: OrderFill,
    pub holdings: Vec<Holding>,
    pub fully_liquidated: bool,
}

pub struct TradeExecutor {
    gateway: Arc<dyn OrderGateway>,
}

impl TradeExecutor {
    pub fn new(gateway: Arc<dyn OrderGateway>) -> Self {
        Self { gateway }
    }

    /// Route a suggested sale and derive the post-trade holdings.
    /// The input snapshot is never modified.
    pub async fn execute(
        &self,
        suggestion: &Suggestion,
        snapshot: &HoldingsSnapshot,
        catalog: &InstrumentCatalog,
    ) -> EngineResult<ExecutionOutcome> {
        let instrument = catalog
            .get(&suggestion.instrument_id)
            .ok_or_else(|| EngineError::UnknownInstrument(suggestion.instrument_id.clone()))?;

        let idx = snapshot
            .holdings
            .iter()
            .position(|h| h.instrument_id == suggestion.instrument_id)
            .ok_or_else(|| EngineError::HoldingNotFound(suggestion.instrument_id.clone()))?;
        let held = snapshot.holdings[idx].shares;

        if suggestion.shares_to_sell == 0 {
            return Err(EngineError::OrderRejected(format!(
                "suggestion {} sells zero shares",
                suggestion.id
            )));
        }
        if suggestion.shares_to_sell > held {
            return Err(EngineError::OverSell {
                instrument_id: suggestion.instrument_id.clone(),
                requested: suggestion.shares_to_sell,
                held,
            });
        }

        let order = SellOrder {
            order_id: Uuid::new_v4().to_string(),
            instrument_id: instrument.id.clone(),
            shares: suggestion.shares_to_sell,
            reference_price: instrument.price,
            cost_basis_per_share: instrument.cost_basis,
        };

        tracing::info!(
            "Executing {} via {}: sell {} {} @ ~${:.2} ({})",
            suggestion.id,
            self.gateway.gateway_name(),
            order.shares,
            order.instrument_id,
            order.reference_price,
            suggestion.strategy
        );

        let fill = self
            .gateway
            .submit_sell(order)
            .await
            .map_err(|e| EngineError::OrderRejected(format!("{:#}", e)))?;

        if fill.shares != suggestion.shares_to_sell {
            tracing::warn!(
                "Order {} for {} filled {} of {} shares",
                fill.order_id,
                suggestion.id,
                fill.shares,
                suggestion.shares_to_sell
            );
            return Err(EngineError::PartialFill {
                order_id: fill.order_id,
                requested: suggestion.shares_to_sell,
                filled: fill.shares,
            });
        }

        let mut holdings = snapshot.holdings.clone();
        let remaining = held - fill.shares;
        let fully_liquidated = remaining == 0;
        if fully_liquidated {
            holdings.remove(idx);
        } else {
            holdings[idx].shares = remaining;
        }

        Ok(ExecutionOutcome {
            fill,
            holdings,
            fully_liquidated,
        })
    }
}
