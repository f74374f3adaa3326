//! In-memory feeds and a paper order gateway.

use crate::providers::{HoldingsProvider, InstrumentProvider, OrderFill, OrderGateway, SellOrder};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tax_optimizer::{Holding, Instrument};
use tokio::sync::RwLock;

/// Catalog served from a fixed instrument list
pub struct StaticCatalog {
    instruments: Vec<Instrument>,
}

impl StaticCatalog {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }
}

#[async_trait]
impl InstrumentProvider for StaticCatalog {
    async fn fetch_instruments(&self) -> Result<Vec<Instrument>> {
        Ok(self.instruments.clone())
    }
}

/// Paper brokerage: serves holdings from an in-memory book and fills sells against it
pub struct PaperBroker {
    book: RwLock<Vec<Holding>>,
    fills: RwLock<Vec<OrderFill>>,
    latency: Duration,
}

impl PaperBroker {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self {
            book: RwLock::new(holdings),
            fills: RwLock::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fills executed so far, oldest first
    pub async fn fills(&self) -> Vec<OrderFill> {
        self.fills.read().await.clone()
    }

    async fn simulate_round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl HoldingsProvider for PaperBroker {
    async fn fetch_holdings(&self) -> Result<Vec<Holding>> {
        self.simulate_round_trip().await;
        Ok(self.book.read().await.clone())
    }
}

#[async_trait]
impl OrderGateway for PaperBroker {
    async fn submit_sell(&self, order: SellOrder) -> Result<OrderFill> {
        self.simulate_round_trip().await;

        let mut book = self.book.write().await;
        let Some(idx) = book
            .iter()
            .position(|h| h.instrument_id == order.instrument_id)
        else {
            bail!("no position in {}", order.instrument_id);
        };

        let held = book[idx].shares;
        if order.shares == 0 || order.shares > held {
            bail!(
                "invalid quantity {} for {} ({} held)",
                order.shares,
                order.instrument_id,
                held
            );
        }

        if order.shares == held {
            book.remove(idx);
        } else {
            book[idx].shares = held - order.shares;
        }

        let fill = OrderFill {
            order_id: order.order_id,
            instrument_id: order.instrument_id,
            shares: order.shares,
            fill_price: order.reference_price,
            realized_gain_loss: order.shares as f64
                * (order.reference_price - order.cost_basis_per_share),
            filled_at: Utc::now(),
        };

        tracing::debug!(
            "Paper fill {}: sold {} {} @ ${:.2}",
            fill.order_id,
            fill.shares,
            fill.instrument_id,
            fill.fill_price
        );

        self.fills.write().await.push(fill.clone());
        Ok(fill)
    }

    fn gateway_name(&self) -> &str {
        "paper"
    }
}
