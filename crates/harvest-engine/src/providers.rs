use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tax_optimizer::{Holding, Instrument};

// ---------------------------------------------------------------------------
// Data feeds
// ---------------------------------------------------------------------------

/// Source of instrument reference data
#[async_trait]
pub trait InstrumentProvider: Send + Sync {
    /// Fetch every instrument the catalog knows about
    async fn fetch_instruments(&self) -> Result<Vec<Instrument>>;
}

/// Source of the account's current positions
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// Fetch all open holdings
    async fn fetch_holdings(&self) -> Result<Vec<Holding>>;
}

// ---------------------------------------------------------------------------
// Order routing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellOrder {
    pub order_id: String,
    pub instrument_id: String,
    pub shares: u64,
    /// Price the suggestion was computed at
    pub reference_price: f64,
    pub cost_basis_per_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: String,
    pub instrument_id: String,
    pub shares: u64,
    pub fill_price: f64,
    pub realized_gain_loss: f64,
    pub filled_at: DateTime<Utc>,
}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit a market sell and wait for the fill
    async fn submit_sell(&self, order: SellOrder) -> Result<OrderFill>;

    /// Gateway name for logging
    fn gateway_name(&self) -> &str;
}
