//! Tax Optimizer
//!
//! Portfolio summary and tax-lot harvesting suggestions: loss realization,
//! gain rebalancing and priority ranking. Everything here is pure and synchronous.

pub mod config;
pub mod harvester;
pub mod lot;
pub mod models;
pub mod ranker;
pub mod summary;

pub use config::HarvestingConfig;
pub use harvester::{HarvestAnalysis, HarvestOverview, HarvestingEngine};
pub use lot::{resolve_holdings, HoldingPeriod, LotMetrics, ResolvedHolding};
pub use models::{
    AnalysisWarning, Holding, Instrument, InstrumentCatalog, Sector, Strategy, Suggestion,
};
pub use ranker::rank;
pub use summary::{summarize, PortfolioSummary, PositionSnapshot};
