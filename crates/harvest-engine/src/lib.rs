//! Harvest Engine
//!
//! Asynchronous shell around the tax optimizer: data feeds, a versioned holdings
//! store, single-flight analysis sessions and trade execution.

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod paper;
pub mod providers;
pub mod session;
pub mod store;


pub use config::EngineConfig;
pub use engine::{HarvestEngine, TradeReceipt};
pub use error::{EngineError, EngineResult};
pub use executor::{ExecutionOutcome, TradeExecutor};
pub use paper::{PaperBroker, StaticCatalog};
pub use providers::{HoldingsProvider, InstrumentProvider, OrderFill, OrderGateway, SellOrder};
pub use session::{AnalysisReport, AnalysisSession, RunTicket, SessionState, SessionView};
pub use store::{HoldingsSnapshot, HoldingsStore};
