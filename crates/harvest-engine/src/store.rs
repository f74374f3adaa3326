//! Holdings Store
//!
//! Copy-on-write, versioned view of the account's positions. Readers always get a
//! complete `Arc<HoldingsSnapshot>`; writers replace the snapshot wholesale.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tax_optimizer::Holding;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    /// Incremented on every content change
    pub version: u64,
    pub holdings: Vec<Holding>,
}

impl HoldingsSnapshot {
    pub fn total_shares(&self) -> u64 {
        self.holdings.iter().map(|h| h.shares).sum()
    }

    pub fn find(&self, instrument_id: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.instrument_id == instrument_id)
    }
}

pub struct HoldingsStore {
    tx: watch::Sender<Arc<HoldingsSnapshot>>,
}

impl Default for HoldingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldingsStore {
    /// Empty store at version 0
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(HoldingsSnapshot {
            version: 0,
            holdings: Vec::new(),
        }));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<HoldingsSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Receive every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<HoldingsSnapshot>> {
        self.tx.subscribe()
    }

    /// Install freshly fetched holdings if the store is still at `expected_version`.
    /// The version only advances when the content differs.
    pub(crate) fn install(
        &self,
        expected_version: u64,
        holdings: Vec<Holding>,
    ) -> EngineResult<Arc<HoldingsSnapshot>> {
        self.replace(expected_version, holdings, false)
    }

    /// Publish holdings produced by a trade against the snapshot at `based_on`.
    pub(crate) fn commit(
        &self,
        based_on: u64,
        holdings: Vec<Holding>,
    ) -> EngineResult<Arc<HoldingsSnapshot>> {
        self.replace(based_on, holdings, true)
    }

    fn replace(
        &self,
        expected_version: u64,
        holdings: Vec<Holding>,
        always_bump: bool,
    ) -> EngineResult<Arc<HoldingsSnapshot>> {
        check_single_lots(&holdings)?;

        let mut outcome = Err(EngineError::Superseded);

        self.tx.send_if_modified(|current| {
            if current.version != expected_version {
                outcome = Err(EngineError::StaleSuggestion(format!(
                    "holdings moved from version {} to {}",
                    expected_version, current.version
                )));
                return false;
            }
            if !always_bump && current.holdings == holdings {
                outcome = Ok(current.clone());
                return false;
            }

            let next = Arc::new(HoldingsSnapshot {
                version: current.version + 1,
                holdings,
            });
            *current = next.clone();
            outcome = Ok(next);
            true
        });

        if let Ok(snapshot) = &outcome {
            tracing::debug!(
                "Holdings store at version {} ({} positions)",
                snapshot.version,
                snapshot.holdings.len()
            );
        }
        outcome
    }
}

/// Holdings carry one lot per instrument; a feed that returns two is rejected whole.
fn check_single_lots(holdings: &[Holding]) -> EngineResult<()> {
    let mut seen = HashSet::with_capacity(holdings.len());
    for holding in holdings {
        if !seen.insert(holding.instrument_id.as_str()) {
            tracing::warn!(
                "Rejecting holdings: more than one lot of {}",
                holding.instrument_id
            );
            return Err(EngineError::DuplicateHolding(holding.instrument_id.clone()));
        }
    }
    Ok(())
}
