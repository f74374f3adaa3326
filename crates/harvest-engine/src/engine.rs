use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tax_optimizer::{rank, summarize, HarvestOverview, HarvestingEngine, InstrumentCatalog, Suggestion};
use tokio::sync::{watch, Mutex, RwLock};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::executor::TradeExecutor;
use crate::providers::{HoldingsProvider, InstrumentProvider, OrderFill, OrderGateway};
use crate::session::{AnalysisReport, AnalysisSession, RunTicket, SessionState, SessionView};
use crate::store::{HoldingsSnapshot, HoldingsStore};

/// Confirmation returned for an accepted suggestion
#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub suggestion_id: String,
    pub fill: OrderFill,
    pub fully_liquidated: bool,
    /// Holdings after the trade
    pub holdings: Arc<HoldingsSnapshot>,
}

/// Command surface for the presentation layer: request an analysis, accept one of
/// its suggestions, observe the session.
pub struct HarvestEngine {
    catalog_provider: Arc<dyn InstrumentProvider>,
    holdings_provider: Arc<dyn HoldingsProvider>,
    executor: TradeExecutor,
    harvester: HarvestingEngine,
    store: HoldingsStore,
    session: AnalysisSession,
    catalog_cache: RwLock<Option<Arc<InstrumentCatalog>>>,
    /// Serializes every write to the store
    mutation_lock: Mutex<()>,
    cache_catalog: bool,
    as_of: Option<NaiveDate>,
}

impl HarvestEngine {
    pub fn new(
        config: EngineConfig,
        catalog_provider: Arc<dyn InstrumentProvider>,
        holdings_provider: Arc<dyn HoldingsProvider>,
        gateway: Arc<dyn OrderGateway>,
    ) -> Self {
        Self {
            catalog_provider,
            holdings_provider,
            executor: TradeExecutor::new(gateway),
            harvester: HarvestingEngine::with_config(config.harvesting),
            store: HoldingsStore::new(),
            session: AnalysisSession::new(),
            catalog_cache: RwLock::new(None),
            mutation_lock: Mutex::new(()),
            cache_catalog: config.cache_catalog,
            as_of: None,
        }
    }

    /// Evaluate holding periods as of a fixed date instead of today
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.session.subscribe()
    }

    pub fn holdings(&self) -> Arc<HoldingsSnapshot> {
        self.store.snapshot()
    }

    pub fn subscribe_holdings(&self) -> watch::Receiver<Arc<HoldingsSnapshot>> {
        self.store.subscribe()
    }

    /// Whether the displayed suggestions no longer match the holdings
    pub fn is_stale(&self) -> bool {
        self.session.view().is_stale(self.store.version())
    }

    /// Run a full analysis, or join the one already in flight.
    pub async fn request_analysis(&self) -> EngineResult<Arc<AnalysisReport>> {
        let generation = match self.session.begin() {
            RunTicket::Joined(generation) => {
                tracing::debug!("Joining in-flight analysis #{}", generation);
                return self.session.wait(generation).await;
            }
            RunTicket::Started(generation) => generation,
        };
        let _run = RunGuard {
            session: &self.session,
            generation,
        };

        let (catalog, snapshot) = match self.load().await {
            Ok(loaded) => loaded,
            Err(EngineError::Superseded) => return Err(EngineError::Superseded),
            Err(e) => {
                tracing::warn!("Analysis #{} failed to load data: {}", generation, e);
                self.session
                    .transition(generation, SessionState::Failed(e.clone()));
                return Err(e);
            }
        };

        let as_of = self.as_of.unwrap_or_else(|| Utc::now().date_naive());

        let report = match self.compute(generation, &catalog, &snapshot, as_of) {
            Ok(report) => Arc::new(report),
            Err(EngineError::Superseded) => return Err(EngineError::Superseded),
            Err(e) => {
                tracing::error!("Analysis #{} failed: {}", generation, e);
                self.session
                    .transition(generation, SessionState::Failed(e.clone()));
                return Err(e);
            }
        };

        if self.store.version() != report.snapshot_version {
            self.session.transition(generation, SessionState::Idle);
            return Err(EngineError::Superseded);
        }
        if !self
            .session
            .transition(generation, SessionState::Complete(report.clone()))
        {
            return Err(EngineError::Superseded);
        }

        tracing::info!(
            "Analysis #{} complete: {} suggestions, ${:.2} harvestable losses",
            generation,
            report.suggestions.len(),
            report.overview.total_harvestable_losses
        );
        Ok(report)
    }

    /// Execute one suggestion from the current report.
    pub async fn accept_suggestion(&self, suggestion: &Suggestion) -> EngineResult<TradeReceipt> {
        let _guard = self.mutation_lock.lock().await;

        let snapshot = self.store.snapshot();
        let report = self
            .session
            .view()
            .last_report
            .ok_or_else(|| EngineError::StaleSuggestion("no current analysis".to_string()))?;

        if report.snapshot_version != snapshot.version {
            return Err(EngineError::StaleSuggestion(format!(
                "suggestion {} was computed against holdings version {}, current is {}",
                suggestion.id, report.snapshot_version, snapshot.version
            )));
        }
        if report.find(&suggestion.id) != Some(suggestion) {
            return Err(EngineError::StaleSuggestion(format!(
                "suggestion {} is not part of the current analysis",
                suggestion.id
            )));
        }

        let catalog = self.catalog().await?;

        let outcome = match self.executor.execute(suggestion, &snapshot, &catalog).await {
            Ok(outcome) => outcome,
            Err(e @ EngineError::OverSell { .. }) => {
                self.session.invalidate("suggestion oversells its holding");
                return Err(e);
            }
            Err(e @ EngineError::PartialFill { .. }) => {
                // The broker traded but the store did not; force a refetch
                self.session.invalidate("order partially filled");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("Trade for {} rejected: {}", suggestion.id, e);
                return Err(e);
            }
        };

        let holdings = self.store.commit(snapshot.version, outcome.holdings)?;
        self.session.invalidate("holdings changed by trade");

        tracing::info!(
            "Accepted {}: sold {} {} ({:+.2}), holdings now version {}",
            suggestion.id,
            outcome.fill.shares,
            outcome.fill.instrument_id,
            outcome.fill.realized_gain_loss,
            holdings.version
        );

        Ok(TradeReceipt {
            suggestion_id: suggestion.id.clone(),
            fill: outcome.fill,
            fully_liquidated: outcome.fully_liquidated,
            holdings,
        })
    }

    async fn load(&self) -> EngineResult<(Arc<InstrumentCatalog>, Arc<HoldingsSnapshot>)> {
        let catalog = self.catalog().await?;

        let expected_version = self.store.version();
        let holdings = self
            .holdings_provider
            .fetch_holdings()
            .await
            .map_err(|e| EngineError::data_fetch("holdings", e))?;

        let _guard = self.mutation_lock.lock().await;
        let snapshot = self
            .store
            .install(expected_version, holdings)
            .map_err(|e| match e {
                EngineError::StaleSuggestion(_) => EngineError::Superseded,
                other => other,
            })?;

        Ok((catalog, snapshot))
    }

    async fn catalog(&self) -> EngineResult<Arc<InstrumentCatalog>> {
        if self.cache_catalog {
            if let Some(catalog) = self.catalog_cache.read().await.as_ref() {
                return Ok(catalog.clone());
            }
        }

        let instruments = self
            .catalog_provider
            .fetch_instruments()
            .await
            .map_err(|e| EngineError::data_fetch("instrument catalog", e))?;
        let catalog = Arc::new(InstrumentCatalog::from_instruments(instruments));

        if self.cache_catalog {
            *self.catalog_cache.write().await = Some(catalog.clone());
        }
        Ok(catalog)
    }

    /// Summary, suggestions and ranking for one snapshot. Panics in the pipeline are
    /// reported as `EngineError::Analysis`.
    fn compute(
        &self,
        generation: u64,
        catalog: &InstrumentCatalog,
        snapshot: &HoldingsSnapshot,
        as_of: NaiveDate,
    ) -> EngineResult<AnalysisReport> {
        let summary = guarded(|| summarize(&snapshot.holdings, catalog, self.harvester.config()))?;
        let summary = Arc::new(summary);

        if !self
            .session
            .transition(generation, SessionState::Ready(summary.clone()))
            || !self
                .session
                .transition(generation, SessionState::Analyzing(summary.clone()))
        {
            return Err(EngineError::Superseded);
        }

        let suggestions = guarded(|| {
            rank(
                self.harvester
                    .analyze(&snapshot.holdings, &summary, catalog, as_of),
            )
        })?;
        let overview = HarvestOverview::from_suggestions(&suggestions);

        Ok(AnalysisReport {
            snapshot_version: snapshot.version,
            as_of,
            summary: Arc::unwrap_or_clone(summary),
            suggestions,
            overview,
        })
    }
}

/// Returns an unsettled run to `Idle` when `request_analysis` is dropped mid-flight
struct RunGuard<'a> {
    session: &'a AnalysisSession,
    generation: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.session.abandon(self.generation);
    }
}

fn guarded<T>(f: impl FnOnce() -> T) -> EngineResult<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        EngineError::Analysis(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{PaperBroker, StaticCatalog};
    use tax_optimizer::{Holding, Instrument, Sector};

    fn engine() -> (HarvestEngine, Arc<PaperBroker>) {
        let as_of = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let catalog = StaticCatalog::new(vec![Instrument {
            id: "DRP".to_string(),
            name: "Dropline Analytics".to_string(),
            sector: Sector::Technology,
            price: 80.0,
            cost_basis: 100.0,
            market_cap: 20_000.0,
            volatility: 0.2,
        }]);
        let broker = Arc::new(PaperBroker::new(vec![Holding::new(
            "DRP",
            50,
            as_of - chrono::Duration::days(100),
        )]));
        let engine = HarvestEngine::new(
            EngineConfig::default(),
            Arc::new(catalog),
            broker.clone(),
            broker.clone(),
        )
        .with_as_of(as_of);
        (engine, broker)
    }

    #[tokio::test]
    async fn test_oversell_invalidates_session() {
        let (engine, broker) = engine();
        let report = engine.request_analysis().await.unwrap();

        // Publish a report whose only suggestion sells more than is held
        let mut oversized = (*report).clone();
        oversized.suggestions[0].shares_to_sell = 75;
        let suggestion = oversized.suggestions[0].clone();
        let RunTicket::Started(generation) = engine.session.begin() else {
            panic!("expected a new run");
        };
        assert!(engine
            .session
            .transition(generation, SessionState::Complete(Arc::new(oversized))));

        let err = engine.accept_suggestion(&suggestion).await.unwrap_err();

        assert_eq!(
            err,
            EngineError::OverSell {
                instrument_id: "DRP".to_string(),
                requested: 75,
                held: 50,
            }
        );
        let view = engine.view();
        assert!(matches!(view.state, SessionState::Idle));
        assert!(view.last_report.is_none());
        assert_eq!(engine.holdings().version, report.snapshot_version);
        assert!(broker.fills().await.is_empty());

        // Nothing from the discarded report can be accepted until analysis re-runs
        let retry = engine
            .accept_suggestion(&report.suggestions[0])
            .await
            .unwrap_err();
        assert!(matches!(retry, EngineError::StaleSuggestion(_)));
    }

    #[test]
    fn test_guarded_reports_panics_as_analysis_errors() {
        let err = guarded(|| -> u32 { panic!("division by zero in risk score") }).unwrap_err();
        assert_eq!(
            err,
            EngineError::Analysis("division by zero in risk score".to_string())
        );
        assert_eq!(guarded(|| 7).unwrap(), 7);
    }
}
