//! Analysis Session
//!
//! Lifecycle of one portfolio's analysis: `Idle -> Loading -> Ready -> Analyzing ->
//! Complete | Failed`. Every run is tagged with a generation; invalidating the
//! session bumps the generation so results from an older run are dropped.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tax_optimizer::{HarvestOverview, PortfolioSummary, Suggestion};
use tokio::sync::watch;

use crate::error::{EngineError, EngineResult};

/// Ranked suggestions together with the snapshot they were computed from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub snapshot_version: u64,
    pub as_of: NaiveDate,
    pub summary: PortfolioSummary,
    pub suggestions: Vec<Suggestion>,
    pub overview: HarvestOverview,
}

impl AnalysisReport {
    pub fn find(&self, suggestion_id: &str) -> Option<&Suggestion> {
        self.suggestions.iter().find(|s| s.id == suggestion_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Ready(Arc<PortfolioSummary>),
    Analyzing(Arc<PortfolioSummary>),
    Complete(Arc<AnalysisReport>),
    Failed(#[serde(serialize_with = "serialize_error")] EngineError),
}

fn serialize_error<S: serde::Serializer>(err: &EngineError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&err.to_string())
}

impl SessionState {
    /// A run is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Loading | SessionState::Ready(_) | SessionState::Analyzing(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready(_) => "ready",
            SessionState::Analyzing(_) => "analyzing",
            SessionState::Complete(_) => "complete",
            SessionState::Failed(_) => "failed",
        }
    }
}

/// What the presentation layer sees: the current state plus the last good report.
/// The report stays visible after a failed run and is dropped on invalidation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub last_report: Option<Arc<AnalysisReport>>,
    pub generation: u64,
}

impl SessionView {
    /// The last report no longer describes the holdings at `current_version`, or no
    /// completed result is current.
    pub fn is_stale(&self, current_version: u64) -> bool {
        match (&self.state, &self.last_report) {
            (SessionState::Complete(report), _) => report.snapshot_version != current_version,
            _ => true,
        }
    }
}

/// Outcome of asking the session to start a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTicket {
    /// Caller owns the new run with this generation
    Started(u64),
    /// A run with this generation is already in flight
    Joined(u64),
}

pub struct AnalysisSession {
    tx: watch::Sender<SessionView>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionView {
            state: SessionState::Idle,
            last_report: None,
            generation: 0,
        });
        Self { tx }
    }

    pub fn view(&self) -> SessionView {
        self.tx.borrow().clone()
    }

    /// Stream of every published view
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.tx.subscribe()
    }

    /// Start a run unless one is already in flight.
    pub fn begin(&self) -> RunTicket {
        let mut ticket = RunTicket::Joined(0);
        self.tx.send_if_modified(|view| {
            if view.state.is_busy() {
                ticket = RunTicket::Joined(view.generation);
                return false;
            }
            view.generation += 1;
            view.state = SessionState::Loading;
            ticket = RunTicket::Started(view.generation);
            true
        });

        tracing::debug!("Analysis session: {:?}", ticket);
        ticket
    }

    /// Move the run `generation` to `state`. Returns false when the run has been
    /// invalidated, in which case nothing is published.
    pub fn transition(&self, generation: u64, state: SessionState) -> bool {
        let label = state.label();
        let applied = self.tx.send_if_modified(|view| {
            if view.generation != generation {
                return false;
            }
            if let SessionState::Complete(report) = &state {
                view.last_report = Some(report.clone());
            }
            view.state = state;
            true
        });

        if applied {
            tracing::debug!("Analysis session #{} -> {}", generation, label);
        } else {
            tracing::info!(
                "Discarding {} result from superseded run #{}",
                label,
                generation
            );
        }
        applied
    }

    /// Return run `generation` to `Idle` if it is still in flight. Used when the
    /// task driving the run goes away before the run settles.
    pub fn abandon(&self, generation: u64) {
        let abandoned = self.tx.send_if_modified(|view| {
            if view.generation != generation || !view.state.is_busy() {
                return false;
            }
            view.state = SessionState::Idle;
            true
        });

        if abandoned {
            tracing::info!("Analysis #{} abandoned before completion", generation);
        }
    }

    /// Drop any in-flight or completed result and return to `Idle`.
    pub fn invalidate(&self, reason: &str) {
        self.tx.send_modify(|view| {
            view.generation += 1;
            view.state = SessionState::Idle;
            view.last_report = None;
        });
        tracing::info!("Analysis session invalidated: {}", reason);
    }

    /// Wait for run `generation` to settle.
    pub async fn wait(&self, generation: u64) -> EngineResult<Arc<AnalysisReport>> {
        let mut rx = self.tx.subscribe();
        let view = rx
            .wait_for(|v| v.generation != generation || !v.state.is_busy())
            .await
            .map_err(|_| EngineError::Superseded)?
            .clone();

        if view.generation != generation {
            return Err(EngineError::Superseded);
        }
        match view.state {
            SessionState::Complete(report) => Ok(report),
            SessionState::Failed(err) => Err(err),
            _ => Err(EngineError::Superseded),
        }
    }
}
