use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Data fetch error ({feed}): {message}")]
    DataFetch { feed: String, message: String },

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("No holding for instrument: {0}")]
    HoldingNotFound(String),

    #[error("Cannot sell {requested} shares of {instrument_id}: only {held} held")]
    OverSell {
        instrument_id: String,
        requested: u64,
        held: u64,
    },

    #[error("Holdings feed returned more than one lot of {0}")]
    DuplicateHolding(String),

    #[error("Order {order_id} filled {filled} of {requested} shares")]
    PartialFill {
        order_id: String,
        requested: u64,
        filled: u64,
    },

    #[error("Stale suggestion: {0}")]
    StaleSuggestion(String),

    #[error("Analysis superseded by a holdings change")]
    Superseded,

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),
}

impl EngineError {
    pub fn data_fetch(feed: &str, err: anyhow::Error) -> Self {
        Self::DataFetch {
            feed: feed.to_string(),
            message: format!("{:#}", err),
        }
    }

    /// Whether re-requesting analysis can clear the error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::DataFetch { .. }
                | EngineError::Superseded
                | EngineError::StaleSuggestion(_)
                | EngineError::OverSell { .. }
                | EngineError::PartialFill { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
