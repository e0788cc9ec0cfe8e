use crate::index::types::Strategy;
use thiserror::Error as ThisError;

/// Result alias for adapter calls
pub type Result<T> = std::result::Result<T, Error>;

/// Failures an adapter call can surface to the host.
///
/// Every variant aborts the single call that produced it. Adapters keep no
/// state between calls, so there is nothing to roll back.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{adapter} adapter does not support strategy {strategy:?}")]
    UnsupportedStrategy {
        adapter: &'static str,
        strategy: Strategy,
    },

    #[error("unknown strategy number {0}")]
    UnknownStrategyNumber(u16),

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("range summary is closed")]
    SummaryClosed,

    #[error("invalid index options: {0}")]
    InvalidOptions(String),
}

impl Error {
    pub(crate) fn unsupported(adapter: &'static str, strategy: Strategy) -> Self {
        Self::UnsupportedStrategy { adapter, strategy }
    }
}
