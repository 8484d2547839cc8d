//! Error taxonomy for the ladder engine.
//!
//! Nothing here is fatal to the process. Per-symbol conditions
//! (`InsufficientData`, `StaleQuote`, `NoQuote`, `OutsideSession`) are reported back to the
//! caller as skips inside the cycle output; `ConfigInvalid` is the only variant
//! that should stop startup.

use thiserror::Error;

/// Errors from configuration, evaluation, and boundary operations.
#[derive(Debug, Error)]
pub enum LadderError {
    #[error("{symbol}: no anchor source available")]
    InsufficientData { symbol: String },

    #[error("{symbol}: quote is {age_ms} ms old (max {max_ms} ms)")]
    StaleQuote {
        symbol: String,
        age_ms: i64,
        max_ms: i64,
    },

    #[error("{symbol}: no usable quote this cycle")]
    NoQuote { symbol: String },

    #[error("{symbol}: outside trading hours")]
    OutsideSession { symbol: String },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("{symbol}: internal position {internal} differs from broker {broker}")]
    ReconciliationMismatch {
        symbol: String,
        internal: f64,
        broker: f64,
    },

    #[error("{symbol}: submission rejected ({reason})")]
    SubmissionRejected { symbol: String, reason: String },

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LadderError {
    /// Shorthand used by the config validators.
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        LadderError::ConfigInvalid(msg.into())
    }

    /// True for conditions that skip a symbol for one cycle only.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            LadderError::InsufficientData { .. }
                | LadderError::StaleQuote { .. }
                | LadderError::NoQuote { .. }
                | LadderError::OutsideSession { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LadderError>;
