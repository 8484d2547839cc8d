use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::intent::{IntentReason, Side};
use super::rung::RungIndex;

/// Execution confirmed by the gateway for one intent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Whole shares actually filled (may be less than requested for IOC).
    pub quantity: f64,
    /// Average fill price.
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// What the gateway made of a submitted intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubmissionOutcome {
    Filled(Fill),
    /// Declined or timed out. Treated as "not filled".
    Rejected { reason: String },
}

/// Structured record emitted for every confirmed fill, for the external
/// fill logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub rung: Option<RungIndex>,
    pub reason: IntentReason,
    /// `(price - average cost) * quantity` for sells; zero for buys.
    pub realized_pnl: f64,
}
