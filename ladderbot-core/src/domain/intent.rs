//! Order intents: what the engine wants the gateway to do this cycle.
//!
//! Intents are never fills. They are handed to the external order gateway and
//! only change position state once a fill is confirmed.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::quote::{sanitize_price, Tick};
use super::rung::RungIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Why an intent was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentReason {
    Ladder,
    HardStop,
    TrailingStop,
    Breakeven,
    ShortCover,
}

impl IntentReason {
    /// Protective exits and short covers: ungated and never spread-filtered.
    pub fn is_protective(self) -> bool {
        matches!(
            self,
            IntentReason::HardStop | IntentReason::TrailingStop | IntentReason::ShortCover
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntentReason::Ladder => "ladder",
            IntentReason::HardStop => "hard_stop",
            IntentReason::TrailingStop => "trailing_stop",
            IntentReason::Breakeven => "breakeven",
            IntentReason::ShortCover => "short_cover",
        }
    }
}

impl fmt::Display for IntentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Urgent,
}

/// How the gateway should price the order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PriceMode {
    /// Immediate-or-cancel limit order priced through the touch.
    Ioc { limit_price: f64, urgency: Urgency },
}

impl PriceMode {
    pub fn limit_price(&self) -> f64 {
        match self {
            PriceMode::Ioc { limit_price, .. } => *limit_price,
        }
    }
}

/// IOC limit price for `side` given the current tick.
///
/// Buys lift from the highest of last/ask/bid, sells hit from the lowest of
/// last/bid, each pushed through by `bump`. Never below one cent.
pub fn ioc_limit(side: Side, tick: &Tick, bump: f64) -> f64 {
    let refs: Vec<f64> = match side {
        Side::Buy => [Some(tick.last), tick.ask, tick.bid]
            .into_iter()
            .filter_map(sanitize_price)
            .collect(),
        Side::Sell => [Some(tick.last), tick.bid]
            .into_iter()
            .filter_map(sanitize_price)
            .collect(),
    };
    let limit = match side {
        Side::Buy => refs.iter().copied().fold(0.01_f64, f64::max) * (1.0 + bump),
        Side::Sell => refs.iter().copied().reduce(f64::min).unwrap_or(0.01) * (1.0 - bump),
    };
    ((limit * 10_000.0).round() / 10_000.0).max(0.01)
}

/// Monotonic intent id assigned by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentId(pub u64);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intent-{}", self.0)
    }
}

/// Identity used to detect re-derived intents: two intents with the same key
/// are the same instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentKey {
    pub symbol: String,
    pub side: Side,
    pub reason: IntentReason,
    pub rung: Option<RungIndex>,
}

/// One order instruction for the external gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub id: IntentId,
    pub symbol: String,
    pub side: Side,
    /// Whole shares.
    pub quantity: f64,
    pub price_mode: PriceMode,
    pub rung: Option<RungIndex>,
    pub reason: IntentReason,
    /// USD clip the rung was sized with (ladder buys only).
    pub clip_usd: Option<f64>,
}

impl OrderIntent {
    pub fn key(&self) -> IntentKey {
        IntentKey {
            symbol: self.symbol.clone(),
            side: self.side,
            reason: self.reason,
            rung: self.rung,
        }
    }
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} x{} @ {:.4} ({}",
            self.id,
            self.side,
            self.symbol,
            self.quantity,
            self.price_mode.limit_price(),
            self.reason
        )?;
        if let Some(rung) = self.rung {
            write!(f, " {rung}")?;
        }
        write!(f, ")")
    }
}
