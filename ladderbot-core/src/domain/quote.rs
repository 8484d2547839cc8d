//! Market tick as delivered by the data feed, once per symbol per cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest market state for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub last: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    /// Dollar volume traded since the previous tick.
    pub dollar_volume: f64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, timestamp: DateTime<Utc>, last: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            last,
            bid: None,
            ask: None,
            dollar_volume: 0.0,
        }
    }

    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    pub fn with_dollar_volume(mut self, dollar_volume: f64) -> Self {
        self.dollar_volume = dollar_volume;
        self
    }

    /// Usable last price, if any.
    pub fn last_price(&self) -> Option<f64> {
        sanitize_price(Some(self.last))
    }

    pub fn mid(&self) -> Option<f64> {
        let bid = sanitize_price(self.bid)?;
        let ask = sanitize_price(self.ask)?;
        Some((bid + ask) / 2.0)
    }

    /// `(ask - bid) / mid`, or `None` when either side is missing.
    pub fn spread_fraction(&self) -> Option<f64> {
        let bid = sanitize_price(self.bid)?;
        let ask = sanitize_price(self.ask)?;
        let mid = (bid + ask) / 2.0;
        Some((ask - bid) / mid)
    }

    /// Age of the tick relative to `now`, in milliseconds.
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_milliseconds()
    }
}

/// A positive, finite price or `None`.
pub fn sanitize_price(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}
