//! Anchor blending: one reference price per symbol from three session medians.
//!
//! Sources are the premarket median, the initial-balance median (first half
//! hour of regular trading) and the regular-hours median. Unavailable sources
//! drop out and the remaining weights renormalise. With no source at all the
//! symbol has no anchor and its ladder is skipped for the cycle.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AnchorWeights, TradingHours};
use crate::domain::sanitize_price;
use crate::error::{LadderError, Result};

/// Weights for `blend_lookback`, most recent day first.
pub const LOOKBACK_WEIGHTS: [f64; 5] = [5.0, 4.0, 3.0, 2.0, 1.0];

/// Minutes after the open that make up the initial balance.
const INITIAL_BALANCE_MINUTES: i64 = 30;

/// The three reference medians for a session. `None` means unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMedians {
    pub premarket: Option<f64>,
    pub initial_balance: Option<f64>,
    pub regular_hours: Option<f64>,
}

impl SessionMedians {
    pub fn new(premarket: Option<f64>, initial_balance: Option<f64>, regular_hours: Option<f64>) -> Self {
        Self {
            premarket,
            initial_balance,
            regular_hours,
        }
    }

    /// Medians from one session of minute bars.
    ///
    /// Premarket is everything before the open, the initial balance is the
    /// first thirty minutes after it, and regular hours is everything from the
    /// open onward. Bars with unusable closes are ignored.
    pub fn from_bars(bars: &[MinuteBar], hours: &TradingHours) -> Self {
        let ib_end = hours.open + chrono::Duration::minutes(INITIAL_BALANCE_MINUTES);
        let mut pre = Vec::new();
        let mut ib = Vec::new();
        let mut rth = Vec::new();
        for bar in bars {
            let (Some(close), Some(t)) = (sanitize_price(Some(bar.close)), hours.local_time(bar.timestamp)) else {
                continue;
            };
            if t < hours.open {
                pre.push(close);
            } else {
                rth.push(close);
                if t < ib_end {
                    ib.push(close);
                }
            }
        }
        Self {
            premarket: upper_median(&mut pre),
            initial_balance: upper_median(&mut ib),
            regular_hours: upper_median(&mut rth),
        }
    }
}

/// One minute bar; only the close is used for anchors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

fn upper_median(xs: &mut [f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    xs.sort_by(f64::total_cmp);
    Some(xs[xs.len() / 2])
}

/// Blend the available sources into one anchor price.
pub fn blend(medians: &SessionMedians, weights: &AnchorWeights) -> Option<f64> {
    let sources = [
        (medians.premarket, weights.premarket),
        (medians.initial_balance, weights.initial_balance),
        (medians.regular_hours, weights.regular_hours),
    ];
    let (num, den) = sources
        .iter()
        .filter_map(|(px, w)| sanitize_price(*px).map(|p| (p, *w)))
        .filter(|(_, w)| *w > 0.0)
        .fold((0.0, 0.0), |(num, den), (p, w)| (num + p * w, den + w));
    (den > 0.0).then(|| num / den)
}

/// Weighted multi-day anchor, most recent day first, weights 5..1.
/// Days without an anchor are skipped; extra days beyond five are ignored.
pub fn blend_lookback(daily: &[Option<f64>]) -> Option<f64> {
    let (num, den) = daily
        .iter()
        .zip(LOOKBACK_WEIGHTS)
        .filter_map(|(px, w)| sanitize_price(*px).map(|p| (p, w)))
        .fold((0.0, 0.0), |(num, den), (p, w)| (num + p * w, den + w));
    (den > 0.0).then(|| num / den)
}

/// Anchor inputs and the resulting blended price for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorState {
    medians: SessionMedians,
    blended: Option<f64>,
}

impl AnchorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn medians(&self) -> &SessionMedians {
        &self.medians
    }

    /// Replace the session medians and recompute the blend.
    pub fn refresh(&mut self, medians: SessionMedians, weights: &AnchorWeights) {
        self.medians = medians;
        self.blended = blend(&medians, weights);
    }

    /// Recompute with new weights, keeping the medians.
    pub fn reweight(&mut self, weights: &AnchorWeights) {
        self.blended = blend(&self.medians, weights);
    }

    /// The blended anchor, or `InsufficientData` when no source is available.
    pub fn anchor(&self, symbol: &str) -> Result<f64> {
        self.blended.ok_or_else(|| LadderError::InsufficientData {
            symbol: symbol.to_string(),
        })
    }
}

/// Wall-clock helper used by tests and the CLI to build bars.
pub fn local_bar(date: chrono::NaiveDate, time: NaiveTime, hours: &TradingHours, close: f64) -> Option<MinuteBar> {
    let offset = hours.offset()?;
    let local = date.and_time(time).and_local_timezone(offset).single()?;
    Some(MinuteBar {
        timestamp: local.with_timezone(&Utc),
        close,
    })
}
