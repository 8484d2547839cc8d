//! Clip sizer: USD notional per buy rung.
//!
//! The allocation layer (`ClassBudget`) turns account equity into a per-ticker
//! budget; `size` only scales what it is given. Sell-side unwinds never use a
//! fresh clip: they reuse the shares recorded on the occupied rung.

use serde::{Deserialize, Serialize};

use crate::config::{BotConfig, ClassProfile, SizingParams};
use crate::domain::{InstrumentConfig, RungIndex, Rungs};

/// Capital available to one instrument, as fractions of the deployable equity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassBudget {
    /// Equity after the utilisation target is applied.
    pub equity_budget: f64,
    pub class_allocation: f64,
    pub per_ticker_share: f64,
}

impl ClassBudget {
    /// Allocation for `instrument` under `config`.
    ///
    /// Deployable equity is `equity * target_utilization`. The per-ticker share
    /// is the instrument's explicit `allocation_share`, or an equal split over
    /// the configured instruments of its class.
    pub fn for_instrument(config: &BotConfig, instrument: &InstrumentConfig) -> Self {
        let per_ticker_share = instrument.allocation_share.unwrap_or_else(|| {
            let n = config.class_count(instrument.class).max(1);
            1.0 / n as f64
        });
        Self {
            equity_budget: config.equity * config.sizing.target_utilization,
            class_allocation: config.profile(instrument.class).allocation,
            per_ticker_share,
        }
    }

    pub fn per_ticker_budget(&self) -> f64 {
        self.equity_budget * self.class_allocation * self.per_ticker_share
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipPlan {
    pub base_clip: f64,
    pub multipliers: Rungs<f64>,
    /// `base_clip * multipliers[i]`
    pub clips: Rungs<f64>,
}

impl ClipPlan {
    pub fn clip(&self, rung: RungIndex) -> f64 {
        self.clips[rung]
    }

    /// Whole shares bought at `rung` for `price`: `max(1, ceil(clip / price))`.
    /// `None` when the price is unusable.
    pub fn shares_for(&self, rung: RungIndex, price: f64) -> Option<f64> {
        if !price.is_finite() || price <= 0.0 {
            return None;
        }
        Some((self.clips[rung] / price).ceil().max(1.0))
    }
}

/// Scale applied for cheap vs. expensive names: `clamp(ref / max(1, price), 0.5, 2)`.
pub fn price_weight(price: f64, price_ref: f64) -> f64 {
    (price_ref / price.max(1.0)).clamp(0.5, 2.0)
}

/// Clip plan for one instrument at `latest_price`.
///
/// A configured clip override is used verbatim as the base clip. Otherwise
/// the base is the per-ticker budget split into `shots_per_ticker` shots,
/// scaled by the class risk multiplier and the price weight, then clamped to
/// `[min_clip, max_clip]`.
pub fn size(
    instrument: &InstrumentConfig,
    budget: &ClassBudget,
    latest_price: f64,
    profile: &ClassProfile,
    sizing: &SizingParams,
    multipliers: &Rungs<f64>,
) -> ClipPlan {
    let base_clip = match instrument.clip_override {
        Some(clip) => clip,
        None => {
            let shot = budget.per_ticker_budget() / f64::from(sizing.shots_per_ticker.max(1));
            let raw = shot * profile.clip_risk_mult * price_weight(latest_price, sizing.clip_price_ref);
            raw.clamp(sizing.min_clip, sizing.max_clip)
        }
    };
    ClipPlan {
        base_clip,
        multipliers: *multipliers,
        clips: multipliers.map(|_, m| base_clip * m),
    }
}
