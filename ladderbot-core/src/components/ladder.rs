//! Ladder builder: anchor + base offsets + momentum -> 7 buy and 7 sell triggers.
//!
//! The trigger rung (R4) sits at `anchor * (1 -/+ offset)` where
//! `offset = base_pct * class_spread_mult * momentum_mult`. The other six rungs
//! scale that offset by the configured relative multipliers, so they fan out
//! around R4 without moving it.

use serde::{Deserialize, Serialize};

use crate::config::{ClassProfile, LadderParams, MomentumParams};
use crate::domain::{InstrumentConfig, RungIndex, Rungs};

/// Momentum scaling applied to the buy and sell anchor offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumMultipliers {
    pub buy: f64,
    pub sell: f64,
}

impl MomentumMultipliers {
    pub const NEUTRAL: MomentumMultipliers = MomentumMultipliers { buy: 1.0, sell: 1.0 };
}

/// Linear in the clamped z-score: positive z widens buys and tightens sells.
/// A non-finite z is treated as neutral.
pub fn momentum_multipliers(z: f64, params: &MomentumParams) -> MomentumMultipliers {
    if !z.is_finite() {
        return MomentumMultipliers::NEUTRAL;
    }
    let zc = z.clamp(-params.z_clamp, params.z_clamp);
    MomentumMultipliers {
        buy: (1.0 + params.buy_slope * zc).max(params.min_mult),
        sell: (1.0 - params.sell_slope * zc).max(params.min_mult),
    }
}

/// One cycle's trigger prices for a symbol.
///
/// `buy[R1]` is closest to the anchor and `buy[R7]` deepest; likewise
/// `sell[R1]` is the nearest sell level above the anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderPlan {
    pub anchor: f64,
    pub z: f64,
    pub momentum: MomentumMultipliers,
    /// Fractional distance of the buy trigger rung below the anchor.
    pub buy_offset: f64,
    /// Fractional distance of the sell trigger rung above the anchor.
    pub sell_offset: f64,
    pub buy: Rungs<f64>,
    pub sell: Rungs<f64>,
    spread_mult: f64,
}

impl LadderPlan {
    pub fn buy_trigger(&self, rung: RungIndex) -> f64 {
        self.buy[rung]
    }

    pub fn sell_trigger(&self, rung: RungIndex) -> f64 {
        self.sell[rung]
    }

    /// Widened copy for dashboards and logs. Never used for triggering.
    ///
    /// R4 moves `anchor_mult` times farther from the anchor, and every other
    /// rung keeps its distance from R4 stretched by the class spread
    /// multiplier. No level crosses the anchor.
    pub fn display(&self, anchor_mult: f64) -> (Rungs<f64>, Rungs<f64>) {
        (
            widen(self.anchor, &self.buy, self.spread_mult, anchor_mult, Direction::Down),
            widen(self.anchor, &self.sell, self.spread_mult, anchor_mult, Direction::Up),
        )
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Down,
    Up,
}

const CLAMP_EPS: f64 = 1e-6;

fn widen(anchor: f64, levels: &Rungs<f64>, spread_mult: f64, anchor_mult: f64, dir: Direction) -> Rungs<f64> {
    if spread_mult <= 1.0 || anchor <= 0.0 {
        return *levels;
    }
    let base_trigger = *levels.trigger();
    let mut trigger = base_trigger;
    if anchor_mult > 1.0 {
        trigger = anchor + (base_trigger - anchor) * anchor_mult;
        trigger = match dir {
            Direction::Down if trigger > anchor => anchor * (1.0 - CLAMP_EPS),
            Direction::Up if trigger < anchor => anchor * (1.0 + CLAMP_EPS),
            _ => trigger,
        };
    }
    levels.map(|rung, &level| {
        if rung == RungIndex::TRIGGER {
            return trigger.max(0.0);
        }
        let diff = level - base_trigger;
        let target = trigger + diff * spread_mult;
        let target = match dir {
            Direction::Down if diff > 0.0 => target.min(anchor * (1.0 - CLAMP_EPS)),
            Direction::Up if diff < 0.0 => target.max(anchor * (1.0 + CLAMP_EPS)),
            _ => target,
        };
        target.max(0.0)
    })
}

/// Build the ladder for one symbol. Pure: same inputs, same plan.
pub fn build(
    anchor: f64,
    z: f64,
    instrument: &InstrumentConfig,
    profile: &ClassProfile,
    params: &LadderParams,
) -> LadderPlan {
    let momentum = momentum_multipliers(z, &params.momentum);
    let buy_offset = instrument.base_buy_pct * profile.spread_mult * momentum.buy;
    let sell_offset = instrument.base_sell_pct * profile.spread_mult * momentum.sell;

    let buy = params
        .rung_mults
        .map(|_, m| (anchor * (1.0 - buy_offset * m)).max(0.0));
    let sell = params.rung_mults.map(|_, m| anchor * (1.0 + sell_offset * m));

    LadderPlan {
        anchor,
        z: if z.is_finite() { z } else { 0.0 },
        momentum,
        buy_offset,
        sell_offset,
        buy,
        sell,
        spread_mult: profile.spread_mult,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskClass;

    fn rcat() -> InstrumentConfig {
        InstrumentConfig::new("RCAT", RiskClass::Risky, 0.006, 0.006)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn neutral_momentum_triggers_three_percent_out() {
        let plan = build(100.0, 0.0, &rcat(), &ClassProfile::risky(), &LadderParams::default());
        assert!(close(plan.buy_offset, 0.03));
        assert!(close(plan.buy_trigger(RungIndex::TRIGGER), 97.0));
        assert!(close(plan.sell_trigger(RungIndex::TRIGGER), 103.0));
    }

    #[test]
    fn positive_momentum_widens_buys_tightens_sells() {
        let plan = build(100.0, 1.5, &rcat(), &ClassProfile::risky(), &LadderParams::default());
        assert!(close(plan.momentum.buy, 1.375));
        assert!(close(plan.momentum.sell, 0.775));
        assert!(close(plan.buy_offset, 0.04125));
        assert!(close(plan.sell_offset, 0.02325));
        assert!(close(plan.buy_trigger(RungIndex::TRIGGER), 95.875));
        assert!(close(plan.sell_trigger(RungIndex::TRIGGER), 102.325));
    }

    #[test]
    fn momentum_is_bounded() {
        let p = MomentumParams::default();
        assert_eq!(momentum_multipliers(50.0, &p), momentum_multipliers(2.0, &p));
        let m = momentum_multipliers(-50.0, &p);
        assert!(close(m.buy, 0.5));
        assert!(close(m.sell, 1.3));
        assert_eq!(momentum_multipliers(f64::NAN, &p), MomentumMultipliers::NEUTRAL);
    }

    #[test]
    fn rungs_fan_out_monotonically() {
        let plan = build(100.0, 0.7, &rcat(), &ClassProfile::risky(), &LadderParams::default());
        let buys = plan.buy.values();
        let sells = plan.sell.values();
        assert!(buys.windows(2).all(|w| w[1] < w[0]));
        assert!(sells.windows(2).all(|w| w[1] > w[0]));
        assert!(buys.iter().all(|p| *p < 100.0));
        assert!(sells.iter().all(|p| *p > 100.0));
        // R1 at a quarter of the trigger offset
        assert!(close(100.0 - buys[0], (100.0 - buys[3]) * 0.25));
    }

    #[test]
    fn deep_buy_rungs_floor_at_zero() {
        let wide = InstrumentConfig::new("X", RiskClass::Risky, 0.2, 0.2);
        let plan = build(10.0, 2.0, &wide, &ClassProfile::risky(), &LadderParams::default());
        assert!(plan.buy.values().iter().all(|p| *p >= 0.0));
        assert_eq!(plan.buy[RungIndex::DEEPEST], 0.0);
    }

    #[test]
    fn safe_class_is_narrower() {
        let inst = InstrumentConfig::new("AVAV", RiskClass::Safe, 0.006, 0.006);
        let plan = build(100.0, 0.0, &inst, &ClassProfile::safe(), &LadderParams::default());
        assert!(close(plan.buy_trigger(RungIndex::TRIGGER), 98.2));
    }

    #[test]
    fn display_pushes_trigger_and_stretches_neighbours() {
        let plan = build(100.0, 0.0, &rcat(), &ClassProfile::risky(), &LadderParams::default());
        let (buy, sell) = plan.display(2.0);
        assert!(close(buy[RungIndex::TRIGGER], 94.0));
        assert!(close(sell[RungIndex::TRIGGER], 106.0));
        // R5 is 0.75 below R4 in the base ladder, 3.75 below in display
        assert!(close(buy[RungIndex::new(5).unwrap()], 94.0 - 3.75));
        // shallow display rungs never cross the anchor
        assert!(buy.values().iter().all(|p| *p < 100.0));
        assert!(sell.values().iter().all(|p| *p > 100.0));
        // trigger plan itself is untouched
        assert!(close(plan.buy_trigger(RungIndex::TRIGGER), 97.0));
    }
}
