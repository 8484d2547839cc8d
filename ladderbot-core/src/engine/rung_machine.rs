//! Rung state machine: per-symbol decisions against the current plan.
//!
//! State is the occupancy depth of `PositionState` (0..=7) plus the transient
//! short-cover condition detected by reconciliation. Evaluation is pure and
//! yields at most one draft per call; state only moves in [`apply_fill`].
//!
//! Priority within a symbol's cycle:
//! short cover > hard stop > trailing stop > breakeven trim > unwind > entry.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::components::{ClipPlan, LadderPlan};
use crate::config::{EngineConfig, RiskLimits};
use crate::domain::{
    ioc_limit, Fill, FillRecord, IntentId, IntentReason, OccupiedRung, OrderIntent, PositionState, PriceMode,
    RungIndex, Side, Tick, Urgency, SHARE_EPSILON,
};

/// An intent before the pending ledger gives it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentDraft {
    pub side: Side,
    pub quantity: f64,
    pub rung: Option<RungIndex>,
    pub reason: IntentReason,
    pub limit_price: f64,
    pub urgency: Urgency,
    pub clip_usd: Option<f64>,
}

impl IntentDraft {
    pub fn into_intent(self, id: IntentId, symbol: &str) -> OrderIntent {
        OrderIntent {
            id,
            symbol: symbol.to_string(),
            side: self.side,
            quantity: self.quantity,
            price_mode: PriceMode::Ioc {
                limit_price: self.limit_price,
                urgency: self.urgency,
            },
            rung: self.rung,
            reason: self.reason,
            clip_usd: self.clip_usd,
        }
    }
}

/// Market and configuration inputs for one symbol on one cycle.
#[derive(Debug, Clone, Copy)]
pub struct RungContext<'a> {
    pub tick: &'a Tick,
    /// Sanitised last price.
    pub price: f64,
    pub z: f64,
    pub limits: &'a RiskLimits,
    pub engine: &'a EngineConfig,
    pub now: DateTime<Utc>,
}

impl RungContext<'_> {
    fn draft(&self, side: Side, quantity: f64, reason: IntentReason, rung: Option<RungIndex>) -> IntentDraft {
        let urgency = if reason.is_protective() {
            Urgency::Urgent
        } else {
            Urgency::Normal
        };
        let bump = match urgency {
            Urgency::Urgent => self.engine.urgent_bump,
            Urgency::Normal => self.engine.normal_bump,
        };
        IntentDraft {
            side,
            quantity,
            rung,
            reason,
            limit_price: ioc_limit(side, self.tick, bump),
            urgency,
            clip_usd: None,
        }
    }
}

/// Buy back a broker-reported short. Ungated and urgent.
pub fn short_cover(short_shares: f64, tick: &Tick, engine: &EngineConfig) -> IntentDraft {
    IntentDraft {
        side: Side::Buy,
        quantity: short_shares.abs(),
        rung: None,
        reason: IntentReason::ShortCover,
        limit_price: ioc_limit(Side::Buy, tick, engine.urgent_bump),
        urgency: Urgency::Urgent,
        clip_usd: None,
    }
}

/// Hard stop, then trailing stop. Ignores momentum and the ladder.
pub fn protective_exit(position: &PositionState, ctx: &RungContext<'_>) -> Option<IntentDraft> {
    if position.is_flat() {
        return None;
    }
    let price = ctx.price;
    let avg = position.avg_cost();
    if avg > 0.0 && price <= avg * (1.0 - ctx.limits.hard_stop_pct) {
        return Some(ctx.draft(Side::Sell, position.shares(), IntentReason::HardStop, None));
    }
    let hwm = position.high_water_mark();
    if hwm > 0.0 && price <= hwm * (1.0 - ctx.limits.trailing_pct) {
        return Some(ctx.draft(Side::Sell, position.shares(), IntentReason::TrailingStop, None));
    }
    None
}

/// Unwind of the top rung, breakeven trim, or entry of the next rung.
///
/// Once the top rung's sell trigger is crossed the rung is unwound at its
/// recorded size; the breakeven trim only covers the gap below that trigger.
pub fn ladder_action(
    position: &PositionState,
    ctx: &RungContext<'_>,
    ladder: &LadderPlan,
    clips: &ClipPlan,
) -> Option<IntentDraft> {
    if ctx.z < 0.0 && !position.is_flat() {
        if let Some(unwind) = unwind(position, ctx, ladder) {
            return Some(unwind);
        }
        if let Some(trim) = breakeven_trim(position, ctx) {
            return Some(trim);
        }
    }
    if ctx.z > 0.0 {
        return entry(position, ctx, ladder, clips);
    }
    None
}

fn breakeven_trim(position: &PositionState, ctx: &RungContext<'_>) -> Option<IntentDraft> {
    let fraction = ctx.engine.breakeven_trim_fraction;
    let avg = position.avg_cost();
    if fraction <= 0.0 || avg <= 0.0 || ctx.price < avg {
        return None;
    }
    if ctx.price / avg - 1.0 < ctx.limits.breakeven_min_gain {
        return None;
    }
    let quantity = (position.shares() * fraction).floor().max(1.0).min(position.shares());
    Some(ctx.draft(Side::Sell, quantity, IntentReason::Breakeven, None))
}

fn unwind(position: &PositionState, ctx: &RungContext<'_>, ladder: &LadderPlan) -> Option<IntentDraft> {
    let top = position.top()?;
    if ctx.price < ladder.sell_trigger(top.rung) {
        return None;
    }
    let quantity = top.shares.min(position.shares());
    if quantity <= SHARE_EPSILON {
        return None;
    }
    let mut draft = ctx.draft(Side::Sell, quantity, IntentReason::Ladder, Some(top.rung));
    draft.clip_usd = Some(top.clip_usd);
    Some(draft)
}

fn entry(
    position: &PositionState,
    ctx: &RungContext<'_>,
    ladder: &LadderPlan,
    clips: &ClipPlan,
) -> Option<IntentDraft> {
    let rung = position.next_rung()?;
    if ctx.price > ladder.buy_trigger(rung) {
        return None;
    }
    if let Some(last) = position.last_buy_at() {
        let since_ms = (ctx.now - last).num_milliseconds();
        if since_ms < ctx.engine.buy_cooldown_ms {
            debug!(symbol = %ctx.tick.symbol, %rung, since_ms, "entry in cooldown");
            return None;
        }
    }
    if let Some(spread) = ctx.tick.spread_fraction() {
        if spread > ctx.limits.max_spread {
            debug!(symbol = %ctx.tick.symbol, %rung, spread, max = ctx.limits.max_spread, "entry spread too wide");
            return None;
        }
    }
    let quantity = clips.shares_for(rung, ctx.price)?;
    let mut draft = ctx.draft(Side::Buy, quantity, IntentReason::Ladder, Some(rung));
    draft.clip_usd = Some(clips.clip(rung));
    Some(draft)
}

/// Apply a confirmed fill to the position and describe it for the fill log.
///
/// Ladder buys push their rung; protective sells clear the stack; other sells
/// consume recorded rung shares from the top. A short-cover fill only closes
/// the broker-side short, which reconciliation already flattened internally.
pub fn apply_fill(position: &mut PositionState, intent: &OrderIntent, fill: &Fill) -> FillRecord {
    let mut realized_pnl = 0.0;
    let mut quantity = fill.quantity.max(0.0);

    match (intent.side, intent.reason) {
        (Side::Buy, IntentReason::ShortCover) => {}
        (Side::Buy, _) => {
            position.record_buy(quantity, fill.price, fill.timestamp);
            if let Some(rung) = intent.rung {
                let occupied = OccupiedRung {
                    rung,
                    shares: quantity,
                    clip_usd: intent.clip_usd.unwrap_or(quantity * fill.price),
                    fill_price: fill.price,
                    filled_at: fill.timestamp,
                };
                if !position.push_rung(occupied) {
                    warn!(
                        symbol = %intent.symbol,
                        %rung,
                        depth = position.depth(),
                        "fill for out-of-order rung held but not laddered"
                    );
                }
            }
        }
        (Side::Sell, reason) => {
            quantity = quantity.min(position.shares());
            if reason.is_protective() {
                position.clear_stack();
            } else {
                position.consume_from_top(quantity);
            }
            realized_pnl = position.record_sell(quantity, fill.price);
        }
    }

    FillRecord {
        timestamp: fill.timestamp,
        symbol: intent.symbol.clone(),
        side: intent.side,
        quantity,
        price: fill.price,
        rung: intent.rung,
        reason: intent.reason,
        realized_pnl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::clip::{self, ClassBudget};
    use crate::components::ladder;
    use crate::config::{ClassProfile, LadderParams, SizingParams};
    use crate::domain::{InstrumentConfig, RiskClass};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap()
    }

    fn tick(price: f64) -> Tick {
        Tick::new("RCAT", now(), price).with_quote(price - 0.01, price + 0.01)
    }

    fn plan(z: f64) -> (LadderPlan, ClipPlan) {
        let inst = InstrumentConfig::new("RCAT", RiskClass::Risky, 0.006, 0.006).with_clip_override(1_000.0);
        let profile = ClassProfile::risky();
        let params = LadderParams::default();
        let budget = ClassBudget {
            equity_budget: 100_000.0,
            class_allocation: 0.6,
            per_ticker_share: 1.0,
        };
        let clips = clip::size(&inst, &budget, 100.0, &profile, &SizingParams::default(), &params.clip_mults);
        (ladder::build(100.0, z, &inst, &profile, &params), clips)
    }

    fn ctx<'a>(t: &'a Tick, z: f64, limits: &'a RiskLimits, engine: &'a EngineConfig) -> RungContext<'a> {
        RungContext {
            tick: t,
            price: t.last,
            z,
            limits,
            engine,
            now: now(),
        }
    }

    fn fill_buy(pos: &mut PositionState, rung: u8, shares: f64, price: f64) {
        let intent = IntentDraft {
            side: Side::Buy,
            quantity: shares,
            rung: RungIndex::new(rung),
            reason: IntentReason::Ladder,
            limit_price: price,
            urgency: Urgency::Normal,
            clip_usd: Some(shares * price),
        }
        .into_intent(IntentId(rung as u64), "RCAT");
        let f = Fill {
            quantity: shares,
            price,
            timestamp: now() - Duration::minutes(10),
        };
        apply_fill(pos, &intent, &f);
    }

    #[test]
    fn entry_targets_next_rung_only() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig::default();
        let (lp, cp) = plan(1.0);
        // deep enough for every rung, but only R1 is eligible from flat
        let t = tick(50.0);
        let d = ladder_action(&PositionState::new(), &ctx(&t, 1.0, &limits, &engine), &lp, &cp).unwrap();
        assert_eq!(d.side, Side::Buy);
        assert_eq!(d.rung, Some(RungIndex::SHALLOWEST));
        assert_eq!(d.quantity, 20.0);
        assert_eq!(d.clip_usd, Some(1_000.0));
    }

    #[test]
    fn entry_requires_positive_z() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig::default();
        let (lp, cp) = plan(0.0);
        let t = tick(50.0);
        assert!(ladder_action(&PositionState::new(), &ctx(&t, 0.0, &limits, &engine), &lp, &cp).is_none());
    }

    #[test]
    fn entry_blocked_by_wide_spread() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig::default();
        let (lp, cp) = plan(1.0);
        let t = Tick::new("RCAT", now(), 90.0).with_quote(88.0, 92.0);
        assert!(ladder_action(&PositionState::new(), &ctx(&t, 1.0, &limits, &engine), &lp, &cp).is_none());
    }

    #[test]
    fn entry_respects_cooldown() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig {
            buy_cooldown_ms: 60 * 60 * 1000,
            ..EngineConfig::default()
        };
        let (lp, cp) = plan(1.0);
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 10.0, 99.0);
        let t = tick(50.0);
        assert!(ladder_action(&pos, &ctx(&t, 1.0, &limits, &engine), &lp, &cp).is_none());
    }

    #[test]
    fn unwind_targets_top_rung_with_recorded_shares() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig {
            breakeven_trim_fraction: 0.0,
            ..EngineConfig::default()
        };
        let (lp, cp) = plan(-1.0);
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 10.0, 99.0);
        fill_buy(&mut pos, 2, 12.0, 98.0);
        let t = tick(lp.sell_trigger(RungIndex::new(2).unwrap()) + 0.01);
        let d = ladder_action(&pos, &ctx(&t, -1.0, &limits, &engine), &lp, &cp).unwrap();
        assert_eq!(d.side, Side::Sell);
        assert_eq!(d.rung, RungIndex::new(2));
        assert_eq!(d.quantity, 12.0);
    }

    #[test]
    fn unwind_preempts_breakeven_once_sell_trigger_crossed() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig::default();
        let (lp, cp) = plan(-1.0);
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 10.0, 99.0);
        let t = tick(105.0);
        let d = ladder_action(&pos, &ctx(&t, -1.0, &limits, &engine), &lp, &cp).unwrap();
        assert_eq!(d.reason, IntentReason::Ladder);
        assert_eq!(d.rung, Some(RungIndex::SHALLOWEST));
        assert_eq!(d.quantity, 10.0);
    }

    #[test]
    fn breakeven_trims_below_sell_trigger() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig::default();
        let (lp, cp) = plan(-1.0);
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 10.0, 99.0);
        // in profit, but short of R1's sell trigger
        let t = tick(100.5);
        assert!(t.last < lp.sell_trigger(RungIndex::SHALLOWEST));
        let d = ladder_action(&pos, &ctx(&t, -1.0, &limits, &engine), &lp, &cp).unwrap();
        assert_eq!(d.reason, IntentReason::Breakeven);
        assert_eq!(d.quantity, 2.0);
    }

    #[test]
    fn exits_ignore_wide_spread() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig::default();
        let (lp, cp) = plan(-1.0);
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 100.0, 100.0);
        pos.mark(120.0);

        let wide = |last: f64| Tick::new("RCAT", now(), last).with_quote(last * 0.95, last * 1.05);

        let t = wide(94.0);
        assert!(t.spread_fraction().unwrap() > limits.max_spread);
        let d = protective_exit(&pos, &ctx(&t, 1.0, &limits, &engine)).unwrap();
        assert_eq!(d.reason, IntentReason::HardStop);

        let t = wide(116.0);
        assert!(t.spread_fraction().unwrap() > limits.max_spread);
        let d = protective_exit(&pos, &ctx(&t, 1.0, &limits, &engine)).unwrap();
        assert_eq!(d.reason, IntentReason::TrailingStop);

        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 10.0, 99.0);
        let t = wide(105.0);
        assert!(t.spread_fraction().unwrap() > limits.max_spread);
        assert!(protective_exit(&pos, &ctx(&t, -1.0, &limits, &engine)).is_none());
        let d = ladder_action(&pos, &ctx(&t, -1.0, &limits, &engine), &lp, &cp).unwrap();
        assert_eq!(d.reason, IntentReason::Ladder);
        assert_eq!(d.side, Side::Sell);
    }

    #[test]
    fn breakeven_needs_minimum_gain() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig::default();
        let (lp, cp) = plan(-1.0);
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 10.0, 99.0);
        let t = tick(99.001);
        assert!(breakeven_trim(&pos, &ctx(&t, -1.0, &limits, &engine)).is_none());
        assert!(ladder_action(&pos, &ctx(&t, -1.0, &limits, &engine), &lp, &cp).is_none());
    }

    #[test]
    fn hard_stop_before_trailing_stop() {
        let limits = ClassProfile::risky().limits;
        let engine = EngineConfig::default();
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 100.0, 100.0);
        pos.mark(120.0);
        let t = tick(94.99);
        let d = protective_exit(&pos, &ctx(&t, 3.0, &limits, &engine)).unwrap();
        assert_eq!(d.reason, IntentReason::HardStop);
        assert_eq!(d.quantity, 100.0);
        assert_eq!(d.urgency, Urgency::Urgent);

        let t = tick(116.0);
        let d = protective_exit(&pos, &ctx(&t, 3.0, &limits, &engine)).unwrap();
        assert_eq!(d.reason, IntentReason::TrailingStop);
    }

    #[test]
    fn protective_fill_clears_stack() {
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 10.0, 100.0);
        fill_buy(&mut pos, 2, 10.0, 98.0);
        let intent = short_cover(0.0, &tick(90.0), &EngineConfig::default()).into_intent(IntentId(9), "RCAT");
        let stop = OrderIntent {
            side: Side::Sell,
            reason: IntentReason::HardStop,
            quantity: 20.0,
            ..intent
        };
        let rec = apply_fill(
            &mut pos,
            &stop,
            &Fill {
                quantity: 20.0,
                price: 90.0,
                timestamp: now(),
            },
        );
        assert!(pos.is_flat());
        assert_eq!(pos.depth(), 0);
        assert!((rec.realized_pnl - (90.0 - 99.0) * 20.0).abs() < 1e-9);
    }

    #[test]
    fn partial_unwind_keeps_rung_with_remainder() {
        let mut pos = PositionState::new();
        fill_buy(&mut pos, 1, 10.0, 100.0);
        fill_buy(&mut pos, 2, 12.0, 98.0);
        let intent = IntentDraft {
            side: Side::Sell,
            quantity: 12.0,
            rung: RungIndex::new(2),
            reason: IntentReason::Ladder,
            limit_price: 101.0,
            urgency: Urgency::Normal,
            clip_usd: None,
        }
        .into_intent(IntentId(3), "RCAT");
        apply_fill(
            &mut pos,
            &intent,
            &Fill {
                quantity: 5.0,
                price: 101.0,
                timestamp: now(),
            },
        );
        assert_eq!(pos.depth(), 2);
        assert_eq!(pos.top().unwrap().shares, 7.0);
        assert_eq!(pos.shares(), 17.0);
    }

    #[test]
    fn short_cover_fill_adds_no_internal_shares() {
        let mut pos = PositionState::new();
        let intent = short_cover(-50.0, &tick(20.0), &EngineConfig::default()).into_intent(IntentId(1), "RCAT");
        assert_eq!(intent.quantity, 50.0);
        let rec = apply_fill(
            &mut pos,
            &intent,
            &Fill {
                quantity: 50.0,
                price: 20.4,
                timestamp: now(),
            },
        );
        assert!(pos.is_flat());
        assert_eq!(rec.reason, IntentReason::ShortCover);
    }
}
