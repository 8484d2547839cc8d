//! Worked scenarios for the ladder engine.
//!
//! 1. Rung-4 triggers at neutral and positive momentum
//! 2. Hard stop on a broker-seeded position
//! 3. Hard stop after building two rungs clears the stack
//! 4. Broker short is covered before anything else

mod common;

use common::{basket_config, flat_medians, step, t0, Feed, SimBroker};
use ladderbot_core::components::ladder;
use ladderbot_core::config::{ClassProfile, LadderParams};
use ladderbot_core::domain::{InstrumentConfig, IntentReason, RiskClass, RungIndex, Side, Tick};
use ladderbot_core::engine::Orchestrator;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ── 1. Trigger prices ────────────────────────────────────────────────

#[test]
fn neutral_momentum_puts_trigger_three_percent_out() {
    let inst = InstrumentConfig::new("RCAT", RiskClass::Risky, 0.006, 0.006);
    let plan = ladder::build(100.0, 0.0, &inst, &ClassProfile::risky(), &LadderParams::default());
    assert!(close(plan.buy_trigger(RungIndex::TRIGGER), 97.0));
    assert!(close(plan.sell_trigger(RungIndex::TRIGGER), 103.0));
}

#[test]
fn positive_momentum_shifts_triggers() {
    let inst = InstrumentConfig::new("RCAT", RiskClass::Risky, 0.006, 0.006);
    let plan = ladder::build(100.0, 1.5, &inst, &ClassProfile::risky(), &LadderParams::default());
    assert!(close(plan.buy_offset, 0.04125));
    assert!(close(plan.sell_offset, 0.02325));
    // $95.88 and $102.33 rounded to the cent
    assert!(close((plan.buy_trigger(RungIndex::TRIGGER) * 100.0).round() / 100.0, 95.88));
    assert!(close((plan.sell_trigger(RungIndex::TRIGGER) * 100.0).round() / 100.0, 102.33));
}

// ── 2. Hard stop on a seeded position ────────────────────────────────

#[test]
fn hard_stop_sells_full_position() {
    let mut orch = Orchestrator::new(basket_config()).unwrap();
    orch.set_session_medians("RCAT", flat_medians(100.0)).unwrap();
    let mut broker = SimBroker::new().with_position("RCAT", 100.0, 100.0);

    let tick = Tick::new("RCAT", t0(), 94.99).with_quote(94.98, 95.0);
    let (out, fills) = step(&mut orch, &mut broker, t0(), &[tick]);

    assert_eq!(out.intents.len(), 1);
    let stop = &out.intents[0];
    assert_eq!(stop.reason, IntentReason::HardStop);
    assert_eq!(stop.side, Side::Sell);
    assert_eq!(stop.quantity, 100.0);
    assert_eq!(fills.len(), 1);

    let pos = &orch.book("RCAT").unwrap().position;
    assert!(pos.is_flat());
    assert_eq!(pos.depth(), 0);
    assert_eq!(broker.shares("RCAT"), 0.0);
}

#[test]
fn above_hard_stop_falls_through_to_trailing_stop() {
    // high-water mark starts at cost, so 95.01 is through the 2.5% trail
    let mut orch = Orchestrator::new(basket_config()).unwrap();
    let mut broker = SimBroker::new().with_position("RCAT", 100.0, 100.0);
    let tick = Tick::new("RCAT", t0(), 95.01);
    let (out, _) = step(&mut orch, &mut broker, t0(), &[tick]);
    assert_eq!(out.intents.len(), 1);
    assert_eq!(out.intents[0].reason, IntentReason::TrailingStop);
    assert_eq!(out.intents[0].quantity, 100.0);
}

#[test]
fn protective_exit_runs_without_anchor() {
    let mut orch = Orchestrator::new(basket_config()).unwrap();
    let mut broker = SimBroker::new().with_position("AVAV", 10.0, 50.0);
    let tick = Tick::new("AVAV", t0(), 40.0);
    let (out, _) = step(&mut orch, &mut broker, t0(), &[tick]);
    assert_eq!(out.intents.len(), 1);
    assert_eq!(out.intents[0].reason, IntentReason::HardStop);
}

// ── 3. Build two rungs, then stop out ────────────────────────────────

#[test]
fn hard_stop_clears_built_ladder() {
    let mut orch = Orchestrator::new(basket_config()).unwrap();
    orch.set_session_medians("RCAT", flat_medians(100.0)).unwrap();
    let mut broker = SimBroker::new();
    let mut feed = Feed::new("RCAT");

    // flat volume: z stays 0, no ladder action
    for _ in 0..4 {
        let t = feed.next(101.0, 1_000.0);
        let (out, _) = step(&mut orch, &mut broker, t.timestamp, &[t]);
        assert!(out.intents.is_empty());
    }

    // volume spike with price under R1
    let t = feed.next(98.5, 10_000.0);
    let (out, fills) = step(&mut orch, &mut broker, t.timestamp, &[t]);
    assert_eq!(out.intents.len(), 1);
    assert_eq!(out.intents[0].side, Side::Buy);
    assert_eq!(out.intents[0].rung, Some(RungIndex::SHALLOWEST));
    assert_eq!(fills.len(), 1);

    // stronger spike, price under R2
    let t = feed.next(97.0, 30_000.0);
    let (out, _) = step(&mut orch, &mut broker, t.timestamp, &[t]);
    assert_eq!(out.intents.len(), 1);
    assert_eq!(out.intents[0].rung, RungIndex::new(2));
    assert_eq!(orch.book("RCAT").unwrap().position.depth(), 2);

    // collapse through the hard stop
    let t = feed.next(92.0, 1_000.0);
    let (out, fills) = step(&mut orch, &mut broker, t.timestamp, &[t]);
    assert_eq!(out.intents.len(), 1);
    assert_eq!(out.intents[0].reason, IntentReason::HardStop);
    assert!(fills[0].realized_pnl < 0.0);

    let pos = &orch.book("RCAT").unwrap().position;
    assert_eq!(pos.depth(), 0);
    assert!(pos.is_flat());
    assert!(pos.realized_pnl() < 0.0);
    assert_eq!(broker.shares("RCAT"), 0.0);
}

// ── 4. Short cover ───────────────────────────────────────────────────

#[test]
fn broker_short_is_covered_first() {
    let mut orch = Orchestrator::new(basket_config()).unwrap();
    orch.set_session_medians("RCAT", flat_medians(20.0)).unwrap();
    orch.set_session_medians("AVAV", flat_medians(100.0)).unwrap();
    let mut broker = SimBroker::new()
        .with_position("RCAT", -50.0, 20.0)
        .with_position("AVAV", 100.0, 100.0);

    let ticks = vec![
        Tick::new("AVAV", t0(), 90.0).with_quote(89.99, 90.01),
        Tick::new("RCAT", t0(), 20.0).with_quote(19.99, 20.01),
    ];
    let (out, _) = step(&mut orch, &mut broker, t0(), &ticks);

    assert_eq!(out.intents.len(), 2);
    let cover = &out.intents[0];
    assert_eq!(cover.symbol, "RCAT");
    assert_eq!(cover.side, Side::Buy);
    assert_eq!(cover.quantity, 50.0);
    assert_eq!(cover.reason, IntentReason::ShortCover);
    assert_eq!(out.intents[1].reason, IntentReason::HardStop);

    assert_eq!(broker.shares("RCAT"), 0.0);
    assert!(orch.book("RCAT").unwrap().position.is_flat());

    // covered: nothing more to do next cycle
    let later = t0() + chrono::Duration::seconds(1);
    let tick = Tick::new("RCAT", later, 20.0);
    let (out, _) = step(&mut orch, &mut broker, later, &[tick]);
    assert!(out.intents.iter().all(|i| i.reason != IntentReason::ShortCover));
}
