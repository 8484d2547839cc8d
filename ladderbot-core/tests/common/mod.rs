//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use ladderbot_core::components::SessionMedians;
use ladderbot_core::config::BotConfig;
use ladderbot_core::domain::{
    Fill, FillRecord, InstrumentConfig, OrderIntent, RiskClass, Side, SubmissionOutcome, Tick,
};
use ladderbot_core::engine::{CycleOutput, Orchestrator};
use ladderbot_core::gateway::{BrokerPosition, BrokerPositions, OrderGateway};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap()
}

/// RCAT risky at 0.6% both sides, AVAV safe at 0.4%.
pub fn basket_config() -> BotConfig {
    BotConfig {
        instruments: vec![
            InstrumentConfig::new("RCAT", RiskClass::Risky, 0.006, 0.006),
            InstrumentConfig::new("AVAV", RiskClass::Safe, 0.004, 0.004),
        ],
        ..BotConfig::default()
    }
}

/// Broker that fills a fixed fraction of every intent at its limit price.
#[derive(Debug, Clone, Default)]
pub struct SimBroker {
    pub positions: BrokerPositions,
    pub fill_fraction: f64,
    pub reject_all: bool,
    pub clock: Option<DateTime<Utc>>,
}

impl SimBroker {
    pub fn new() -> Self {
        Self {
            fill_fraction: 1.0,
            ..Self::default()
        }
    }

    pub fn with_position(mut self, symbol: &str, shares: f64, avg_cost: f64) -> Self {
        self.positions
            .insert(symbol.to_string(), BrokerPosition::new(shares, avg_cost));
        self
    }

    pub fn shares(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.shares)
    }
}

impl OrderGateway for SimBroker {
    fn positions(&mut self) -> BrokerPositions {
        self.positions.clone()
    }

    fn submit(&mut self, intent: &OrderIntent) -> SubmissionOutcome {
        if self.reject_all {
            return SubmissionOutcome::Rejected {
                reason: "simulated reject".into(),
            };
        }
        let quantity = (intent.quantity * self.fill_fraction).floor();
        let price = intent.price_mode.limit_price();
        let pos = self.positions.entry(intent.symbol.clone()).or_default();
        match intent.side {
            Side::Buy => {
                let total = pos.shares + quantity;
                if pos.shares > 0.0 && total > 0.0 {
                    pos.avg_cost = (pos.avg_cost * pos.shares + price * quantity) / total;
                } else {
                    pos.avg_cost = price;
                }
                pos.shares = total;
            }
            Side::Sell => pos.shares -= quantity,
        }
        SubmissionOutcome::Filled(Fill {
            quantity,
            price,
            timestamp: self.clock.unwrap_or_else(t0),
        })
    }
}

/// Tick stream for one symbol, one tick per `step_secs`.
pub struct Feed {
    pub symbol: String,
    pub at: DateTime<Utc>,
    pub step_secs: i64,
}

impl Feed {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            at: t0(),
            step_secs: 5,
        }
    }

    /// Next tick with a tight quote around `price`.
    pub fn next(&mut self, price: f64, dollar_volume: f64) -> Tick {
        self.at += Duration::seconds(self.step_secs);
        Tick::new(self.symbol.clone(), self.at, price)
            .with_quote(price - 0.01, price + 0.01)
            .with_dollar_volume(dollar_volume)
    }
}

/// Same medians for all three sources, so the blended anchor is `price`.
pub fn flat_medians(price: f64) -> SessionMedians {
    SessionMedians::new(Some(price), Some(price), Some(price))
}

/// One cycle against `broker`: evaluate, submit every new intent, confirm
/// or reject it.
pub fn step(
    orch: &mut Orchestrator,
    broker: &mut SimBroker,
    now: DateTime<Utc>,
    ticks: &[Tick],
) -> (CycleOutput, Vec<FillRecord>) {
    broker.clock = Some(now);
    let positions = broker.positions();
    let output = orch.run_cycle(now, ticks, &positions);
    let mut fills = Vec::new();
    for intent in &output.intents {
        match broker.submit(intent) {
            SubmissionOutcome::Filled(fill) => {
                if let Some(record) = orch.confirm_fill(intent.id, fill) {
                    fills.push(record);
                }
            }
            SubmissionOutcome::Rejected { reason } => {
                orch.reject(intent.id, &reason);
            }
        }
    }
    (output, fills)
}
