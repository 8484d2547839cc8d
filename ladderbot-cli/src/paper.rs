//! Paper broker for replays: fills every accepted intent in full at its IOC
//! limit and rejects a seeded random fraction.

use chrono::{DateTime, Utc};
use ladderbot_core::domain::{Fill, OrderIntent, Side, SubmissionOutcome};
use ladderbot_core::gateway::{BrokerPositions, OrderGateway};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct PaperBroker {
    positions: BrokerPositions,
    reject_rate: f64,
    rng: StdRng,
    clock: DateTime<Utc>,
    submitted: usize,
    rejected: usize,
}

impl PaperBroker {
    pub fn new(reject_rate: f64, seed: u64) -> Self {
        Self {
            positions: BrokerPositions::new(),
            reject_rate: reject_rate.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
            clock: DateTime::<Utc>::default(),
            submitted: 0,
            rejected: 0,
        }
    }

    /// Timestamp stamped on subsequent fills.
    pub fn set_clock(&mut self, now: DateTime<Utc>) {
        self.clock = now;
    }

    pub fn holdings(&self) -> &BrokerPositions {
        &self.positions
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

impl OrderGateway for PaperBroker {
    fn positions(&mut self) -> BrokerPositions {
        self.positions.clone()
    }

    fn submit(&mut self, intent: &OrderIntent) -> SubmissionOutcome {
        self.submitted += 1;
        if self.reject_rate > 0.0 && self.rng.gen_bool(self.reject_rate) {
            self.rejected += 1;
            return SubmissionOutcome::Rejected {
                reason: "paper reject".into(),
            };
        }

        let price = intent.price_mode.limit_price();
        let pos = self
            .positions
            .entry(intent.symbol.clone())
            .or_default();
        let quantity = match intent.side {
            Side::Buy => {
                let total = pos.shares + intent.quantity;
                pos.avg_cost = if pos.shares > 0.0 {
                    (pos.avg_cost * pos.shares + price * intent.quantity) / total
                } else {
                    price
                };
                pos.shares = total;
                intent.quantity
            }
            Side::Sell => {
                // long-only account: never sell more than is held
                let quantity = intent.quantity.min(pos.shares.max(0.0));
                pos.shares -= quantity;
                if pos.shares <= 0.0 {
                    pos.avg_cost = 0.0;
                }
                quantity
            }
        };

        SubmissionOutcome::Filled(Fill {
            quantity,
            price,
            timestamp: self.clock,
        })
    }
}
