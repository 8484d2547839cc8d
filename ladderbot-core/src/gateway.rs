//! Boundary with the broker: position snapshot and order submission.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{OrderIntent, SubmissionOutcome};

/// Broker-reported holding for one symbol. `shares` may be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub shares: f64,
    pub avg_cost: f64,
}

impl BrokerPosition {
    pub fn new(shares: f64, avg_cost: f64) -> Self {
        Self { shares, avg_cost }
    }
}

/// Broker truth for one cycle. Symbols absent from the map are flat.
pub type BrokerPositions = BTreeMap<String, BrokerPosition>;

/// Position query and IOC submission.
///
/// A timeout is reported as `SubmissionOutcome::Rejected`; the engine treats
/// it the same as any other "not filled".
pub trait OrderGateway {
    fn positions(&mut self) -> BrokerPositions;

    fn submit(&mut self, intent: &OrderIntent) -> SubmissionOutcome;
}
