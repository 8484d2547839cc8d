//! Per-symbol position state and the rung occupancy stack.
//!
//! Invariants:
//! - `shares >= 0` always.
//! - The stack holds at most seven rungs, filled in order R1, R2, ... with no
//!   gaps; the most recently filled rung is last.
//! - The shares recorded on the stack never exceed `shares`. Shares beyond the
//!   stack total (manual buys, broker-side adjustments) are held but not laddered.
//!
//! Mutation is crate-private: only the rung state machine changes a position,
//! and only in response to confirmed fills or broker reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rung::{RungIndex, RUNG_COUNT};

/// Share tolerance for float comparisons on whole-share quantities.
pub const SHARE_EPSILON: f64 = 1e-6;

/// One filled buy rung.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupiedRung {
    pub rung: RungIndex,
    /// Shares still attributed to this rung.
    pub shares: f64,
    /// USD clip the rung was sized with.
    pub clip_usd: f64,
    pub fill_price: f64,
    pub filled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    shares: f64,
    avg_cost: f64,
    high_water_mark: f64,
    stack: Vec<OccupiedRung>,
    last_buy_at: Option<DateTime<Utc>>,
    realized_pnl: f64,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shares(&self) -> f64 {
        self.shares
    }

    pub fn avg_cost(&self) -> f64 {
        self.avg_cost
    }

    pub fn high_water_mark(&self) -> f64 {
        self.high_water_mark
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn last_buy_at(&self) -> Option<DateTime<Utc>> {
        self.last_buy_at
    }

    pub fn is_flat(&self) -> bool {
        self.shares <= SHARE_EPSILON
    }

    /// Number of occupied rungs.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Occupied rungs, oldest first.
    pub fn stack(&self) -> &[OccupiedRung] {
        &self.stack
    }

    /// Most recently filled rung: the only one eligible for unwind.
    pub fn top(&self) -> Option<&OccupiedRung> {
        self.stack.last()
    }

    /// The next rung an entry may fill, or `None` when the ladder is full.
    pub fn next_rung(&self) -> Option<RungIndex> {
        RungIndex::after_depth(self.stack.len())
    }

    pub fn laddered_shares(&self) -> f64 {
        self.stack.iter().map(|r| r.shares).sum()
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        if self.is_flat() {
            0.0
        } else {
            (price - self.avg_cost) * self.shares
        }
    }

    // ── Crate-private mutation ─────────────────────────────────────────

    /// Raise the high-water mark while a position is open.
    pub(crate) fn mark(&mut self, price: f64) {
        if !self.is_flat() {
            self.high_water_mark = self.high_water_mark.max(price);
        }
    }

    /// Apply a confirmed buy to shares, cost basis and high-water mark.
    pub(crate) fn record_buy(&mut self, quantity: f64, price: f64, at: DateTime<Utc>) {
        if quantity <= 0.0 {
            return;
        }
        let new_shares = self.shares + quantity;
        self.avg_cost = if self.is_flat() {
            price
        } else {
            (self.avg_cost * self.shares + price * quantity) / new_shares
        };
        self.shares = new_shares;
        self.high_water_mark = self.high_water_mark.max(price);
        self.last_buy_at = Some(at);
    }

    /// Push a filled rung. Only the next rung in order is accepted.
    pub(crate) fn push_rung(&mut self, occupied: OccupiedRung) -> bool {
        if self.stack.len() >= RUNG_COUNT || Some(occupied.rung) != self.next_rung() {
            return false;
        }
        self.stack.push(occupied);
        true
    }

    /// Apply a confirmed sell. Returns realised PnL for the sold quantity.
    ///
    /// The quantity is clamped to the held shares so the position can never
    /// go negative. Recorded rung shares are consumed from the top down.
    pub(crate) fn record_sell(&mut self, quantity: f64, price: f64) -> f64 {
        let sold = quantity.min(self.shares).max(0.0);
        let pnl = (price - self.avg_cost) * sold;
        self.realized_pnl += pnl;
        self.shares -= sold;
        if self.is_flat() {
            self.flatten();
        } else {
            self.fit_stack_to_shares();
        }
        pnl
    }

    /// Consume `quantity` recorded shares from the top of the stack,
    /// popping rungs that empty.
    pub(crate) fn consume_from_top(&mut self, mut quantity: f64) {
        while quantity > SHARE_EPSILON {
            let Some(top) = self.stack.last_mut() else {
                break;
            };
            if top.shares <= quantity + SHARE_EPSILON {
                quantity -= top.shares;
                self.stack.pop();
            } else {
                top.shares -= quantity;
                quantity = 0.0;
            }
        }
    }

    pub(crate) fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Reset to flat: no shares, no cost basis, no stack.
    pub(crate) fn flatten(&mut self) {
        self.shares = 0.0;
        self.avg_cost = 0.0;
        self.high_water_mark = 0.0;
        self.stack.clear();
    }

    /// Overwrite with broker truth. Negative broker positions are handled by
    /// the caller; here they flatten.
    pub(crate) fn sync_to_broker(&mut self, shares: f64, avg_cost: f64) {
        if shares <= SHARE_EPSILON {
            self.flatten();
            return;
        }
        let was_flat = self.is_flat();
        self.shares = shares;
        if avg_cost > 0.0 {
            self.avg_cost = avg_cost;
        }
        if was_flat {
            self.high_water_mark = self.avg_cost;
        }
        self.fit_stack_to_shares();
    }

    fn fit_stack_to_shares(&mut self) {
        let excess = self.laddered_shares() - self.shares;
        if excess > SHARE_EPSILON {
            self.consume_from_top(excess);
        }
    }
}
