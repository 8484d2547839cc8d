//! Momentum signal from dollar-volume dynamics (the VWV z-score).
//!
//! Each tick contributes one dollar-volume increment to a bounded window per
//! symbol. The z-score of the newest increment against the window's sample
//! mean and standard deviation is the momentum gate for the ladder:
//! positive z admits entries, negative z admits unwinds and trims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::SignalParams;

/// Upper bound on eager preallocation; larger windows grow on demand.
const PREALLOC_LIMIT: usize = 1_024;

/// Rolling dollar-volume window for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityState {
    samples: VecDeque<f64>,
    capacity: usize,
    mean: f64,
    stddev: f64,
    z: f64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl VolatilityState {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.clamp(1, PREALLOC_LIMIT)),
            capacity: capacity.max(1),
            mean: 0.0,
            stddev: 0.0,
            z: 0.0,
            last_timestamp: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn stddev(&self) -> f64 {
        self.stddev
    }

    pub fn z_score(&self) -> f64 {
        self.z
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Change the window size, evicting the oldest samples if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    fn push(&mut self, increment: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(increment);
    }

    fn recompute(&mut self, params: &SignalParams) {
        let n = self.samples.len();
        if n < params.min_samples.max(2) {
            self.mean = self.samples.iter().sum::<f64>() / n.max(1) as f64;
            self.stddev = 0.0;
            self.z = 0.0;
            return;
        }
        let mean = self.samples.iter().sum::<f64>() / n as f64;
        let var = self.samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let sd = var.sqrt();
        let latest = self.samples.back().copied().unwrap_or(mean);
        let z = (latest - mean) / sd.max(params.epsilon);

        self.mean = mean;
        self.stddev = sd;
        self.z = z.clamp(-params.z_cap, params.z_cap);
    }
}

/// Updates per-symbol volatility state from tick increments.
#[derive(Debug, Clone, Copy)]
pub struct SignalEngine {
    params: SignalParams,
}

impl SignalEngine {
    pub fn new(params: SignalParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SignalParams {
        &self.params
    }

    pub fn new_state(&self) -> VolatilityState {
        VolatilityState::new(self.params.window)
    }

    /// Feed the latest increment for the symbol owning `state` and return its
    /// z-score.
    ///
    /// A tick that is not newer than the last applied one is ignored, so
    /// re-running a cycle on the same input leaves the window untouched.
    /// Negative or non-finite increments are dropped. Fewer than
    /// `min_samples` samples yields 0.
    pub fn update(&self, state: &mut VolatilityState, increment: f64, timestamp: DateTime<Utc>) -> f64 {
        if state.last_timestamp.is_some_and(|last| timestamp <= last) {
            return state.z;
        }
        state.last_timestamp = Some(timestamp);
        if state.capacity != self.params.window {
            state.set_capacity(self.params.window);
        }
        if increment.is_finite() && increment >= 0.0 {
            state.push(increment);
        }
        state.recompute(&self.params);
        state.z
    }
}

/// Turns a cumulative session volume into dollar-volume increments.
#[derive(Debug, Clone, Copy, Default)]
pub struct CumulativeVolume {
    last_total: Option<u64>,
}

impl CumulativeVolume {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dollar volume traded since the previous observation, or `None` on the
    /// first observation or when the total did not grow.
    pub fn increment(&mut self, last_price: f64, total_volume: u64) -> Option<f64> {
        let prev = self.last_total.replace(total_volume)?;
        if total_volume > prev && last_price.is_finite() && last_price > 0.0 {
            Some(last_price * (total_volume - prev) as f64)
        } else {
            None
        }
    }
}
