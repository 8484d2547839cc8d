//! Rung indexing: a fixed seven-slot ladder addressed 1..=7.
//!
//! Rung 1 is the shallowest level (closest to the anchor), rung 7 the deepest.
//! Rung 4 is the trigger rung: its offset from the anchor is the configured
//! anchor offset, and the other rungs fan out around it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Number of rungs on each side of the ladder.
pub const RUNG_COUNT: usize = 7;

/// A rung number in `1..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RungIndex(u8);

impl RungIndex {
    pub const SHALLOWEST: RungIndex = RungIndex(1);
    pub const TRIGGER: RungIndex = RungIndex(4);
    pub const DEEPEST: RungIndex = RungIndex(RUNG_COUNT as u8);

    /// Returns `None` outside `1..=7`.
    pub fn new(n: u8) -> Option<Self> {
        (1..=RUNG_COUNT as u8).contains(&n).then_some(RungIndex(n))
    }

    /// The rung a ladder at `depth` occupied rungs would fill next.
    pub fn after_depth(depth: usize) -> Option<Self> {
        u8::try_from(depth + 1).ok().and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based slot position.
    pub fn slot(self) -> usize {
        self.0 as usize - 1
    }

    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    pub fn all() -> impl Iterator<Item = RungIndex> {
        (1..=RUNG_COUNT as u8).map(RungIndex)
    }
}

impl TryFrom<u8> for RungIndex {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        RungIndex::new(n).ok_or_else(|| format!("rung index {n} outside 1..={RUNG_COUNT}"))
    }
}

impl From<RungIndex> for u8 {
    fn from(r: RungIndex) -> u8 {
        r.0
    }
}

impl fmt::Display for RungIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// One value per rung, addressed by `RungIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rungs<T>([T; RUNG_COUNT]);

impl<T> Rungs<T> {
    pub const fn new(values: [T; RUNG_COUNT]) -> Self {
        Self(values)
    }

    pub fn from_fn(mut f: impl FnMut(RungIndex) -> T) -> Self {
        Self(std::array::from_fn(|slot| f(RungIndex(slot as u8 + 1))))
    }

    pub fn map<U>(&self, mut f: impl FnMut(RungIndex, &T) -> U) -> Rungs<U> {
        Rungs::from_fn(|r| f(r, &self[r]))
    }

    pub fn trigger(&self) -> &T {
        &self[RungIndex::TRIGGER]
    }

    pub fn iter(&self) -> impl Iterator<Item = (RungIndex, &T)> {
        RungIndex::all().zip(self.0.iter())
    }

    pub fn values(&self) -> &[T; RUNG_COUNT] {
        &self.0
    }
}

impl<T> Index<RungIndex> for Rungs<T> {
    type Output = T;

    fn index(&self, rung: RungIndex) -> &T {
        &self.0[rung.slot()]
    }
}

impl<T> IndexMut<RungIndex> for Rungs<T> {
    fn index_mut(&mut self, rung: RungIndex) -> &mut T {
        &mut self.0[rung.slot()]
    }
}

impl Rungs<f64> {
    /// True when every value is >= the one before it.
    pub fn is_non_decreasing(&self) -> bool {
        self.0.windows(2).all(|w| w[1] >= w[0])
    }

    pub fn is_strictly_increasing(&self) -> bool {
        self.0.windows(2).all(|w| w[1] > w[0])
    }

    /// True when the values mirror around the trigger rung:
    /// `m[4-k] + m[4+k] == 2 * m[4]` for k in 1..=3.
    pub fn is_symmetric_about_trigger(&self) -> bool {
        let mid = RungIndex::TRIGGER.slot();
        let centre = self.0[mid];
        (1..=mid).all(|k| (self.0[mid - k] + self.0[mid + k] - 2.0 * centre).abs() < 1e-9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_bounds() {
        assert!(RungIndex::new(0).is_none());
        assert!(RungIndex::new(8).is_none());
        assert_eq!(RungIndex::new(4), Some(RungIndex::TRIGGER));
        assert_eq!(RungIndex::after_depth(0), Some(RungIndex::SHALLOWEST));
        assert_eq!(RungIndex::after_depth(6), Some(RungIndex::DEEPEST));
        assert_eq!(RungIndex::after_depth(7), None);
    }

    #[test]
    fn rungs_index_by_rung_number() {
        let r = Rungs::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(r[RungIndex::SHALLOWEST], 1.0);
        assert_eq!(*r.trigger(), 4.0);
        assert_eq!(r[RungIndex::DEEPEST], 7.0);
    }

    #[test]
    fn symmetry_check() {
        let sym = Rungs::new([0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75]);
        assert!(sym.is_symmetric_about_trigger());
        let skew = Rungs::new([0.5, 0.6, 0.8, 1.0, 1.25, 1.5, 1.75]);
        assert!(!skew.is_symmetric_about_trigger());
    }

    #[test]
    fn serde_rejects_out_of_range_index() {
        let ok: RungIndex = serde_json::from_str("3").unwrap();
        assert_eq!(ok.get(), 3);
        assert!(serde_json::from_str::<RungIndex>("9").is_err());
    }
}
