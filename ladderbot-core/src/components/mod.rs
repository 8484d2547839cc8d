//! Per-symbol pricing components: signal, anchor, ladder, clip.

pub mod anchor;
pub mod clip;
pub mod ladder;
pub mod signal;

pub use anchor::{blend, blend_lookback, AnchorState, MinuteBar, SessionMedians};
pub use clip::{ClassBudget, ClipPlan};
pub use ladder::{momentum_multipliers, LadderPlan, MomentumMultipliers};
pub use signal::{CumulativeVolume, SignalEngine, VolatilityState};
