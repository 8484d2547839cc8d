//! Domain types for the ladder engine

pub mod fill;
pub mod instrument;
pub mod intent;
pub mod position;
pub mod quote;
pub mod rung;

pub use fill::{Fill, FillRecord, SubmissionOutcome};
pub use instrument::{InstrumentConfig, RiskClass};
pub use intent::{ioc_limit, IntentId, IntentKey, IntentReason, OrderIntent, PriceMode, Side, Urgency};
pub use position::{OccupiedRung, PositionState, SHARE_EPSILON};
pub use quote::{sanitize_price, Tick};
pub use rung::{RungIndex, Rungs, RUNG_COUNT};
