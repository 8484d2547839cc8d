//! Ladderbot Core: ladder pricing, clip sizing, and rung-state engine.
//!
//! This crate turns per-symbol market state into sized, risk-gated order
//! intents:
//! - Momentum signal from rolling dollar-volume z-scores
//! - Anchor blending from session medians
//! - Seven-rung buy/sell ladders around the anchor, triggered at rung 4
//! - Depth-scaled USD clips per rung
//! - Rung state machine with ordered entry, LIFO unwind, and protective exits
//! - Idempotent cycle orchestration with broker reconciliation
//!
//! All logic is synchronous. Broker and market-data I/O live behind
//! [`gateway::OrderGateway`] and the caller-supplied ticks.

pub mod components;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;

pub use config::BotConfig;
pub use engine::{CycleOutput, Orchestrator};
pub use error::{LadderError, Result};
