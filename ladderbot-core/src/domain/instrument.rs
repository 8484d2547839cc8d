use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LadderError, Result};

/// Risk class of an instrument. Drives ladder width, spread limits, stops,
/// and the share of equity the class receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskClass {
    Risky,
    Safe,
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskClass::Risky => write!(f, "risky"),
            RiskClass::Safe => write!(f, "safe"),
        }
    }
}

/// Per-instrument configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    #[serde(default = "default_class")]
    pub class: RiskClass,
    /// Base buy offset as a fraction of the anchor (0.006 = 0.60%).
    #[serde(default = "default_buy_pct")]
    pub base_buy_pct: f64,
    /// Base sell offset as a fraction of the anchor.
    #[serde(default = "default_sell_pct")]
    pub base_sell_pct: f64,
    /// Fixed USD clip; bypasses dynamic sizing when set.
    #[serde(default)]
    pub clip_override: Option<f64>,
    /// Share of the class budget given to this instrument. Unset means an
    /// equal split across the instruments of the class.
    #[serde(default)]
    pub allocation_share: Option<f64>,
}

fn default_class() -> RiskClass {
    RiskClass::Risky
}

fn default_buy_pct() -> f64 {
    0.02
}

fn default_sell_pct() -> f64 {
    0.015
}

impl InstrumentConfig {
    pub fn new(symbol: impl Into<String>, class: RiskClass, base_buy_pct: f64, base_sell_pct: f64) -> Self {
        Self {
            symbol: symbol.into(),
            class,
            base_buy_pct,
            base_sell_pct,
            clip_override: None,
            allocation_share: None,
        }
    }

    pub fn with_clip_override(mut self, clip_usd: f64) -> Self {
        self.clip_override = Some(clip_usd);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(LadderError::invalid("instrument symbol is empty"));
        }
        for (name, pct) in [("base_buy_pct", self.base_buy_pct), ("base_sell_pct", self.base_sell_pct)] {
            if !pct.is_finite() || pct <= 0.0 || pct >= 1.0 {
                return Err(LadderError::invalid(format!(
                    "{}: {name} must be in (0, 1), got {pct}",
                    self.symbol
                )));
            }
        }
        if let Some(clip) = self.clip_override {
            if !clip.is_finite() || clip <= 0.0 {
                return Err(LadderError::invalid(format!(
                    "{}: clip_override must be positive, got {clip}",
                    self.symbol
                )));
            }
        }
        if let Some(share) = self.allocation_share {
            if !share.is_finite() || share <= 0.0 || share > 1.0 {
                return Err(LadderError::invalid(format!(
                    "{}: allocation_share must be in (0, 1], got {share}",
                    self.symbol
                )));
            }
        }
        Ok(())
    }
}
