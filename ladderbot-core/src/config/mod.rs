//! Serializable bot configuration.
//!
//! Loaded from TOML at startup and optionally hot-reloaded through a
//! [`ConfigProvider`]. Every section has defaults, so a file listing only the
//! instruments is a valid config. `validate()` rejects anything the engine
//! would otherwise have to coerce silently.

pub mod provider;

pub use provider::{ConfigProvider, FileProvider, StaticProvider};

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::domain::{InstrumentConfig, RiskClass, Rungs};
use crate::error::{LadderError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Account equity the allocation layer sizes against (USD).
    #[serde(default = "default_equity")]
    pub equity: f64,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    pub classes: ClassProfiles,
    #[serde(default)]
    pub ladder: LadderParams,
    #[serde(default)]
    pub sizing: SizingParams,
    #[serde(default)]
    pub signal: SignalParams,
    #[serde(default)]
    pub anchor: AnchorWeights,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_equity() -> f64 {
    150_000.0
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            equity: default_equity(),
            instruments: Vec::new(),
            classes: ClassProfiles::default(),
            ladder: LadderParams::default(),
            sizing: SizingParams::default(),
            signal: SignalParams::default(),
            anchor: AnchorWeights::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: BotConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|i| i.symbol == symbol)
    }

    pub fn profile(&self, class: RiskClass) -> &ClassProfile {
        match class {
            RiskClass::Risky => &self.classes.risky,
            RiskClass::Safe => &self.classes.safe,
        }
    }

    /// Number of configured instruments in `class`.
    pub fn class_count(&self, class: RiskClass) -> usize {
        self.instruments.iter().filter(|i| i.class == class).count()
    }

    /// Content hash of the canonical JSON encoding.
    ///
    /// Two configs with the same fingerprint are interchangeable; the file
    /// provider uses this to ignore rewrites that change nothing.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.equity.is_finite() || self.equity <= 0.0 {
            return Err(LadderError::invalid(format!(
                "equity must be positive, got {}",
                self.equity
            )));
        }

        let mut seen = HashSet::new();
        for inst in &self.instruments {
            inst.validate()?;
            if !seen.insert(inst.symbol.as_str()) {
                return Err(LadderError::invalid(format!(
                    "duplicate instrument {}",
                    inst.symbol
                )));
            }
        }

        self.classes.risky.validate(RiskClass::Risky)?;
        self.classes.safe.validate(RiskClass::Safe)?;
        let total_alloc = self.classes.risky.allocation + self.classes.safe.allocation;
        if total_alloc > 1.0 + 1e-9 {
            return Err(LadderError::invalid(format!(
                "class allocations sum to {total_alloc}, must not exceed 1"
            )));
        }

        self.ladder.validate()?;
        self.sizing.validate()?;
        self.signal.validate()?;
        self.anchor.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

// ── Per-class profile ───────────────────────────────────────────────

/// Hard risk limits for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum `(ask - bid) / mid` for entries.
    pub max_spread: f64,
    /// Full exit when price falls this fraction below average cost.
    pub hard_stop_pct: f64,
    /// Full exit when price falls this fraction below the high-water mark.
    pub trailing_pct: f64,
    /// Minimum unrealised gain over average cost before a breakeven trim.
    pub breakeven_min_gain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProfile {
    pub limits: RiskLimits,
    /// Ladder widening for the class (5x risky, 3x safe).
    pub spread_mult: f64,
    /// Fraction of the deployable equity given to the class.
    pub allocation: f64,
    /// Scales the dynamic clip for the class.
    pub clip_risk_mult: f64,
}

impl ClassProfile {
    pub fn risky() -> Self {
        Self {
            limits: RiskLimits {
                max_spread: 0.018,
                hard_stop_pct: 0.05,
                trailing_pct: 0.025,
                breakeven_min_gain: 0.0005,
            },
            spread_mult: 5.0,
            allocation: 0.6,
            clip_risk_mult: 1.15,
        }
    }

    pub fn safe() -> Self {
        Self {
            limits: RiskLimits {
                max_spread: 0.008,
                hard_stop_pct: 0.05,
                trailing_pct: 0.025,
                breakeven_min_gain: 0.0005,
            },
            spread_mult: 3.0,
            allocation: 0.4,
            clip_risk_mult: 0.85,
        }
    }

    fn validate(&self, class: RiskClass) -> Result<()> {
        let l = &self.limits;
        let fractions = [
            ("max_spread", l.max_spread),
            ("hard_stop_pct", l.hard_stop_pct),
            ("trailing_pct", l.trailing_pct),
        ];
        for (name, v) in fractions {
            if !v.is_finite() || v <= 0.0 || v >= 1.0 {
                return Err(LadderError::invalid(format!(
                    "{class}.{name} must be in (0, 1), got {v}"
                )));
            }
        }
        if !l.breakeven_min_gain.is_finite() || l.breakeven_min_gain < 0.0 {
            return Err(LadderError::invalid(format!(
                "{class}.breakeven_min_gain must be >= 0, got {}",
                l.breakeven_min_gain
            )));
        }
        if !self.spread_mult.is_finite() || self.spread_mult < 1.0 {
            return Err(LadderError::invalid(format!(
                "{class}.spread_mult must be >= 1, got {}",
                self.spread_mult
            )));
        }
        if !(0.0..=1.0).contains(&self.allocation) {
            return Err(LadderError::invalid(format!(
                "{class}.allocation must be in [0, 1], got {}",
                self.allocation
            )));
        }
        if !self.clip_risk_mult.is_finite() || self.clip_risk_mult <= 0.0 {
            return Err(LadderError::invalid(format!(
                "{class}.clip_risk_mult must be positive, got {}",
                self.clip_risk_mult
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProfiles {
    #[serde(default = "ClassProfile::risky")]
    pub risky: ClassProfile,
    #[serde(default = "ClassProfile::safe")]
    pub safe: ClassProfile,
}

impl Default for ClassProfiles {
    fn default() -> Self {
        Self {
            risky: ClassProfile::risky(),
            safe: ClassProfile::safe(),
        }
    }
}

// ── Ladder ──────────────────────────────────────────────────────────

/// Maps the momentum z-score to ladder multipliers.
///
/// `zc = clamp(z, -z_clamp, z_clamp)`,
/// `buy = max(min_mult, 1 + buy_slope * zc)`,
/// `sell = max(min_mult, 1 - sell_slope * zc)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    pub z_clamp: f64,
    pub buy_slope: f64,
    pub sell_slope: f64,
    pub min_mult: f64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            z_clamp: 2.0,
            buy_slope: 0.25,
            sell_slope: 0.15,
            min_mult: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderParams {
    /// Rung offsets relative to the trigger rung's offset. Rung 4 must be 1.0.
    pub rung_mults: Rungs<f64>,
    /// Clip scaling per rung depth. Non-decreasing.
    pub clip_mults: Rungs<f64>,
    pub momentum: MomentumParams,
    /// How far the display ladder pushes the trigger rung from the anchor.
    pub display_anchor_mult: f64,
}

impl Default for LadderParams {
    fn default() -> Self {
        Self {
            rung_mults: Rungs::new([0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75]),
            clip_mults: Rungs::new([1.0, 1.2, 1.4, 1.6, 1.8, 2.0, 2.3]),
            momentum: MomentumParams::default(),
            display_anchor_mult: 2.0,
        }
    }
}

impl LadderParams {
    fn validate(&self) -> Result<()> {
        let rm = &self.rung_mults;
        if rm.values().iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(LadderError::invalid("ladder.rung_mults must all be positive"));
        }
        if (rm.trigger() - 1.0).abs() > 1e-9 {
            return Err(LadderError::invalid(format!(
                "ladder.rung_mults trigger rung must be 1.0, got {}",
                rm.trigger()
            )));
        }
        if !rm.is_strictly_increasing() {
            return Err(LadderError::invalid("ladder.rung_mults must be strictly increasing"));
        }
        if !rm.is_symmetric_about_trigger() {
            return Err(LadderError::invalid(
                "ladder.rung_mults must be symmetric around the trigger rung",
            ));
        }

        let cm = &self.clip_mults;
        if cm.values().iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(LadderError::invalid("ladder.clip_mults must all be positive"));
        }
        if !cm.is_non_decreasing() {
            return Err(LadderError::invalid("ladder.clip_mults must be non-decreasing"));
        }

        let m = &self.momentum;
        if [m.z_clamp, m.buy_slope, m.sell_slope, m.min_mult]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(LadderError::invalid("ladder.momentum parameters must be >= 0"));
        }
        if m.min_mult <= 0.0 {
            return Err(LadderError::invalid("ladder.momentum.min_mult must be positive"));
        }
        if !self.display_anchor_mult.is_finite() || self.display_anchor_mult < 1.0 {
            return Err(LadderError::invalid("ladder.display_anchor_mult must be >= 1"));
        }
        Ok(())
    }
}

// ── Sizing ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingParams {
    /// Fraction of equity the allocation layer may deploy.
    pub target_utilization: f64,
    /// Base clip = per-ticker budget / shots.
    pub shots_per_ticker: u32,
    /// Names priced below this get a larger clip (up to 2x), above it smaller (down to 0.5x).
    pub clip_price_ref: f64,
    pub min_clip: f64,
    pub max_clip: f64,
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            target_utilization: 0.67,
            shots_per_ticker: 12,
            clip_price_ref: 50.0,
            min_clip: 100.0,
            max_clip: 6_000.0,
        }
    }
}

impl SizingParams {
    fn validate(&self) -> Result<()> {
        if !(self.target_utilization > 0.0 && self.target_utilization <= 1.0) {
            return Err(LadderError::invalid(format!(
                "sizing.target_utilization must be in (0, 1], got {}",
                self.target_utilization
            )));
        }
        if self.shots_per_ticker == 0 {
            return Err(LadderError::invalid("sizing.shots_per_ticker must be >= 1"));
        }
        if !self.clip_price_ref.is_finite() || self.clip_price_ref <= 0.0 {
            return Err(LadderError::invalid("sizing.clip_price_ref must be positive"));
        }
        if !(self.min_clip > 0.0 && self.min_clip <= self.max_clip) {
            return Err(LadderError::invalid(format!(
                "sizing clip bounds invalid: min {} max {}",
                self.min_clip, self.max_clip
            )));
        }
        Ok(())
    }
}

// ── Signal ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    /// Rolling window of dollar-volume increments.
    pub window: usize,
    /// Below this many samples the z-score is 0.
    pub min_samples: usize,
    /// Absolute cap on the reported z-score.
    pub z_cap: f64,
    /// Floor on the standard deviation.
    pub epsilon: f64,
}

/// Largest accepted `signal.window`.
pub const MAX_SIGNAL_WINDOW: usize = 100_000;

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            window: 120,
            min_samples: 3,
            z_cap: 6.0,
            epsilon: 1e-9,
        }
    }
}

impl SignalParams {
    fn validate(&self) -> Result<()> {
        if self.window < 2 || self.window > MAX_SIGNAL_WINDOW {
            return Err(LadderError::invalid(format!(
                "signal.window must be in [2, {MAX_SIGNAL_WINDOW}], got {}",
                self.window
            )));
        }
        if self.min_samples < 2 || self.min_samples > self.window {
            return Err(LadderError::invalid(format!(
                "signal.min_samples must be in [2, window], got {}",
                self.min_samples
            )));
        }
        if !(self.z_cap > 0.0) || !(self.epsilon > 0.0) {
            return Err(LadderError::invalid("signal.z_cap and signal.epsilon must be positive"));
        }
        Ok(())
    }
}

// ── Anchor ──────────────────────────────────────────────────────────

/// Relative weights of the three anchor sources. Renormalised over the
/// sources that are available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorWeights {
    pub premarket: f64,
    pub initial_balance: f64,
    pub regular_hours: f64,
}

impl Default for AnchorWeights {
    fn default() -> Self {
        Self {
            premarket: 1.0,
            initial_balance: 1.0,
            regular_hours: 1.0,
        }
    }
}

impl AnchorWeights {
    fn validate(&self) -> Result<()> {
        let w = [self.premarket, self.initial_balance, self.regular_hours];
        if w.iter().any(|v| !v.is_finite() || *v < 0.0) || w.iter().sum::<f64>() <= 0.0 {
            return Err(LadderError::invalid(
                "anchor weights must be >= 0 with a positive sum",
            ));
        }
        Ok(())
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// Exchange-local trading hours at a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradingHours {
    pub utc_offset_hours: i32,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for TradingHours {
    fn default() -> Self {
        Self {
            utc_offset_hours: -4,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
        }
    }
}

impl TradingHours {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
    }

    /// Exchange-local wall-clock time of `at`.
    pub fn local_time(&self, at: DateTime<Utc>) -> Option<NaiveTime> {
        self.offset().map(|off| at.with_timezone(&off).time())
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.local_time(at)
            .is_some_and(|t| t >= self.open && t < self.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ticks older than this are skipped.
    pub max_quote_age_ms: i64,
    /// Minimum time between confirmed ladder buys per symbol.
    pub buy_cooldown_ms: i64,
    /// Share of the position sold by a breakeven trim. 0 disables trims.
    pub breakeven_trim_fraction: f64,
    /// IOC price bump for ordinary orders.
    pub normal_bump: f64,
    /// IOC price bump for protective exits and short covers.
    pub urgent_bump: f64,
    /// Share difference tolerated before reconciliation reports a mismatch.
    pub reconcile_tolerance: f64,
    /// Evaluate symbols on the rayon pool instead of sequentially.
    pub parallel: bool,
    /// When set, the ladder path only runs inside these hours.
    pub trading_hours: Option<TradingHours>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_quote_age_ms: 5_000,
            buy_cooldown_ms: 3_000,
            breakeven_trim_fraction: 0.25,
            normal_bump: 0.004,
            urgent_bump: 0.02,
            reconcile_tolerance: 1e-6,
            parallel: false,
            trading_hours: None,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.max_quote_age_ms <= 0 {
            return Err(LadderError::invalid("engine.max_quote_age_ms must be positive"));
        }
        if self.buy_cooldown_ms < 0 {
            return Err(LadderError::invalid("engine.buy_cooldown_ms must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.breakeven_trim_fraction) {
            return Err(LadderError::invalid(format!(
                "engine.breakeven_trim_fraction must be in [0, 1], got {}",
                self.breakeven_trim_fraction
            )));
        }
        for (name, bump) in [("normal_bump", self.normal_bump), ("urgent_bump", self.urgent_bump)] {
            if !(0.0..1.0).contains(&bump) {
                return Err(LadderError::invalid(format!(
                    "engine.{name} must be in [0, 1), got {bump}"
                )));
            }
        }
        if !(self.reconcile_tolerance >= 0.0) {
            return Err(LadderError::invalid("engine.reconcile_tolerance must be >= 0"));
        }
        if let Some(hours) = &self.trading_hours {
            if hours.offset().is_none() || hours.open >= hours.close {
                return Err(LadderError::invalid("engine.trading_hours invalid"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"
equity = 100000.0

[[instruments]]
symbol = "RCAT"
class = "risky"
base_buy_pct = 0.006
base_sell_pct = 0.006

[[instruments]]
symbol = "AVAV"
class = "safe"
base_buy_pct = 0.004
base_sell_pct = 0.003
clip_override = 1500.0

[classes.risky]
spread_mult = 5.0
allocation = 0.6
clip_risk_mult = 1.15
limits = { max_spread = 0.018, hard_stop_pct = 0.05, trailing_pct = 0.025, breakeven_min_gain = 0.0005 }

[engine]
buy_cooldown_ms = 0
trading_hours = { utc_offset_hours = -4, open = "09:30:00", close = "16:00:00" }
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = BotConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.equity, 100_000.0);
        assert_eq!(config.instruments.len(), 2);
        assert_eq!(config.class_count(RiskClass::Risky), 1);
        assert_eq!(config.profile(RiskClass::Safe).spread_mult, 3.0);
        assert_eq!(config.signal.window, 120);
        assert_eq!(config.engine.buy_cooldown_ms, 0);
        assert_eq!(config.instrument("AVAV").unwrap().clip_override, Some(1500.0));
        assert!(config.engine.trading_hours.is_some());
    }

    #[test]
    fn bundled_basket_config_is_valid() {
        let config = BotConfig::from_toml_str(include_str!("../../../configs/basket.toml")).unwrap();
        assert_eq!(config.instruments.len(), 4);
        assert_eq!(config.class_count(RiskClass::Safe), 2);
    }

    #[test]
    fn rejects_oversized_signal_window() {
        let text = format!("{SAMPLE}\n[signal]\nwindow = 9223372036854775807\n");
        let err = BotConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, LadderError::ConfigInvalid(_)));
        assert!(err.to_string().contains("signal.window"));

        let text = format!("{SAMPLE}\n[signal]\nwindow = {MAX_SIGNAL_WINDOW}\n");
        assert_eq!(BotConfig::from_toml_str(&text).unwrap().signal.window, MAX_SIGNAL_WINDOW);
    }

    #[test]
    fn rejects_non_monotonic_clip_mults() {
        let mut config = BotConfig::default();
        config.ladder.clip_mults = Rungs::new([1.0, 1.2, 1.1, 1.6, 1.8, 2.0, 2.3]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("non-decreasing"));
    }

    #[test]
    fn rejects_asymmetric_rung_mults() {
        let mut config = BotConfig::default();
        config.ladder.rung_mults = Rungs::new([0.5, 0.6, 0.8, 1.0, 1.25, 1.5, 1.75]);
        assert!(matches!(config.validate(), Err(LadderError::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_trigger_rung_off_unity() {
        let mut config = BotConfig::default();
        config.ladder.rung_mults = Rungs::new([0.4, 0.6, 0.8, 1.1, 1.4, 1.6, 1.8]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_stop() {
        let mut config = BotConfig::default();
        config.classes.safe.limits.hard_stop_pct = -0.05;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let mut config = BotConfig::default();
        config.instruments = vec![
            InstrumentConfig::new("RCAT", RiskClass::Risky, 0.01, 0.01),
            InstrumentConfig::new("RCAT", RiskClass::Safe, 0.01, 0.01),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_over_allocation() {
        let mut config = BotConfig::default();
        config.classes.risky.allocation = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = BotConfig::default();
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.equity = 1.0;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn trading_hours_use_exchange_offset() {
        let hours = TradingHours::default();
        // 13:29 UTC = 09:29 at UTC-4
        let before = Utc.with_ymd_and_hms(2024, 6, 3, 13, 29, 0).unwrap();
        let open = Utc.with_ymd_and_hms(2024, 6, 3, 13, 30, 0).unwrap();
        let closed = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
        assert!(!hours.contains(before));
        assert!(hours.contains(open));
        assert!(!hours.contains(closed));
    }
}
