//! Cycle orchestrator: one pass over every configured symbol per polling tick.
//!
//! Per symbol, in order: reconcile against the broker, freshness check,
//! signal update, protective exits, then (session and anchor permitting) the
//! ladder path. Symbols are independent; each `SymbolBook` is exclusively
//! borrowed for its own evaluation, so the pass may run on the rayon pool.
//! Intents only reach `PositionState` through confirmed fills.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::pending::{Admission, PendingLedger};
use super::reconcile::{reconcile, Reconciliation};
use super::rung_machine::{apply_fill, ladder_action, protective_exit, short_cover, IntentDraft, RungContext};
use crate::components::clip::{self, ClassBudget};
use crate::components::ladder;
use crate::components::{AnchorState, SessionMedians, SignalEngine, VolatilityState};
use crate::config::{BotConfig, ConfigProvider};
use crate::domain::{
    Fill, FillRecord, InstrumentConfig, IntentId, IntentReason, OrderIntent, PositionState, Side, Tick, SHARE_EPSILON,
};
use crate::error::{LadderError, Result};
use crate::gateway::{BrokerPosition, BrokerPositions};

/// Everything the engine keeps for one symbol across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolBook {
    pub anchor: AnchorState,
    pub vol: VolatilityState,
    pub position: PositionState,
}

impl SymbolBook {
    fn new(signal: &SignalEngine) -> Self {
        Self {
            anchor: AnchorState::new(),
            vol: signal.new_state(),
            position: PositionState::new(),
        }
    }
}

/// A symbol that produced no ladder decision this cycle, and why.
#[derive(Debug)]
pub struct SymbolSkip {
    pub symbol: String,
    pub error: LadderError,
}

#[derive(Debug, Default)]
pub struct CycleOutput {
    /// Intents first issued this cycle, short covers and protective exits first.
    pub intents: Vec<OrderIntent>,
    /// Every unresolved intent after this cycle, including the new ones.
    pub pending: Vec<OrderIntent>,
    pub skipped: Vec<SymbolSkip>,
}

struct Evaluation {
    symbol: String,
    draft: Option<IntentDraft>,
    skip: Option<LadderError>,
}

impl Evaluation {
    fn emit(symbol: &str, draft: IntentDraft) -> Self {
        Self {
            symbol: symbol.to_string(),
            draft: Some(draft),
            skip: None,
        }
    }

    fn skip(symbol: &str, error: LadderError) -> Self {
        Self {
            symbol: symbol.to_string(),
            draft: None,
            skip: Some(error),
        }
    }

    fn idle(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            draft: None,
            skip: None,
        }
    }
}

pub struct Orchestrator {
    config: BotConfig,
    signal: SignalEngine,
    books: BTreeMap<String, SymbolBook>,
    pending: PendingLedger,
}

impl Orchestrator {
    pub fn new(config: BotConfig) -> Result<Self> {
        config.validate()?;
        let signal = SignalEngine::new(config.signal);
        let mut orch = Self {
            config,
            signal,
            books: BTreeMap::new(),
            pending: PendingLedger::new(),
        };
        orch.ensure_books();
        Ok(orch)
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn book(&self, symbol: &str) -> Option<&SymbolBook> {
        self.books.get(symbol)
    }

    pub fn books(&self) -> &BTreeMap<String, SymbolBook> {
        &self.books
    }

    pub fn pending(&self) -> Vec<OrderIntent> {
        self.pending.intents()
    }

    fn ensure_books(&mut self) {
        for inst in &self.config.instruments {
            if !self.books.contains_key(&inst.symbol) {
                self.books.insert(inst.symbol.clone(), SymbolBook::new(&self.signal));
            }
        }
    }

    /// Swap in a new configuration. Books (and their occupancy stacks) are
    /// kept, including those of symbols the new config no longer lists.
    pub fn apply_config(&mut self, config: BotConfig) -> Result<()> {
        config.validate()?;
        self.signal = SignalEngine::new(config.signal);
        for book in self.books.values_mut() {
            book.anchor.reweight(&config.anchor);
        }
        info!(
            fingerprint = %config.fingerprint(),
            instruments = config.instruments.len(),
            "config applied"
        );
        self.config = config;
        self.ensure_books();
        Ok(())
    }

    /// Poll a provider and apply whatever it hands out. Returns whether the
    /// configuration changed.
    pub fn poll_config(&mut self, provider: &mut dyn ConfigProvider) -> Result<bool> {
        match provider.poll()? {
            Some(config) => {
                self.apply_config(config)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Set the session medians for a configured symbol and re-blend its anchor.
    pub fn set_session_medians(&mut self, symbol: &str, medians: SessionMedians) -> Result<()> {
        if self.config.instrument(symbol).is_none() {
            return Err(LadderError::UnknownSymbol(symbol.to_string()));
        }
        let weights = self.config.anchor;
        let signal = self.signal;
        let book = self
            .books
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolBook::new(&signal));
        book.anchor.refresh(medians, &weights);
        debug!(symbol, ?medians, anchor = ?book.anchor.anchor(symbol).ok(), "session medians set");
        Ok(())
    }

    /// Evaluate every configured symbol once.
    ///
    /// Calling this again with the same inputs and no fills in between leaves
    /// the pending set unchanged and emits no new intents.
    pub fn run_cycle(&mut self, now: DateTime<Utc>, ticks: &[Tick], broker: &BrokerPositions) -> CycleOutput {
        self.ensure_books();
        let latest = latest_ticks(ticks);
        let config = &self.config;
        let signal = &self.signal;

        let evaluate = |(symbol, book): (&String, &mut SymbolBook)| -> Option<Evaluation> {
            let instrument = config.instrument(symbol)?;
            let tick = latest.get(symbol.as_str()).copied();
            Some(evaluate_symbol(config, signal, instrument, book, tick, broker.get(symbol), now))
        };
        let evaluations: Vec<Evaluation> = if config.engine.parallel {
            self.books.par_iter_mut().filter_map(evaluate).collect()
        } else {
            self.books.iter_mut().filter_map(evaluate).collect()
        };

        let mut output = CycleOutput::default();
        for eval in evaluations {
            if let Some(error) = eval.skip {
                debug!(symbol = %eval.symbol, %error, "symbol skipped");
                output.skipped.push(SymbolSkip {
                    symbol: eval.symbol.clone(),
                    error,
                });
            }
            let Some(draft) = eval.draft else {
                continue;
            };
            match self.pending.admit(&eval.symbol, draft) {
                Admission::Issued(intent) => {
                    info!(%intent, "intent emitted");
                    output.intents.push(intent);
                }
                Admission::AlreadyPending(id) => {
                    debug!(symbol = %eval.symbol, %id, "intent already pending");
                }
                Admission::Suppressed { blocking } => {
                    debug!(symbol = %eval.symbol, %blocking, "intent suppressed by pending intent");
                }
            }
        }
        output
            .intents
            .sort_by(|a, b| priority(a).cmp(&priority(b)).then_with(|| a.symbol.cmp(&b.symbol)));
        output.pending = self.pending.intents();
        output
    }

    /// Apply a confirmed fill for a pending intent. Unknown ids and empty
    /// fills resolve nothing into the position.
    pub fn confirm_fill(&mut self, id: IntentId, fill: Fill) -> Option<FillRecord> {
        let Some(intent) = self.pending.resolve(id) else {
            warn!(%id, "fill for unknown intent ignored");
            return None;
        };
        if fill.quantity <= SHARE_EPSILON {
            info!(%intent, "IOC expired unfilled");
            return None;
        }
        let signal = self.signal;
        let book = self
            .books
            .entry(intent.symbol.clone())
            .or_insert_with(|| SymbolBook::new(&signal));
        let record = apply_fill(&mut book.position, &intent, &fill);
        info!(
            symbol = %record.symbol,
            side = %record.side,
            quantity = record.quantity,
            price = record.price,
            reason = %record.reason,
            realized_pnl = record.realized_pnl,
            depth = book.position.depth(),
            "fill applied"
        );
        Some(record)
    }

    /// Drop a pending intent the gateway declined. The rung stays unfilled and
    /// is evaluated again next cycle.
    pub fn reject(&mut self, id: IntentId, reason: &str) -> Option<OrderIntent> {
        let intent = self.pending.resolve(id)?;
        let err = LadderError::SubmissionRejected {
            symbol: intent.symbol.clone(),
            reason: reason.to_string(),
        };
        warn!(%intent, error = %err, "submission rejected");
        Some(intent)
    }
}

fn latest_ticks(ticks: &[Tick]) -> HashMap<&str, &Tick> {
    let mut latest: HashMap<&str, &Tick> = HashMap::new();
    for tick in ticks {
        let slot = latest.entry(tick.symbol.as_str()).or_insert(tick);
        if tick.timestamp > slot.timestamp {
            *slot = tick;
        }
    }
    latest
}

fn priority(intent: &OrderIntent) -> u8 {
    match (intent.reason, intent.side) {
        (IntentReason::ShortCover, _) => 0,
        (IntentReason::HardStop | IntentReason::TrailingStop, _) => 1,
        (IntentReason::Breakeven, _) => 2,
        (IntentReason::Ladder, Side::Sell) => 3,
        (IntentReason::Ladder, Side::Buy) => 4,
    }
}

fn evaluate_symbol(
    config: &BotConfig,
    signal: &SignalEngine,
    instrument: &InstrumentConfig,
    book: &mut SymbolBook,
    tick: Option<&Tick>,
    broker: Option<&BrokerPosition>,
    now: DateTime<Utc>,
) -> Evaluation {
    let symbol = instrument.symbol.as_str();
    let engine = &config.engine;

    let recon = reconcile(symbol, &mut book.position, broker, engine.reconcile_tolerance);

    let Some(tick) = tick else {
        return Evaluation::skip(symbol, LadderError::NoQuote { symbol: symbol.to_string() });
    };
    let Some(price) = tick.last_price() else {
        return Evaluation::skip(symbol, LadderError::NoQuote { symbol: symbol.to_string() });
    };

    // a short is covered on any usable price, fresh or not
    if let Reconciliation::Short { shares } = recon {
        return Evaluation::emit(symbol, short_cover(shares, tick, engine));
    }

    let age_ms = tick.age_ms(now);
    if age_ms > engine.max_quote_age_ms {
        return Evaluation::skip(
            symbol,
            LadderError::StaleQuote {
                symbol: symbol.to_string(),
                age_ms,
                max_ms: engine.max_quote_age_ms,
            },
        );
    }

    let z = signal.update(&mut book.vol, tick.dollar_volume, tick.timestamp);
    book.position.mark(price);

    let profile = config.profile(instrument.class);
    let ctx = RungContext {
        tick,
        price,
        z,
        limits: &profile.limits,
        engine,
        now,
    };
    if let Some(exit) = protective_exit(&book.position, &ctx) {
        return Evaluation::emit(symbol, exit);
    }

    if let Some(hours) = &engine.trading_hours {
        if !hours.contains(now) {
            return Evaluation::skip(symbol, LadderError::OutsideSession { symbol: symbol.to_string() });
        }
    }
    let anchor = match book.anchor.anchor(symbol) {
        Ok(anchor) => anchor,
        Err(err) => return Evaluation::skip(symbol, err),
    };

    let plan = ladder::build(anchor, z, instrument, profile, &config.ladder);
    let budget = ClassBudget::for_instrument(config, instrument);
    let clips = clip::size(instrument, &budget, price, profile, &config.sizing, &config.ladder.clip_mults);
    debug!(
        symbol,
        price,
        z,
        anchor,
        buy_trigger = *plan.buy.trigger(),
        sell_trigger = *plan.sell.trigger(),
        base_clip = clips.base_clip,
        depth = book.position.depth(),
        "ladder plan"
    );

    match ladder_action(&book.position, &ctx, &plan, &clips) {
        Some(draft) => Evaluation::emit(symbol, draft),
        None => Evaluation::idle(symbol),
    }
}
