//! Ladderbot CLI: config validation, ladder preview, session anchors, paper replay,
//! fill analysis.
//!
//! Commands:
//! - `check`: load and validate a TOML config, print its fingerprint
//! - `ladder`: print trigger/display ladders and the clip plan for one symbol
//! - `anchors`: session medians and blended anchors from a minute-bar CSV
//! - `replay`: drive the orchestrator over a tick CSV against a paper broker
//! - `fills`: per-symbol summary and reports from a fill log

mod logging;
mod paper;
mod replay;
mod report;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ladderbot_core::components::{blend, blend_lookback, clip, ladder, ClassBudget, SessionMedians};
use ladderbot_core::config::{AnchorWeights, BotConfig, FileProvider, TradingHours};
use ladderbot_core::domain::{FillRecord, RungIndex};
use ladderbot_core::engine::Driver;
use ladderbot_core::Orchestrator;

use paper::PaperBroker;

#[derive(Parser)]
#[command(name = "ladderbot", about = "Ladderbot CLI: rung ladder pricing and sizing engine")]
struct Cli {
    /// Emit logs as JSON lines instead of compact text.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a config file, then print its fingerprint.
    Check {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the trigger and display ladders plus the clip plan for one symbol.
    Ladder {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Configured symbol.
        #[arg(long)]
        symbol: String,

        /// Anchor price.
        #[arg(long)]
        anchor: f64,

        /// Momentum z-score. Defaults to neutral.
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        z: f64,

        /// Latest price used for clip sizing. Defaults to the anchor.
        #[arg(long)]
        price: Option<f64>,
    },
    /// Compute session medians and blended anchors from minute bars.
    Anchors {
        /// CSV with columns date,time,symbol,close (exchange-local time).
        #[arg(long)]
        bars: PathBuf,

        /// Config supplying anchor weights and trading hours.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session open, HH:MM local.
        #[arg(long)]
        open: Option<String>,

        /// Session close, HH:MM local.
        #[arg(long)]
        close: Option<String>,

        /// Exchange UTC offset in hours.
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<i32>,

        /// Write the latest session's medians as an anchors CSV for `replay`.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replay a tick CSV through the orchestrator against a paper broker.
    Replay {
        /// Path to a TOML config file. Re-read between cycles if it changes.
        #[arg(long)]
        config: PathBuf,

        /// CSV with columns timestamp,symbol,last,bid,ask,dollar_volume.
        #[arg(long)]
        ticks: PathBuf,

        /// CSV with columns symbol,premarket,initial_balance,regular_hours.
        #[arg(long)]
        anchors: PathBuf,

        /// Write confirmed fills here as CSV.
        #[arg(long)]
        fills_out: Option<PathBuf>,

        /// Fraction of submissions the paper broker rejects.
        #[arg(long, default_value_t = 0.0)]
        reject_rate: f64,

        /// RNG seed for the paper broker.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Summarize a fill log written by `replay --fills-out`.
    Fills {
        /// Fill log CSV.
        #[arg(long)]
        fills: PathBuf,

        /// Report only this symbol. Defaults to every symbol in the log.
        #[arg(long)]
        symbol: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    match cli.command {
        Commands::Check { config } => run_check(&config),
        Commands::Ladder {
            config,
            symbol,
            anchor,
            z,
            price,
        } => run_ladder(&config, &symbol, anchor, z, price),
        Commands::Anchors {
            bars,
            config,
            open,
            close,
            utc_offset,
            out,
        } => run_anchors(&bars, config.as_deref(), open, close, utc_offset, out.as_deref()),
        Commands::Replay {
            config,
            ticks,
            anchors,
            fills_out,
            reject_rate,
            seed,
        } => run_replay(&config, &ticks, &anchors, fills_out.as_deref(), reject_rate, seed),
        Commands::Fills { fills, symbol } => run_fills(&fills, symbol.as_deref()),
    }
}

fn load_config(path: &Path) -> Result<BotConfig> {
    BotConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn run_check(path: &Path) -> Result<()> {
    let config = load_config(path)?;

    println!("Config:      {}", path.display());
    println!("Fingerprint: {}", config.fingerprint());
    println!("Equity:      {:.2}", config.equity);
    println!();
    println!(
        "{:<8} {:<6} {:>8} {:>8} {:>10} {:>10}",
        "Symbol", "Class", "Buy %", "Sell %", "Budget", "Base clip"
    );
    println!("{}", "-".repeat(56));
    for inst in &config.instruments {
        let budget = ClassBudget::for_instrument(&config, inst);
        let base = match inst.clip_override {
            Some(clip) => format!("{clip:.0} (fixed)"),
            None => "dynamic".to_string(),
        };
        println!(
            "{:<8} {:<6} {:>8.3} {:>8.3} {:>10.0} {:>10}",
            inst.symbol,
            inst.class,
            inst.base_buy_pct * 100.0,
            inst.base_sell_pct * 100.0,
            budget.per_ticker_budget(),
            base
        );
    }
    Ok(())
}

fn run_ladder(path: &Path, symbol: &str, anchor: f64, z: f64, price: Option<f64>) -> Result<()> {
    let config = load_config(path)?;
    let Some(inst) = config.instrument(symbol) else {
        bail!("{symbol} is not configured in {}", path.display());
    };
    if !anchor.is_finite() || anchor <= 0.0 {
        bail!("--anchor must be a positive price, got {anchor}");
    }
    let price = price.unwrap_or(anchor);

    let profile = config.profile(inst.class);
    let plan = ladder::build(anchor, z, inst, profile, &config.ladder);
    let (display_buy, display_sell) = plan.display(config.ladder.display_anchor_mult);
    let budget = ClassBudget::for_instrument(&config, inst);
    let clips = clip::size(inst, &budget, price, profile, &config.sizing, &config.ladder.clip_mults);

    println!();
    println!("=== {symbol} ({}) ===", inst.class);
    println!("Anchor:       {anchor:.4}");
    println!(
        "Momentum:     z={z:.3}  buy x{:.3}  sell x{:.3}",
        plan.momentum.buy, plan.momentum.sell
    );
    println!(
        "Trigger:      buy {:.4} (-{:.3}%)  sell {:.4} (+{:.3}%)",
        plan.buy_trigger(RungIndex::TRIGGER),
        plan.buy_offset * 100.0,
        plan.sell_trigger(RungIndex::TRIGGER),
        plan.sell_offset * 100.0
    );
    println!("Base clip:    {:.2} USD at {price:.4}", clips.base_clip);
    println!();
    println!(
        "{:<5} {:>10} {:>10} {:>10} {:>10} {:>10} {:>7}",
        "Rung", "Buy", "Sell", "Disp buy", "Disp sell", "Clip", "Shares"
    );
    println!("{}", "-".repeat(68));
    for rung in RungIndex::all() {
        let shares = clips
            .shares_for(rung, price)
            .map_or_else(|| "-".to_string(), |s| format!("{s:.0}"));
        let marker = if rung == RungIndex::TRIGGER { "*" } else { "" };
        println!(
            "{:<5} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.2} {:>7}",
            format!("{rung}{marker}"),
            plan.buy_trigger(rung),
            plan.sell_trigger(rung),
            display_buy[rung],
            display_sell[rung],
            clips.clip(rung),
            shares
        );
    }
    println!();
    Ok(())
}

#[derive(Serialize)]
struct AnchorOut<'a> {
    symbol: &'a str,
    premarket: Option<f64>,
    initial_balance: Option<f64>,
    regular_hours: Option<f64>,
}

fn run_anchors(
    bars_path: &Path,
    config_path: Option<&Path>,
    open: Option<String>,
    close: Option<String>,
    utc_offset: Option<i32>,
    out: Option<&Path>,
) -> Result<()> {
    let (weights, mut hours) = match config_path {
        Some(path) => {
            let config = load_config(path)?;
            (config.anchor, config.engine.trading_hours.unwrap_or_default())
        }
        None => (AnchorWeights::default(), TradingHours::default()),
    };
    if let Some(open) = open {
        hours.open = replay::parse_time(&open)?;
    }
    if let Some(close) = close {
        hours.close = replay::parse_time(&close)?;
    }
    if let Some(offset) = utc_offset {
        hours.utc_offset_hours = offset;
    }
    if hours.offset().is_none() || hours.open >= hours.close {
        bail!("invalid trading hours: {} to {} at UTC{:+}", hours.open, hours.close, hours.utc_offset_hours);
    }

    let by_symbol = replay::load_bars(bars_path, &hours)?;
    if by_symbol.is_empty() {
        println!("No bars in {}", bars_path.display());
        return Ok(());
    }

    let mut latest: Vec<(&str, SessionMedians)> = Vec::new();
    println!(
        "{:<8} {:<10} {:>10} {:>10} {:>10} {:>10}",
        "Symbol", "Date", "Premarket", "IB", "RTH", "Anchor"
    );
    println!("{}", "-".repeat(63));
    for (symbol, days) in &by_symbol {
        let mut daily: Vec<Option<f64>> = Vec::new();
        let mut last = SessionMedians::default();
        for (date, bars) in days {
            let medians = SessionMedians::from_bars(bars, &hours);
            let anchor = blend(&medians, &weights);
            println!(
                "{:<8} {:<10} {:>10} {:>10} {:>10} {:>10}",
                symbol,
                date,
                fmt_px(medians.premarket),
                fmt_px(medians.initial_balance),
                fmt_px(medians.regular_hours),
                fmt_px(anchor)
            );
            daily.push(anchor);
            last = medians;
        }
        // most recent day first
        daily.reverse();
        println!("{symbol:<8} {:<10} {:>43}", "lookback", fmt_px(blend_lookback(&daily)));
        latest.push((symbol.as_str(), last));
    }

    if let Some(out) = out {
        let mut writer = csv::Writer::from_path(out).with_context(|| format!("creating {}", out.display()))?;
        for (symbol, m) in &latest {
            writer.serialize(AnchorOut {
                symbol,
                premarket: m.premarket,
                initial_balance: m.initial_balance,
                regular_hours: m.regular_hours,
            })?;
        }
        writer.flush()?;
        println!();
        println!("Anchors written to: {}", out.display());
    }
    Ok(())
}

fn fmt_px(px: Option<f64>) -> String {
    px.map_or_else(|| "-".to_string(), |p| format!("{p:.4}"))
}

fn run_replay(
    config_path: &Path,
    ticks_path: &Path,
    anchors_path: &Path,
    fills_out: Option<&Path>,
    reject_rate: f64,
    seed: u64,
) -> Result<()> {
    if !(0.0..=1.0).contains(&reject_rate) {
        bail!("--reject-rate must be within [0, 1], got {reject_rate}");
    }
    let config = load_config(config_path)?;
    let mut orchestrator = Orchestrator::new(config)?;
    for (symbol, medians) in replay::load_anchors(anchors_path)? {
        if let Err(err) = orchestrator.set_session_medians(&symbol, medians) {
            tracing::warn!(%symbol, error = %err, "anchor row ignored");
        }
    }
    let cycles = replay::load_cycles(ticks_path)?;
    tracing::info!(cycles = cycles.len(), ticks = %ticks_path.display(), "replay starting");

    let broker = PaperBroker::new(reject_rate, seed);
    let mut driver = Driver::new(orchestrator, broker, FileProvider::new(config_path));

    let mut fills: Vec<FillRecord> = Vec::new();
    let mut intents = 0usize;
    let mut skips = 0usize;
    let mut reloads = 0usize;
    for (now, ticks) in &cycles {
        driver.gateway_mut().set_clock(*now);
        let report = driver.step(*now, ticks);
        intents += report.output.intents.len();
        skips += report.output.skipped.len();
        reloads += usize::from(report.config_changed);
        fills.extend(report.fills);
    }

    print_replay_summary(&driver, cycles.len(), intents, skips, reloads.saturating_sub(1), &fills);

    if let Some(path) = fills_out {
        replay::write_fills(path, &fills)?;
        println!("Fills saved to: {}", path.display());
    }
    Ok(())
}

fn print_replay_summary(
    driver: &Driver<PaperBroker, FileProvider>,
    cycles: usize,
    intents: usize,
    skips: usize,
    reloads: usize,
    fills: &[FillRecord],
) {
    let broker = driver.gateway();
    let mut pnl: BTreeMap<&str, f64> = BTreeMap::new();
    for fill in fills {
        *pnl.entry(fill.symbol.as_str()).or_default() += fill.realized_pnl;
    }

    println!();
    println!("=== Replay Result ===");
    println!("Cycles:         {cycles}");
    println!("Intents:        {intents}");
    println!("Submitted:      {}", broker.submitted());
    println!("Rejected:       {}", broker.rejected());
    println!("Fills:          {}", fills.len());
    println!("Skips:          {skips}");
    println!("Config reloads: {reloads}");
    println!("Still pending:  {}", driver.orchestrator().pending().len());
    println!();
    println!(
        "{:<8} {:>8} {:>10} {:>6} {:>12}",
        "Symbol", "Shares", "Avg cost", "Depth", "Realized"
    );
    println!("{}", "-".repeat(48));
    for (symbol, book) in driver.orchestrator().books() {
        let pos = &book.position;
        println!(
            "{:<8} {:>8.0} {:>10.4} {:>6} {:>12.2}",
            symbol,
            pos.shares(),
            pos.avg_cost(),
            pos.depth(),
            pnl.get(symbol.as_str()).copied().unwrap_or(0.0)
        );
    }
    let total: f64 = pnl.values().sum();
    println!("{}", "-".repeat(48));
    println!("{:<8} {:>39.2}", "Total", total);
    println!();
}

fn run_fills(path: &Path, symbol: Option<&str>) -> Result<()> {
    let fills = replay::load_fills(path)?;
    let Some((first, last)) = report::span(&fills) else {
        println!("No fills in {}", path.display());
        return Ok(());
    };
    let summaries = report::summarize(&fills);
    tracing::debug!(fills = fills.len(), symbols = summaries.len(), "fill log loaded");

    println!();
    println!("=== Fill Log ===");
    println!("File:   {}", path.display());
    println!("Fills:  {}", fills.len());
    println!("Span:   {} to {}", first.to_rfc3339(), last.to_rfc3339());
    println!();
    println!("{}", report::table(&summaries));

    match symbol {
        Some(symbol) => {
            let symbol = symbol.trim().to_uppercase();
            println!();
            match summaries.get(&symbol) {
                Some(summary) => println!("{}", report::describe(&symbol, summary)),
                None => println!("No fills for {symbol}."),
            }
        }
        None => {
            for (symbol, summary) in &summaries {
                println!();
                println!("{}", report::describe(symbol, summary));
            }
        }
    }
    println!();
    Ok(())
}
