//! CSV inputs and outputs for the replay, anchors and fills commands.
//!
//! Ticks:   `timestamp,symbol,last,bid,ask,dollar_volume` (RFC 3339, UTC)
//! Anchors: `symbol,premarket,initial_balance,regular_hours` (blank = missing)
//! Bars:    `date,time,symbol,close` in exchange-local wall-clock time
//! Fills:   one `FillRecord` per row

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use ladderbot_core::components::anchor::local_bar;
use ladderbot_core::components::{MinuteBar, SessionMedians};
use ladderbot_core::config::TradingHours;
use ladderbot_core::domain::{FillRecord, Tick};

#[derive(Debug, Deserialize)]
struct TickRow {
    timestamp: DateTime<Utc>,
    symbol: String,
    last: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    #[serde(default)]
    dollar_volume: Option<f64>,
}

impl From<TickRow> for Tick {
    fn from(row: TickRow) -> Self {
        let mut tick = Tick::new(row.symbol, row.timestamp, row.last);
        tick.bid = row.bid;
        tick.ask = row.ask;
        tick.dollar_volume = row.dollar_volume.unwrap_or(0.0);
        tick
    }
}

#[derive(Debug, Deserialize)]
struct AnchorRow {
    symbol: String,
    premarket: Option<f64>,
    initial_balance: Option<f64>,
    regular_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    date: NaiveDate,
    time: String,
    symbol: String,
    close: f64,
}

/// Ticks grouped into cycles by timestamp, in time order.
pub fn load_cycles(path: &Path) -> Result<Vec<(DateTime<Utc>, Vec<Tick>)>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut cycles: BTreeMap<DateTime<Utc>, Vec<Tick>> = BTreeMap::new();
    for (line, row) in reader.deserialize::<TickRow>().enumerate() {
        let row = row.with_context(|| format!("{}: tick row {}", path.display(), line + 1))?;
        cycles.entry(row.timestamp).or_default().push(row.into());
    }
    Ok(cycles.into_iter().collect())
}

pub fn load_anchors(path: &Path) -> Result<Vec<(String, SessionMedians)>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for (line, row) in reader.deserialize::<AnchorRow>().enumerate() {
        let row = row.with_context(|| format!("{}: anchor row {}", path.display(), line + 1))?;
        out.push((
            row.symbol,
            SessionMedians::new(row.premarket, row.initial_balance, row.regular_hours),
        ));
    }
    Ok(out)
}

/// Minute bars per symbol and session date, converted to UTC.
pub fn load_bars(path: &Path, hours: &TradingHours) -> Result<BTreeMap<String, BTreeMap<NaiveDate, Vec<MinuteBar>>>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut out: BTreeMap<String, BTreeMap<NaiveDate, Vec<MinuteBar>>> = BTreeMap::new();
    for (line, row) in reader.deserialize::<BarRow>().enumerate() {
        let row = row.with_context(|| format!("{}: bar row {}", path.display(), line + 1))?;
        let time = parse_time(&row.time).with_context(|| format!("{}: bar row {}", path.display(), line + 1))?;
        let bar = local_bar(row.date, time, hours, row.close)
            .with_context(|| format!("{}: bar row {} has no UTC mapping", path.display(), line + 1))?;
        out.entry(row.symbol).or_default().entry(row.date).or_default().push(bar);
    }
    Ok(out)
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("invalid time '{s}'"))
}

/// Fill log as written by `write_fills`.
pub fn load_fills(path: &Path) -> Result<Vec<FillRecord>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for (line, row) in reader.deserialize::<FillRecord>().enumerate() {
        out.push(row.with_context(|| format!("{}: fill row {}", path.display(), line + 1))?);
    }
    Ok(out)
}

pub fn write_fills(path: &Path, fills: &[FillRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for fill in fills {
        writer.serialize(fill)?;
    }
    writer.flush()?;
    Ok(())
}
