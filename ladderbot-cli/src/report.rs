//! Fill-log analysis for the `fills` command: a per-symbol summary table and
//! a detailed per-symbol report.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use ladderbot_core::domain::{FillRecord, IntentReason, Side};

/// Aggregates over every fill of one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillSummary {
    pub fills: usize,
    pub buys: usize,
    pub sells: usize,
    pub bought_qty: f64,
    pub sold_qty: f64,
    pub bought_notional: f64,
    pub sold_notional: f64,
    pub realized_pnl: f64,
    pub reasons: BTreeMap<IntentReason, usize>,
    pub first: Option<FillRecord>,
    pub last: Option<FillRecord>,
}

impl FillSummary {
    fn add(&mut self, fill: &FillRecord) {
        self.fills += 1;
        let notional = fill.quantity * fill.price;
        match fill.side {
            Side::Buy => {
                self.buys += 1;
                self.bought_qty += fill.quantity;
                self.bought_notional += notional;
            }
            Side::Sell => {
                self.sells += 1;
                self.sold_qty += fill.quantity;
                self.sold_notional += notional;
            }
        }
        self.realized_pnl += fill.realized_pnl;
        *self.reasons.entry(fill.reason).or_default() += 1;

        if self.first.as_ref().map_or(true, |f| fill.timestamp < f.timestamp) {
            self.first = Some(fill.clone());
        }
        if self.last.as_ref().map_or(true, |f| fill.timestamp >= f.timestamp) {
            self.last = Some(fill.clone());
        }
    }

    pub fn net_position(&self) -> f64 {
        self.bought_qty - self.sold_qty
    }

    pub fn avg_buy_price(&self) -> f64 {
        if self.bought_qty > 0.0 {
            self.bought_notional / self.bought_qty
        } else {
            0.0
        }
    }

    pub fn avg_sell_price(&self) -> f64 {
        if self.sold_qty > 0.0 {
            self.sold_notional / self.sold_qty
        } else {
            0.0
        }
    }

    /// Sell proceeds minus buy cost.
    pub fn net_cash_flow(&self) -> f64 {
        self.sold_notional - self.bought_notional
    }

    /// Reasons by descending count, ties by name.
    pub fn reasons_by_count(&self) -> Vec<(IntentReason, usize)> {
        let mut out: Vec<_> = self.reasons.iter().map(|(r, n)| (*r, *n)).collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        out
    }
}

pub fn summarize(fills: &[FillRecord]) -> BTreeMap<String, FillSummary> {
    let mut out: BTreeMap<String, FillSummary> = BTreeMap::new();
    for fill in fills {
        out.entry(fill.symbol.clone()).or_default().add(fill);
    }
    out
}

// ── Rendering ───────────────────────────────────────────────────────

/// One row per symbol plus a total row.
pub fn table(summaries: &BTreeMap<String, FillSummary>) -> String {
    let width = summaries.keys().map(String::len).max().unwrap_or(0).max("Symbol".len());
    let rule = format!("{}  {}  {}  {}", "-".repeat(width), "-".repeat(5), "-".repeat(8), "-".repeat(12));

    let mut lines = vec![
        format!("{:<width$}  {:>5}  {:>8}  {:>12}", "Symbol", "Fills", "Net pos", "Realized"),
        rule.clone(),
    ];
    for (symbol, s) in summaries {
        lines.push(format!(
            "{symbol:<width$}  {:>5}  {:>8.0}  {:>12.2}",
            s.fills,
            s.net_position(),
            s.realized_pnl
        ));
    }
    let fills: usize = summaries.values().map(|s| s.fills).sum();
    let net: f64 = summaries.values().map(FillSummary::net_position).sum();
    let pnl: f64 = summaries.values().map(|s| s.realized_pnl).sum();
    lines.push(rule);
    lines.push(format!("{:<width$}  {fills:>5}  {net:>8.0}  {pnl:>12.2}", "Total"));
    lines.join("\n")
}

/// Detailed report for one symbol.
pub fn describe(symbol: &str, s: &FillSummary) -> String {
    let mut lines = vec![
        format!("=== {symbol} ==="),
        format!("Fills:          {} (buys {}, sells {})", s.fills, s.buys, s.sells),
        format!("Net position:   {:.0} shares", s.net_position()),
        format!(
            "Bought:         {:.0} shares for {:.2} (avg {:.4})",
            s.bought_qty,
            s.bought_notional,
            s.avg_buy_price()
        ),
        format!(
            "Sold:           {:.0} shares for {:.2} (avg {:.4})",
            s.sold_qty,
            s.sold_notional,
            s.avg_sell_price()
        ),
        format!("Net cash flow:  {:.2}", s.net_cash_flow()),
        format!("Realized PnL:   {:.2}", s.realized_pnl),
        "Reasons:".to_string(),
    ];
    for (reason, count) in s.reasons_by_count() {
        lines.push(format!("  {:<14} {count}", reason.as_str()));
    }
    if let Some(first) = &s.first {
        lines.push(format!("First fill:     {}", fill_line(first)));
    }
    if let Some(last) = &s.last {
        lines.push(format!("Last fill:      {}", fill_line(last)));
    }
    lines.join("\n")
}

fn fill_line(fill: &FillRecord) -> String {
    format!(
        "{} {} {:.0} @ {:.4}",
        fill.timestamp.to_rfc3339(),
        fill.side,
        fill.quantity,
        fill.price
    )
}

/// Time span covered by a fill log.
pub fn span(fills: &[FillRecord]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = fills.iter().map(|f| f.timestamp).min()?;
    let last = fills.iter().map(|f| f.timestamp).max()?;
    Some((first, last))
}
