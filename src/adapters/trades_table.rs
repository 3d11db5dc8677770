//! Trades table, performance summary and CSV export.

use std::io::Write;
use std::ops::Range;

use chrono_tz::Tz;

use crate::domain::combobox::VirtualWindow;
use crate::domain::error::StratifyError;
use crate::domain::execution::{PerformanceMetrics, Trade};
use crate::domain::format::format_number;
use crate::domain::strategy::split_symbol;
use crate::domain::timezone::format_in_zone;

pub const ROW_HEIGHT: f64 = 47.27;
pub const OVERSCAN: usize = 5;

pub const HEADERS: [&str; 12] = [
    "Trade #",
    "Type",
    "Side",
    "Date/Time",
    "Price",
    "Amount",
    "Cost",
    "Net Profit",
    "Cum. Profit",
    "Hodling Profit",
    "Run-up",
    "Drawdown",
];

/// `BTC/USDT:USDT` -> `USDT`
pub fn quote_currency(symbol: &str) -> String {
    split_symbol(symbol).1
}

fn relative(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}%"))
}

fn absolute(value: Option<f64>, quote: &str) -> String {
    match value {
        Some(v) => format!("{} {quote}", format_number(v)),
        None => "-".to_string(),
    }
}

fn pair(abs: Option<f64>, rel: Option<f64>, quote: &str) -> String {
    format!("{} ({})", absolute(abs, quote), relative(rel))
}

fn padded_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string();
    line.push('\n');
    line
}

/// One rendered row. Text cells only; colors are left to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub number: usize,
    pub cells: Vec<String>,
}

/// Trades of one execution, newest first.
pub struct TradesTable {
    rows: Vec<TradeRow>,
    window: VirtualWindow,
}

impl TradesTable {
    pub fn new(trades: &[Trade], symbol: &str, tz: &Tz) -> Self {
        let quote = quote_currency(symbol);
        let total = trades.len();
        let rows = trades
            .iter()
            .rev()
            .enumerate()
            .map(|(i, trade)| {
                let number = total - i;
                TradeRow {
                    number,
                    cells: vec![
                        number.to_string(),
                        trade.order_type.clone(),
                        trade.side.clone(),
                        format_in_zone(trade.timestamp, tz),
                        format_number(trade.price),
                        format_number(trade.amount),
                        absolute(trade.cost, &quote),
                        pair(trade.abs_profit, trade.rel_profit, &quote),
                        pair(trade.abs_cum_profit, trade.rel_cum_profit, &quote),
                        pair(trade.abs_hodling_profit, trade.rel_hodling_profit, &quote),
                        pair(trade.abs_runup, trade.rel_runup, &quote),
                        pair(trade.abs_drawdown, trade.rel_drawdown, &quote),
                    ],
                }
            })
            .collect();
        Self {
            rows,
            window: VirtualWindow::new(ROW_HEIGHT, OVERSCAN),
        }
    }

    pub fn rows(&self) -> &[TradeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row indices to draw for a viewport scrolled to `scroll_offset`.
    pub fn visible(&self, scroll_offset: f64, viewport_height: f64) -> Range<usize> {
        self.window.range(scroll_offset, viewport_height, self.rows.len())
    }

    /// Plain text with space-padded columns.
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(&row.cells) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let mut out = padded_line(HEADERS.iter().copied(), &widths);
        for row in &self.rows {
            out.push_str(&padded_line(row.cells.iter().map(String::as_str), &widths));
        }
        out
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), StratifyError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(HEADERS)?;
        for row in &self.rows {
            wtr.write_record(&row.cells)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Label and value pairs of the performance panel.
pub fn performance_summary(metrics: &PerformanceMetrics, symbol: &str) -> Vec<(&'static str, String)> {
    let quote = quote_currency(symbol);
    let count = metrics
        .total_closed_trades
        .map_or_else(|| "-".to_string(), |n| n.to_string());
    let factor = metrics
        .profit_factor
        .map_or_else(|| "-".to_string(), |f| format!("{f:.3}"));
    vec![
        ("Net Profit", pair(metrics.abs_net_profit, metrics.rel_net_profit, &quote)),
        ("Total Closed Trades", count),
        ("Winning Rate", relative(metrics.winning_trade_rate)),
        ("Profit Factor", factor),
        (
            "Avg Trade Profit",
            pair(metrics.abs_avg_trade_profit, metrics.rel_avg_trade_profit, &quote),
        ),
        ("Max Run-up", pair(metrics.abs_max_run_up, metrics.rel_max_run_up, &quote)),
        (
            "Max Drawdown",
            pair(metrics.abs_max_drawdown, metrics.rel_max_drawdown, &quote),
        ),
    ]
}
