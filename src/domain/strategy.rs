//! Strategy records, explore filters and symbol helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::indicator::Indicator;
use crate::domain::wire;

pub const PAGE_SIZE: u32 = 10;

pub const TIMEFRAMES: &[&str] = &["1m", "5m", "15m", "30m", "1h", "4h", "1d", "1w", "1M"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub timeframe: String,
    #[serde(default, with = "wire::optional_timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "wire::optional_timestamp")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, with = "wire::json_text")]
    pub indicators: Vec<Indicator>,
    /// Owner user id.
    #[serde(default)]
    pub user: Option<u64>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub clones_count: u64,
}

impl Strategy {
    pub fn is_owned_by(&self, user_id: Option<u64>) -> bool {
        matches!((self.user, user_id), (Some(owner), Some(id)) if owner == id)
    }

    pub fn indicator(&self, id: &str) -> Option<&Indicator> {
        self.indicators.iter().find(|i| i.id == id)
    }

    /// Ids of configured indicators, in list order, skipping unsaved entries.
    pub fn indicator_ids(&self) -> Vec<String> {
        self.indicators
            .iter()
            .filter(|i| !i.id.is_empty())
            .map(|i| i.id.clone())
            .collect()
    }

    /// Replace entries whose ids appear in `fetched` in place; fetched
    /// indicators with no matching entry are appended. List order is kept.
    pub fn merge_indicators(&mut self, fetched: Vec<Indicator>) {
        for indicator in fetched {
            match self.indicators.iter_mut().find(|existing| existing.id == indicator.id) {
                Some(slot) => *slot = indicator,
                None => self.indicators.push(indicator),
            }
        }
    }

    /// Indicator list as stored by the server (no data points).
    pub fn stored_indicators(&self) -> Vec<Indicator> {
        self.indicators.iter().map(Indicator::without_data).collect()
    }

    /// Copy suitable for an update request.
    pub fn for_update(&self) -> Strategy {
        Strategy {
            indicators: self.stored_indicators(),
            ..self.clone()
        }
    }

    pub fn has_market(&self) -> bool {
        !self.exchange.is_empty() && !self.symbol.is_empty()
    }
}

/// Explore-page filters. Empty strings are treated as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyFilter {
    pub name: Option<String>,
    pub only_mine: bool,
    pub exchange: Option<String>,
    pub symbol: Option<String>,
    pub page: u32,
}

impl StrategyFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &'static str, value: &Option<String>| {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                pairs.push((key, v.to_string()));
            }
        };
        push("name", &self.name);
        push("exchange", &self.exchange.as_ref().map(|e| e.to_lowercase()));
        push("symbol", &self.symbol);
        pairs.push(("only_mine", self.only_mine.to_string()));
        pairs.push(("page", self.page.max(1).to_string()));
        pairs.push(("page_size", PAGE_SIZE.to_string()));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        self.count.div_ceil(u64::from(PAGE_SIZE))
    }

    pub fn has_more(&self, page: u32) -> bool {
        u64::from(page) < self.total_pages()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketType {
    Spot,
    Perpetual,
}

impl MarketType {
    pub fn of_symbol(symbol: &str) -> Self {
        if symbol.contains(':') {
            MarketType::Perpetual
        } else {
            MarketType::Spot
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MarketType::Spot => "Spot",
            MarketType::Perpetual => "Perpetual",
        }
    }
}

/// `BTC/USDT:USDT` -> (`BTC`, `USDT`)
pub fn split_symbol(symbol: &str) -> (String, String) {
    let parts: Vec<&str> = symbol.split(['/', ':']).collect();
    let base = parts.first().copied().unwrap_or_default();
    let quote = parts.last().copied().unwrap_or_default();
    (base.to_string(), quote.to_string())
}

/// `binance` -> `Binance`
pub fn display_exchange(exchange: &str) -> String {
    let mut chars = exchange.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
