//! OHLCV candles as returned by the candle endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::wire;

/// Upper bound on candles per response; larger ranges come back truncated.
pub const MAX_CANDLES: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "wire::timestamp")]
    pub time: DateTime<Utc>,
    #[serde(with = "wire::number")]
    pub open: f64,
    #[serde(with = "wire::number")]
    pub high: f64,
    #[serde(with = "wire::number")]
    pub low: f64,
    #[serde(with = "wire::number")]
    pub close: f64,
    #[serde(with = "wire::number", default)]
    pub volume: f64,
}

impl Candle {
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    /// Percentage move from open to close.
    pub fn change_pct(&self) -> f64 {
        if self.open == 0.0 {
            0.0
        } else {
            (self.close - self.open) / self.open * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleQuery {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,
    #[serde(with = "wire::timestamp")]
    pub start: DateTime<Utc>,
    #[serde(with = "wire::timestamp")]
    pub end: DateTime<Utc>,
}

/// Candles for one query plus whether the server cut the range short.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSet {
    pub candles: Vec<Candle>,
    pub truncated: bool,
}

impl CandleSet {
    pub fn new(mut candles: Vec<Candle>, truncated: bool) -> Self {
        candles.sort_by_key(|c| c.time);
        candles.dedup_by_key(|c| c.time);
        let over = candles.len() > MAX_CANDLES;
        candles.truncate(MAX_CANDLES);
        Self {
            candles,
            truncated: truncated || over,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// First and last candle times, the range indicator fetches are keyed by.
    pub fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.candles.first(), self.candles.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        }
    }

    pub fn truncation_notice(&self) -> Option<String> {
        if !self.truncated {
            return None;
        }
        let until = self
            .candles
            .last()
            .map(|c| format!(" up to {}", c.time.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        Some(format!(
            "Only the first {MAX_CANDLES} candles were loaded{until}; narrow the range to see the rest"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(minute: u32, open: f64, close: f64) -> Candle {
        Candle {
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn deserializes_quoted_values_and_millis() {
        let json = r#"{"time": 1704067200000, "open": "1.5", "high": 2, "low": "1", "close": 1.75, "volume": "120.5"}"#;
        let c: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(c.time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(c.open, 1.5);
        assert_eq!(c.volume, 120.5);
        assert!(c.is_up());
    }

    #[test]
    fn change_pct_handles_zero_open() {
        assert!((candle(0, 100.0, 105.0).change_pct() - 5.0).abs() < 1e-12);
        assert_eq!(candle(0, 0.0, 5.0).change_pct(), 0.0);
    }

    #[test]
    fn set_sorts_and_reports_range() {
        let set = CandleSet::new(vec![candle(2, 1.0, 1.0), candle(0, 1.0, 1.0), candle(1, 1.0, 1.0)], false);
        let (start, end) = set.range().unwrap();
        assert_eq!(start.format("%M").to_string(), "00");
        assert_eq!(end.format("%M").to_string(), "02");
        assert!(set.truncation_notice().is_none());
    }

    #[test]
    fn oversized_set_is_truncated_with_notice() {
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let candles = (0..MAX_CANDLES as i64 + 10)
            .map(|i| Candle {
                time: base + chrono::Duration::minutes(i),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            })
            .collect();
        let set = CandleSet::new(candles, false);
        assert_eq!(set.len(), MAX_CANDLES);
        assert!(set.truncated);
        assert!(set.truncation_notice().unwrap().contains("50000"));
    }

    #[test]
    fn empty_set_has_no_range() {
        assert!(CandleSet::default().range().is_none());
    }
}
