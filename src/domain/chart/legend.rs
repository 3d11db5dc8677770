//! Legend rows drawn over each pane.

use crate::domain::candle::Candle;
use crate::domain::chart::pane::PaneLayout;
use crate::domain::chart::series::{DOWN_COLOR, UP_COLOR};
use crate::domain::format::{format_number, format_percent, format_volume};
use crate::ports::chart_port::{LegendEntry, LegendValue, PaneOverlay, ValuePoint};

/// Point under the crosshair, or the last point when the crosshair is away
/// or the series has no value at that time.
pub fn value_at(points: &[ValuePoint], time: Option<i64>) -> Option<&ValuePoint> {
    time.and_then(|t| points.iter().find(|p| p.time == t))
        .or_else(|| points.last())
}

/// `O 1.2 H 1.3 L 1.1 C 1.25 (+4.17%) V 1.20 K`, all in the bar's color.
pub fn candle_entry(candle: &Candle) -> LegendEntry {
    let color = if candle.is_up() { UP_COLOR } else { DOWN_COLOR };
    let value = |prefix: &str, text: String| LegendValue {
        color: color.to_string(),
        text: format!("{prefix} {text}"),
    };
    LegendEntry {
        indicator_id: None,
        label: String::new(),
        values: vec![
            value("O", format_number(candle.open)),
            value("H", format_number(candle.high)),
            value("L", format_number(candle.low)),
            value(
                "C",
                format!(
                    "{} ({})",
                    format_number(candle.close),
                    format_percent(candle.change_pct())
                ),
            ),
            value("V", format_volume(candle.volume)),
        ],
        visible: true,
        editable: false,
    }
}

/// Row for one indicator: its label and one value per series.
pub fn indicator_entry(
    indicator_id: &str,
    label: &str,
    series: &[&[ValuePoint]],
    time: Option<i64>,
    visible: bool,
    editable: bool,
) -> LegendEntry {
    let values = series
        .iter()
        .map(|points| match value_at(points, time) {
            Some(p) => LegendValue {
                color: p.color.clone().unwrap_or_default(),
                text: format_number(p.value),
            },
            None => LegendValue {
                color: String::new(),
                text: "-".to_string(),
            },
        })
        .collect();
    LegendEntry {
        indicator_id: Some(indicator_id.to_string()),
        label: label.to_string(),
        values,
        visible,
        editable,
    }
}

pub fn pane_overlay(pane: usize, entries: Vec<LegendEntry>, layout: &PaneLayout) -> PaneOverlay {
    PaneOverlay {
        pane,
        entries,
        can_move_up: layout.can_move_up(pane),
        can_move_down: layout.can_move_down(pane),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn point(time: i64, value: f64) -> ValuePoint {
        ValuePoint {
            time,
            value,
            color: Some("blue".into()),
        }
    }

    #[test]
    fn crosshair_falls_back_to_last_point() {
        let points = vec![point(60, 1.0), point(120, 2.0)];
        assert_eq!(value_at(&points, Some(60)).unwrap().value, 1.0);
        assert_eq!(value_at(&points, Some(90)).unwrap().value, 2.0);
        assert_eq!(value_at(&points, None).unwrap().value, 2.0);
        assert!(value_at(&[], None).is_none());
    }

    #[test]
    fn candle_row_reads_ohlcv() {
        let candle = Candle {
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 105.0,
            volume: 1500.0,
        };
        let entry = candle_entry(&candle);
        let texts: Vec<&str> = entry.values.iter().map(|v| v.text.as_str()).collect();
        assert_eq!(texts, ["O 100", "H 110", "L 95", "C 105 (+5.00%)", "V 1.50 K"]);
        assert!(entry.values.iter().all(|v| v.color == UP_COLOR));
        assert!(!entry.editable);
    }

    #[test]
    fn indicator_row_has_one_value_per_series() {
        let upper = vec![point(60, 3.0)];
        let lower: Vec<ValuePoint> = vec![];
        let entry = indicator_entry("abc", "BBANDS 20 2 2", &[&upper, &lower], None, true, true);
        assert_eq!(entry.label, "BBANDS 20 2 2");
        assert_eq!(entry.values[0].text, "3");
        assert_eq!(entry.values[1].text, "-");
    }
}
