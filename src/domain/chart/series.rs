//! How each indicator kind is drawn.

use chrono_tz::Tz;

use crate::domain::error::StratifyError;
use crate::domain::indicator::{Indicator, IndicatorKind};
use crate::domain::timezone::to_chart_seconds;
use crate::ports::chart_port::{LineStyle, PriceLine, SeriesOptions, ValuePoint};

pub const UP_COLOR: &str = "#2EBD85";
pub const DOWN_COLOR: &str = "#F6465D";
const UP_FADED_COLOR: &str = "#ACE5DC";
const DOWN_FADED_COLOR: &str = "#FCCBCD";
const REFERENCE_COLOR: &str = "grey";

const RSI_LIMITS: [(&str, f64); 3] = [("upper_limit", 70.0), ("middle_limit", 50.0), ("lower_limit", 30.0)];
const STOCH_LIMITS: [f64; 2] = [80.0, 20.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Drawn on the price pane.
    Overlay,
    /// Gets a pane of its own at the bottom.
    NewPane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Line,
    /// Histogram colored by sign and direction of change.
    Momentum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSeries {
    pub field: &'static str,
    pub kind: SeriesKind,
    pub color: &'static str,
}

impl PlannedSeries {
    const fn line(field: &'static str, color: &'static str) -> Self {
        Self {
            field,
            kind: SeriesKind::Line,
            color,
        }
    }

    pub fn options(&self) -> SeriesOptions {
        match self.kind {
            SeriesKind::Line => SeriesOptions::line(self.color),
            SeriesKind::Momentum => SeriesOptions::histogram(self.color),
        }
    }

    /// Points of `field`, in chart time, skipping rows without a value.
    pub fn points(&self, indicator: &Indicator, tz: &Tz) -> Vec<ValuePoint> {
        let rows = indicator.data.as_deref().unwrap_or_default();
        let mut points = Vec::with_capacity(rows.len());
        let mut prev: Option<f64> = None;
        for row in rows {
            let Some(value) = row.value(self.field) else {
                continue;
            };
            let color = match self.kind {
                SeriesKind::Line => self.color.to_string(),
                SeriesKind::Momentum => momentum_color(value, prev.unwrap_or(value)).to_string(),
            };
            points.push(ValuePoint {
                time: to_chart_seconds(row.time, tz),
                value,
                color: Some(color),
            });
            prev = Some(value);
        }
        points
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPlan {
    pub placement: Placement,
    pub series: Vec<PlannedSeries>,
    /// Horizontal lines attached to the first series.
    pub reference_lines: Vec<f64>,
}

impl SeriesPlan {
    pub fn price_lines(&self) -> Vec<PriceLine> {
        self.reference_lines
            .iter()
            .map(|&price| PriceLine {
                price,
                color: REFERENCE_COLOR.to_string(),
                width: 1,
                style: LineStyle::Dashed,
                axis_label_visible: true,
            })
            .collect()
    }
}

/// Series layout for `indicator`, or `UnknownIndicator` for codes without one.
pub fn plan_for(indicator: &Indicator) -> Result<SeriesPlan, StratifyError> {
    use PlannedSeries as S;
    let (placement, series, reference_lines) = match indicator.kind() {
        IndicatorKind::Sma => (Placement::Overlay, vec![S::line("sma", "blue")], vec![]),
        IndicatorKind::Ema => (Placement::Overlay, vec![S::line("ema", "red")], vec![]),
        IndicatorKind::Bbands => (
            Placement::Overlay,
            vec![
                S::line("upperband", "lightblue"),
                S::line("middleband", "orange"),
                S::line("lowerband", "lightblue"),
            ],
            vec![],
        ),
        IndicatorKind::Rsi => (
            Placement::NewPane,
            vec![S::line("rsi", "violet")],
            RSI_LIMITS
                .iter()
                .map(|(key, default)| indicator.param(key).unwrap_or(*default))
                .collect(),
        ),
        IndicatorKind::Macd => (
            Placement::NewPane,
            vec![
                PlannedSeries {
                    field: "macdhist",
                    kind: SeriesKind::Momentum,
                    color: UP_COLOR,
                },
                S::line("macd", "blue"),
                S::line("macdsignal", "orange"),
            ],
            vec![],
        ),
        IndicatorKind::Stoch => (
            Placement::NewPane,
            vec![S::line("slowk", "blue"), S::line("slowd", "orange")],
            STOCH_LIMITS.to_vec(),
        ),
        IndicatorKind::StochRsi => (
            Placement::NewPane,
            vec![S::line("fastk", "blue"), S::line("fastd", "orange")],
            STOCH_LIMITS.to_vec(),
        ),
        IndicatorKind::Aroon => (
            Placement::NewPane,
            vec![S::line("aroonup", "green"), S::line("aroondown", "red")],
            vec![],
        ),
        IndicatorKind::Other(code) => {
            return Err(StratifyError::UnknownIndicator { short_name: code });
        }
    };
    Ok(SeriesPlan {
        placement,
        series,
        reference_lines,
    })
}

/// Histogram bar color from the value and the previous value.
pub fn momentum_color(value: f64, prev: f64) -> &'static str {
    if value > 0.0 {
        if value > prev { UP_COLOR } else { UP_FADED_COLOR }
    } else if value < prev {
        DOWN_COLOR
    } else {
        DOWN_FADED_COLOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{IndicatorParam, IndicatorPoint, new_from_catalog};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn indicator(code: &str) -> Indicator {
        Indicator {
            id: "0123456789".into(),
            name: code.to_lowercase(),
            short_name: code.into(),
            params: vec![],
            data: None,
        }
    }

    #[test]
    fn overlays_and_panes_follow_the_table() {
        let expect = [
            ("SMA", Placement::Overlay, 1, 0),
            ("EMA", Placement::Overlay, 1, 0),
            ("BBANDS", Placement::Overlay, 3, 0),
            ("RSI", Placement::NewPane, 1, 3),
            ("MACD", Placement::NewPane, 3, 0),
            ("STOCH", Placement::NewPane, 2, 2),
            ("STOCHRSI", Placement::NewPane, 2, 2),
            ("AROON", Placement::NewPane, 2, 0),
        ];
        for (code, placement, series, lines) in expect {
            let plan = plan_for(&indicator(code)).unwrap();
            assert_eq!(plan.placement, placement, "{code}");
            assert_eq!(plan.series.len(), series, "{code}");
            assert_eq!(plan.reference_lines.len(), lines, "{code}");
        }
    }

    #[test]
    fn unmapped_code_is_rejected() {
        let err = plan_for(&indicator("ADX")).unwrap_err();
        assert!(matches!(err, StratifyError::UnknownIndicator { ref short_name } if short_name == "ADX"));
    }

    #[test]
    fn rsi_limits_come_from_params() {
        let mut rsi = new_from_catalog("RSI", &[]).unwrap();
        let plan = plan_for(&rsi).unwrap();
        assert_eq!(plan.reference_lines, vec![70.0, 50.0, 30.0]);
        rsi.params = vec![IndicatorParam::new("upper_limit", 80.0)];
        assert_eq!(plan_for(&rsi).unwrap().reference_lines, vec![80.0, 50.0, 30.0]);
        assert!(plan.price_lines().iter().all(|l| l.color == "grey"));
    }

    #[test]
    fn momentum_colors() {
        assert_eq!(momentum_color(2.0, 1.0), "#2EBD85");
        assert_eq!(momentum_color(1.0, 2.0), "#ACE5DC");
        assert_eq!(momentum_color(-2.0, -1.0), "#F6465D");
        assert_eq!(momentum_color(-1.0, -2.0), "#FCCBCD");
        assert_eq!(momentum_color(1.0, 1.0), "#ACE5DC");
    }

    #[test]
    fn points_skip_missing_values_and_color_histograms() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let row = |secs: i64, hist: serde_json::Value| IndicatorPoint {
            time: t0 + chrono::Duration::seconds(secs),
            values: [("macdhist".to_string(), hist)].into_iter().collect(),
        };
        let mut macd = indicator("MACD");
        macd.data = Some(vec![row(0, json!(1.0)), row(60, json!(null)), row(120, json!(0.5))]);
        let plan = plan_for(&macd).unwrap();
        let points = plan.series[0].points(&macd, &Tz::UTC);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].time, t0.timestamp() + 120);
        assert_eq!(points[0].color.as_deref(), Some("#ACE5DC"));
        assert_eq!(points[1].color.as_deref(), Some("#ACE5DC"));
        assert!(plan.series[1].points(&macd, &Tz::UTC).is_empty());
    }
}
