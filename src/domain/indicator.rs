//! Indicator configurations attached to a strategy.
//!
//! Indicator math runs server-side. The client only knows each indicator's
//! identity, parameters and, once fetched, its data points, and maps the short
//! code to how it should be drawn.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::wire;

pub const INDICATOR_ID_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParam {
    pub key: String,
    #[serde(with = "wire::number")]
    pub value: f64,
}

impl IndicatorParam {
    pub fn new(key: &str, value: f64) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }
}

/// One row of indicator output: a timestamp plus named values
/// (`sma`, `upperband`, `macdhist`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    #[serde(with = "wire::timestamp")]
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

impl IndicatorPoint {
    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(wire::parse_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub params: Vec<IndicatorParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<IndicatorPoint>>,
}

impl Indicator {
    pub fn kind(&self) -> IndicatorKind {
        IndicatorKind::from_short_name(&self.short_name)
    }

    pub fn param(&self, key: &str) -> Option<f64> {
        self.params.iter().find(|p| p.key == key).map(|p| p.value)
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Copy without data points, the shape stored in the strategy record.
    pub fn without_data(&self) -> Self {
        Self {
            data: None,
            ..self.clone()
        }
    }

    /// `RSI 14 70 50 30`
    pub fn legend_label(&self) -> String {
        let mut label = self.short_name.clone();
        label.push(' ');
        label.push_str(
            &self
                .params
                .iter()
                .map(|p| param_text(p.value))
                .collect::<Vec<_>>()
                .join(" "),
        );
        label
    }

    /// Base operand name: `SMA_20`, `BBANDS_20_2_2`.
    pub fn operand_name(&self) -> String {
        let mut name = self.short_name.clone();
        for p in &self.params {
            name.push('_');
            name.push_str(&param_text(p.value));
        }
        name
    }

    /// Names usable in order conditions, one per output field for
    /// multi-output indicators.
    pub fn operand_names(&self) -> Vec<String> {
        let base = self.operand_name();
        match self.kind().output_fields() {
            [_] => vec![base],
            fields => fields.iter().map(|f| format!("{base}_{f}")).collect(),
        }
    }

    /// Same parameter values in the same order.
    pub fn same_params(&self, other: &Indicator) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.key == b.key && a.value == b.value)
    }
}

/// Integral values print without a decimal point.
pub fn param_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Bbands,
    Macd,
    Stoch,
    StochRsi,
    Aroon,
    Other(String),
}

impl IndicatorKind {
    pub fn from_short_name(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "SMA" => IndicatorKind::Sma,
            "EMA" => IndicatorKind::Ema,
            "RSI" => IndicatorKind::Rsi,
            "BBANDS" => IndicatorKind::Bbands,
            "MACD" => IndicatorKind::Macd,
            "STOCH" => IndicatorKind::Stoch,
            "STOCHRSI" => IndicatorKind::StochRsi,
            "AROON" => IndicatorKind::Aroon,
            _ => IndicatorKind::Other(code.to_string()),
        }
    }

    /// Output fields in the order they are listed as operands.
    pub fn output_fields(&self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Sma => &["sma"],
            IndicatorKind::Ema => &["ema"],
            IndicatorKind::Rsi => &["rsi"],
            IndicatorKind::Bbands => &["upperband", "middleband", "lowerband"],
            IndicatorKind::Macd => &["macdhist", "macd", "macdsignal"],
            IndicatorKind::Stoch => &["slowk", "slowd"],
            IndicatorKind::StochRsi => &["fastk", "fastd"],
            IndicatorKind::Aroon => &["aroondown", "aroonup"],
            IndicatorKind::Other(_) => &["value"],
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, IndicatorKind::Other(_))
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Bbands => "BBANDS",
            IndicatorKind::Macd => "MACD",
            IndicatorKind::Stoch => "STOCH",
            IndicatorKind::StochRsi => "STOCHRSI",
            IndicatorKind::Aroon => "AROON",
            IndicatorKind::Other(code) => code,
        };
        write!(f, "{code}")
    }
}

struct Template {
    short_name: &'static str,
    name: &'static str,
    params: &'static [(&'static str, f64)],
}

const CATALOG: &[Template] = &[
    Template {
        short_name: "SMA",
        name: "simple moving average",
        params: &[("timeperiod", 20.0)],
    },
    Template {
        short_name: "EMA",
        name: "exponential moving average",
        params: &[("timeperiod", 20.0)],
    },
    Template {
        short_name: "RSI",
        name: "relative strength index",
        params: &[
            ("timeperiod", 14.0),
            ("upper_limit", 70.0),
            ("middle_limit", 50.0),
            ("lower_limit", 30.0),
        ],
    },
    Template {
        short_name: "BBANDS",
        name: "bollinger bands",
        params: &[("timeperiod", 20.0), ("nbdevup", 2.0), ("nbdevdn", 2.0)],
    },
    Template {
        short_name: "MACD",
        name: "moving average convergence divergence",
        params: &[
            ("fastperiod", 12.0),
            ("slowperiod", 26.0),
            ("signalperiod", 9.0),
        ],
    },
    Template {
        short_name: "STOCH",
        name: "stochastic",
        params: &[
            ("fastk_period", 5.0),
            ("slowk_period", 3.0),
            ("slowd_period", 3.0),
        ],
    },
    Template {
        short_name: "STOCHRSI",
        name: "stochastic relative strength index",
        params: &[
            ("timeperiod", 14.0),
            ("fastk_period", 5.0),
            ("fastd_period", 3.0),
        ],
    },
    Template {
        short_name: "AROON",
        name: "aroon",
        params: &[("timeperiod", 14.0)],
    },
];

/// Short codes that can be added from the built-in catalog.
pub fn catalog_short_names() -> Vec<&'static str> {
    CATALOG.iter().map(|t| t.short_name).collect()
}

/// A new indicator from the catalog with default parameters and an id that
/// does not collide with `existing`.
pub fn new_from_catalog(short_name: &str, existing: &[Indicator]) -> Option<Indicator> {
    let template = CATALOG
        .iter()
        .find(|t| t.short_name.eq_ignore_ascii_case(short_name.trim()))?;
    Some(Indicator {
        id: generate_indicator_id(existing),
        name: template.name.to_string(),
        short_name: template.short_name.to_string(),
        params: template
            .params
            .iter()
            .map(|(key, value)| IndicatorParam::new(key, *value))
            .collect(),
        data: None,
    })
}

/// Ten lowercase hex characters, unique within `existing`.
pub fn generate_indicator_id(existing: &[Indicator]) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let bytes: [u8; INDICATOR_ID_LEN / 2] = rng.r#gen();
        let id: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        if !existing.iter().any(|i| i.id == id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbands() -> Indicator {
        Indicator {
            id: "a1b2c3d4e5".into(),
            name: "bollinger bands".into(),
            short_name: "BBANDS".into(),
            params: vec![
                IndicatorParam::new("timeperiod", 20.0),
                IndicatorParam::new("nbdevup", 2.0),
                IndicatorParam::new("nbdevdn", 2.5),
            ],
            data: None,
        }
    }

    #[test]
    fn legend_label_joins_param_values() {
        assert_eq!(bbands().legend_label(), "BBANDS 20 2 2.5");
    }

    #[test]
    fn operand_names_expand_multi_output() {
        assert_eq!(
            bbands().operand_names(),
            vec![
                "BBANDS_20_2_2.5_upperband",
                "BBANDS_20_2_2.5_middleband",
                "BBANDS_20_2_2.5_lowerband",
            ]
        );
        let sma = new_from_catalog("sma", &[]).unwrap();
        assert_eq!(sma.operand_names(), vec!["SMA_20"]);
    }

    #[test]
    fn aroon_outputs_down_then_up() {
        let aroon = new_from_catalog("AROON", &[]).unwrap();
        assert_eq!(
            aroon.operand_names(),
            vec!["AROON_14_aroondown", "AROON_14_aroonup"]
        );
    }

    #[test]
    fn kind_parsing_is_case_insensitive() {
        assert_eq!(IndicatorKind::from_short_name("stochrsi"), IndicatorKind::StochRsi);
        assert_eq!(
            IndicatorKind::from_short_name("ADX"),
            IndicatorKind::Other("ADX".into())
        );
        assert!(!IndicatorKind::from_short_name("ADX").is_supported());
    }

    #[test]
    fn generated_ids_are_hex_and_unique() {
        let mut existing = Vec::new();
        for _ in 0..50 {
            let mut ind = new_from_catalog("EMA", &existing).unwrap();
            assert_eq!(ind.id.len(), INDICATOR_ID_LEN);
            assert!(ind.id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            assert!(!existing.iter().any(|i: &Indicator| i.id == ind.id));
            ind.data = None;
            existing.push(ind);
        }
    }

    #[test]
    fn unknown_catalog_entry_is_none() {
        assert!(new_from_catalog("VWAP", &[]).is_none());
    }

    #[test]
    fn point_values_accept_quoted_numbers() {
        let json = r#"{"time": "2024-01-01T00:00:00Z", "upperband": "10.5", "lowerband": 9, "middleband": null}"#;
        let point: IndicatorPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.value("upperband"), Some(10.5));
        assert_eq!(point.value("lowerband"), Some(9.0));
        assert_eq!(point.value("middleband"), None);
        assert_eq!(point.value("missing"), None);
    }

    #[test]
    fn same_params_compares_values_in_order() {
        let a = bbands();
        let mut b = bbands();
        assert!(a.same_params(&b));
        b.params[1].value = 3.0;
        assert!(!a.same_params(&b));
    }

    #[test]
    fn without_data_strips_points() {
        let mut ind = bbands();
        ind.data = Some(Vec::new());
        assert!(ind.has_data());
        assert!(!ind.without_data().has_data());
    }
}
