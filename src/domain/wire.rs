//! Serde helpers for the loosely typed JSON the API returns.
//!
//! Timestamps arrive either as epoch milliseconds or as ISO-8601 text, numbers
//! sometimes arrive quoted, and list-valued strategy fields are stored as JSON
//! text inside the JSON document.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::String(s) => parse_timestamp_text(s),
        _ => None,
    }
}

pub fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    s.parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// A number, or a string holding one.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_timestamp(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {value}")))
    }
}

pub mod optional_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(None),
            Value::String(ref s) if s.trim().is_empty() => Ok(None),
            other => parse_timestamp(&other)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {other}"))),
        }
    }
}

pub mod number {
    use super::*;

    pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(*v)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_number(&value).ok_or_else(|| de::Error::custom(format!("invalid number: {value}")))
    }
}

/// Missing, null or unparsable values become `0.0`.
pub mod number_or_zero {
    use super::*;

    pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(*v)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(parse_number(&value).unwrap_or(0.0))
    }
}

pub mod optional_number {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => serializer.serialize_some(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(parse_number(&value))
    }
}

/// A list stored as JSON text: `"[{...}, {...}]"`. A real JSON array, null or
/// an empty string are also accepted on the way in.
pub mod json_text {
    use super::*;

    pub fn serialize<T: Serialize, S: Serializer>(items: &T, serializer: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(items).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, T: DeserializeOwned, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<T>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
            Value::String(s) => serde_json::from_str(&s).map_err(de::Error::custom),
            array @ Value::Array(_) => serde_json::from_value(array).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!("expected JSON list text, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn timestamps_from_millis_and_text() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&json!(1714564800000i64)), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-05-01T12:00:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-05-01T14:00:00+02:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-05-01 12:00:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!(true)), None);
    }

    #[test]
    fn quoted_numbers_parse() {
        assert_eq!(parse_number(&json!("0.0002")), Some(0.0002));
        assert_eq!(parse_number(&json!(3)), Some(3.0));
        assert_eq!(parse_number(&json!("abc")), None);
        assert_eq!(parse_number(&json!(null)), None);
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "json_text", default)]
        items: Vec<u32>,
    }

    #[test]
    fn json_text_accepts_text_and_arrays() {
        let from_text: Holder = serde_json::from_str(r#"{"items": "[1, 2]"}"#).unwrap();
        let from_array: Holder = serde_json::from_str(r#"{"items": [1, 2]}"#).unwrap();
        let from_null: Holder = serde_json::from_str(r#"{"items": null}"#).unwrap();
        let missing: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(from_text.items, vec![1, 2]);
        assert_eq!(from_array, from_text);
        assert!(from_null.items.is_empty());
        assert!(missing.items.is_empty());
    }

    #[test]
    fn json_text_serializes_as_string() {
        let text = serde_json::to_string(&Holder { items: vec![7] }).unwrap();
        assert_eq!(text, r#"{"items":"[7]"}"#);
    }
}
