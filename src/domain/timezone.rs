//! UTC to user-timezone conversion for chart and table timestamps.
//!
//! The charting surface has no notion of zones: it plots seconds as if they
//! were UTC. A [`ZonedTime`] shifts each instant by the zone's offset *at that
//! instant*, so series that span a daylight-saving change stay correct, and
//! keeps the offset so the original instant can always be recovered.

use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::domain::error::StratifyError;

pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Display format used by tables and trade lists.
pub const DISPLAY_FORMAT: &str = "%b %d %Y, %H:%M";

pub fn parse_timezone(name: &str) -> Result<Tz, StratifyError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| StratifyError::UnknownTimezone {
            name: name.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedTime {
    pub local: NaiveDateTime,
    pub offset_seconds: i32,
}

impl ZonedTime {
    pub fn from_utc(instant: DateTime<Utc>, tz: &Tz) -> Self {
        let zoned = tz.from_utc_datetime(&instant.naive_utc());
        Self {
            local: zoned.naive_local(),
            offset_seconds: zoned.offset().fix().local_minus_utc(),
        }
    }

    /// Wall-clock time expressed as seconds, the value handed to the chart.
    pub fn chart_seconds(&self) -> i64 {
        self.local.and_utc().timestamp()
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        (self.local - Duration::seconds(i64::from(self.offset_seconds))).and_utc()
    }

    pub fn format(&self, fmt: &str) -> String {
        self.local.format(fmt).to_string()
    }
}

/// Shorthand for `ZonedTime::from_utc(..).chart_seconds()`.
pub fn to_chart_seconds(instant: DateTime<Utc>, tz: &Tz) -> i64 {
    ZonedTime::from_utc(instant, tz).chart_seconds()
}

pub fn format_in_zone(instant: DateTime<Utc>, tz: &Tz) -> String {
    ZonedTime::from_utc(instant, tz).format(DISPLAY_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn parses_iana_names() {
        assert_eq!(parse_timezone("Europe/Madrid").unwrap(), chrono_tz::Europe::Madrid);
        assert_eq!(parse_timezone(" UTC ").unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn rejects_unknown_zone() {
        let err = parse_timezone("Mars/Olympus").unwrap_err();
        assert!(matches!(err, StratifyError::UnknownTimezone { .. }));
    }

    #[test]
    fn offset_is_recomputed_per_instant() {
        let tz = chrono_tz::Europe::Madrid;
        let winter = ZonedTime::from_utc(utc(2024, 1, 15, 12, 0), &tz);
        let summer = ZonedTime::from_utc(utc(2024, 7, 15, 12, 0), &tz);
        assert_eq!(winter.offset_seconds, 3600);
        assert_eq!(summer.offset_seconds, 7200);
        assert_eq!(
            winter.chart_seconds(),
            utc(2024, 1, 15, 13, 0).timestamp()
        );
    }

    #[test]
    fn ambiguous_fall_back_hour_round_trips() {
        // 2024-11-03 01:30 happens twice in New York.
        let tz = chrono_tz::America::New_York;
        let first = utc(2024, 11, 3, 5, 30);
        let second = utc(2024, 11, 3, 6, 30);
        let a = ZonedTime::from_utc(first, &tz);
        let b = ZonedTime::from_utc(second, &tz);
        assert_eq!(a.local, b.local);
        assert_eq!(a.to_utc(), first);
        assert_eq!(b.to_utc(), second);
    }

    #[test]
    fn display_format() {
        let tz = chrono_tz::Asia::Tokyo;
        assert_eq!(format_in_zone(utc(2024, 3, 9, 23, 5), &tz), "Mar 10 2024, 08:05");
    }

    proptest! {
        #[test]
        fn round_trip_recovers_instant(
            secs in 0i64..4_102_444_800i64,
            zone_index in 0usize..chrono_tz::TZ_VARIANTS.len(),
        ) {
            let tz = chrono_tz::TZ_VARIANTS[zone_index];
            let instant = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();
            let zoned = ZonedTime::from_utc(instant, &tz);
            prop_assert_eq!(zoned.to_utc(), instant);
        }
    }
}
