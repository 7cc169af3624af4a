//! iCal DATE / DATE-TIME normalization.
//!
//! Accepts `YYYYMMDD` and `YYYYMMDDThhmmss[Z]`. Every value is read as UTC;
//! `TZID` parameters are not resolved to offsets.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

/// Property parameters of a content line, keyed by upper-cased name.
pub type Params = HashMap<String, String>;

/// Normalize an iCal date or date-time value into a UTC instant.
///
/// Returns `None` when the value does not match either grammar or names an
/// impossible calendar date/time.
pub fn normalize(raw: &str, params: &Params) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    let parsed = parse_parts(value);

    let Some((date, time)) = parsed else {
        tracing::debug!("Unparsable iCal date value {:?} (params {:?})", raw, params);
        return None;
    };

    let value_is_date = params.get("VALUE").map(|v| v == "DATE").unwrap_or(false);

    let time = match time {
        Some(t) if !value_is_date => t,
        _ => NaiveTime::from_hms_opt(0, 0, 0)?,
    };

    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

fn all_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_parts(value: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let (date_part, time_part) = match value.split_once('T') {
        Some((d, t)) => (d, Some(t.strip_suffix('Z').unwrap_or(t))),
        None => (value, None),
    };

    if !all_digits(date_part, 8) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y%m%d").ok()?;

    let time = match time_part {
        None => None,
        Some(t) => {
            if !all_digits(t, 6) {
                return None;
            }
            let time = NaiveTime::parse_from_str(t, "%H%M%S").ok()?;
            // chrono reads second 60 as a leap second.
            if time.nanosecond() >= 1_000_000_000 {
                return None;
            }
            Some(time)
        }
    };

    Some((date, time))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn date_value_is_utc_midnight() {
        let got = normalize("20240115", &params(&[("VALUE", "DATE")])).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn date_without_value_param_is_utc_midnight() {
        let got = normalize("20240229", &Params::new()).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn date_time_with_zulu_suffix() {
        let got = normalize("20240115T140000Z", &Params::new()).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap());
    }

    #[test]
    fn floating_and_tzid_date_times_are_read_as_utc() {
        let floating = normalize("20240115T093015", &Params::new()).unwrap();
        assert_eq!(floating, Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 15).unwrap());

        let with_tzid = normalize(
            "20240115T093015",
            &params(&[("TZID", "Europe/Berlin")]),
        )
        .unwrap();
        assert_eq!(with_tzid, floating);
    }

    #[test]
    fn value_date_discards_time_component() {
        let got = normalize("20240115T140000Z", &params(&[("VALUE", "DATE")])).unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn malformed_values_are_rejected() {
        let none = Params::new();
        assert!(normalize("", &none).is_none());
        assert!(normalize("2024-01-15", &none).is_none());
        assert!(normalize("202401151", &none).is_none());
        assert!(normalize("20241315", &none).is_none());
        assert!(normalize("20240115T25", &none).is_none());
        assert!(normalize("20240115T250000Z", &none).is_none());
        assert!(normalize("20240115T1400000Z", &none).is_none());
        assert!(normalize("20240115T146000Z", &none).is_none());
        assert!(normalize("20240115T235960Z", &none).is_none());
        assert!(normalize("20230229", &none).is_none());
        assert!(normalize("+2024011", &none).is_none());
    }
}
