use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::LAST_REVIEW_COLUMN;
use crate::dataset::{Dataset, ReviewDate};
use crate::error::{CleaningError, Result};

/// What to do with a `last_review` value that is not a recognizable date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Abort the run on the first unparseable value.
    #[default]
    FailFast,
    /// Replace unparseable values with a missing value.
    Coerce,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateStats {
    pub normalized: usize,
    pub missing: usize,
    pub coerced: usize,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m-%d-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
    "%B %d %Y %H:%M:%S",
    "%B %d %Y %H:%M",
    "%b %d %Y %H:%M:%S",
    "%b %d %Y %H:%M",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

// Month-first before day-first
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse a free-form review date into a naive timestamp. Offsets are
/// converted to UTC.
pub fn parse_review_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    parse_compact_date(s)
}

/// `YYYYMMDD`, optionally followed by a time.
fn parse_compact_date(s: &str) -> Option<NaiveDateTime> {
    let (date, time) = match s.split_once(char::is_whitespace) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (s, None),
    };
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = date[0..4].parse().ok()?;
    let month: u32 = date[4..6].parse().ok()?;
    let day: u32 = date[6..8].parse().ok()?;
    let day = NaiveDate::from_ymd_opt(year, month, day)?;
    match time {
        None => day.and_hms_opt(0, 0, 0),
        Some(time) => TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(time, fmt).ok())
            .map(|t| day.and_time(t)),
    }
}

/// Convert every `last_review` cell into a canonical timestamp.
pub fn normalize_dates(dataset: &Dataset, policy: DatePolicy) -> Result<(Dataset, DateStats)> {
    let mut stats = DateStats::default();
    let mut records = Vec::with_capacity(dataset.len());

    for record in dataset.records() {
        let mut record = record.clone();
        record.last_review = match record.last_review {
            ReviewDate::Missing => {
                stats.missing += 1;
                ReviewDate::Missing
            }
            ReviewDate::Normalized(dt) => {
                stats.normalized += 1;
                ReviewDate::Normalized(dt)
            }
            ReviewDate::Raw(raw) => match parse_review_date(&raw) {
                Some(dt) => {
                    stats.normalized += 1;
                    ReviewDate::Normalized(dt)
                }
                None => match policy {
                    DatePolicy::FailFast => {
                        return Err(CleaningError::Parse {
                            column: LAST_REVIEW_COLUMN.to_string(),
                            row: record.row,
                            value: raw,
                        });
                    }
                    DatePolicy::Coerce => {
                        debug!(row = record.row, value = %raw, "coercing unparseable date to missing");
                        stats.coerced += 1;
                        ReviewDate::Missing
                    }
                },
            },
        };
        records.push(record);
    }

    if stats.coerced > 0 {
        warn!(coerced = stats.coerced, "unparseable last_review values replaced with missing");
    }
    Ok((dataset.with_records(records), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::schema::validate_schema;
    use crate::dataset::Table;

    fn dataset(csv: &str) -> Dataset {
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        let schema = validate_schema(&table).unwrap();
        Dataset::from_table(table, schema)
    }

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_common_shapes() {
        let midnight = ymd_hms(2019, 5, 21, 0, 0, 0);
        for raw in [
            "2019-05-21",
            "2019/05/21",
            "05/21/2019",
            "5/21/2019",
            "05-21-2019",
            "May 21, 2019",
            "21 May 2019",
            "20190521",
            " 2019-05-21 ",
        ] {
            assert_eq!(parse_review_date(raw), Some(midnight), "{raw}");
        }
        assert_eq!(
            parse_review_date("2019-05-21 14:30:05"),
            Some(ymd_hms(2019, 5, 21, 14, 30, 5))
        );
        assert_eq!(
            parse_review_date("2019-05-21T14:30"),
            Some(ymd_hms(2019, 5, 21, 14, 30, 0))
        );
        assert_eq!(
            parse_review_date("2019-05-21T14:30:05+02:00"),
            Some(ymd_hms(2019, 5, 21, 12, 30, 5))
        );    }

    #[test]
    fn every_date_shape_accepts_a_time() {
        let half_past = ymd_hms(2019, 5, 21, 14, 30, 0);
        let with_seconds = ymd_hms(2019, 5, 21, 10, 0, 5);
        for (raw, expected) in [
            ("May 21, 2019 14:30", half_past),
            ("May 21, 2019 10:00:05", with_seconds),
            ("Sep 3, 2019 14:30", ymd_hms(2019, 9, 3, 14, 30, 0)),
            ("May 21 2019 14:30", half_past),
            ("05-21-2019 14:30", half_past),
            ("05-21-2019 10:00:05", with_seconds),
            ("21 May 2019 14:30", half_past),
            ("21 May 2019 10:00:05", with_seconds),
            ("2019/05/21 14:30", half_past),
            ("05/21/2019 2:30 PM", half_past),
            ("20190521 14:30", half_past),
            ("20190521 10:00:05", with_seconds),
        ] {
            assert_eq!(parse_review_date(raw), Some(expected), "{raw}");
        }
        assert_eq!(parse_review_date("20190521 25:00"), None);
    }

    #[test]
    fn rejects_garbage_and_impossible_dates() {
        assert_eq!(parse_review_date("not a date"), None);
        assert_eq!(parse_review_date("2019-02-30"), None);
        assert_eq!(parse_review_date("20191340"), None);
    }

    #[test]
    fn fail_fast_names_row_and_value() {
        let ds = dataset("price,last_review\n10,2019-05-21\n20,yesterday\n30,soon\n");
        let err = normalize_dates(&ds, DatePolicy::FailFast).unwrap_err();
        match err {
            CleaningError::Parse { column, row, value } => {
                assert_eq!(column, "last_review");
                assert_eq!(row, 2);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn coerce_replaces_bad_values_with_missing() {
        let ds = dataset("price,last_review\n10,2019-05-21\n20,yesterday\n30,\n");
        let (out, stats) = normalize_dates(&ds, DatePolicy::Coerce).unwrap();
        assert_eq!(
            stats,
            DateStats {
                normalized: 1,
                missing: 1,
                coerced: 1
            }
        );
        assert_eq!(out.records()[1].last_review, ReviewDate::Missing);
        let csv = String::from_utf8(out.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(csv, "price,last_review\n10,2019-05-21\n20,\n30,\n");
    }

    #[test]
    fn missing_values_never_fail() {
        let ds = dataset("price,last_review\n10,\n20,NaN\n");
        let (_, stats) = normalize_dates(&ds, DatePolicy::FailFast).unwrap();
        assert_eq!(stats.missing, 2);
    }

    #[test]
    fn policy_reads_from_settings_text() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: DatePolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"coerce\"").unwrap();
        assert_eq!(w.policy, DatePolicy::Coerce);
    }
}
