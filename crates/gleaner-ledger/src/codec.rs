//! Column encoding shared by the job and run tables.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{LedgerError, Result};

/// Fixed-width RFC 3339 so lexical `ORDER BY` matches chronological order.
pub(crate) fn encode_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(table: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::CorruptRow {
            table,
            reason: format!("bad timestamp '{raw}': {e}"),
        })
}

pub(crate) fn decode_opt_time(
    table: &'static str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(|s| decode_time(table, s)).transpose()
}

pub(crate) fn decode_enum<T>(table: &'static str, raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse()
        .map_err(|reason| LedgerError::CorruptRow { table, reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_times_sort_lexically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(encode_time(&a) < encode_time(&b));
        assert_eq!(decode_time("t", &encode_time(&b)).unwrap(), b);
    }

    #[test]
    fn garbage_time_is_corrupt_row() {
        assert!(matches!(
            decode_time("jobs", "yesterday"),
            Err(LedgerError::CorruptRow { table: "jobs", .. })
        ));
    }
}
