// ==========================================
// Duty Roster Engine - row conversion helpers
// ==========================================
// Dates are stored as `%Y-%m-%d`, timestamps as `%Y-%m-%d %H:%M:%S`
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

pub fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FMT).to_string()
}

/// Parses a stored date inside a row mapper.
///
/// A malformed value surfaces as a conversion error for column `idx`
/// instead of a silently substituted date.
pub fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Builds an IN clause, e.g. `category_id IN (?, ?, ?)`.
///
/// An empty list yields an always-false condition so the SQL stays valid.
pub fn build_in_clause<T>(column_name: &str, values: &[T]) -> String {
    if values.is_empty() {
        return "1 = 0".to_string();
    }

    let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    format!("{} IN ({})", column_name, placeholders)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_in_clause() {
        assert_eq!(build_in_clause("id", &[1, 2, 3]), "id IN (?, ?, ?)");
        let empty: Vec<i64> = vec![];
        assert_eq!(build_in_clause("id", &empty), "1 = 0");
    }

    #[test]
    fn test_date_roundtrip_and_error() {
        let d = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert_eq!(parse_date(0, &format_date(d)).unwrap(), d);
        assert!(parse_date(0, "01.09.2025").is_err());
    }
}
