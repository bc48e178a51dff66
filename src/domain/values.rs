//! Parsing of the two scalar kinds found in bank statements: dates and money.

use crate::utils::error::{CfoError, Result, ValueKind};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[/\-](\d{1,2})[/\-](\d{2,4})$").expect("day-first date pattern")
});
static YEAR_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})[/\-](\d{1,2})[/\-](\d{1,2})$").expect("year-first date pattern")
});

const CURRENCY_SYMBOLS: &[char] = &['R', '$', '€', '£', '¥', '₹', '₪', '₽', '¢'];

fn date_error(input: &str, reason: impl Into<String>) -> CfoError {
    CfoError::ValueError {
        kind: ValueKind::Date,
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn amount_error(input: &str, reason: impl Into<String>) -> CfoError {
    CfoError::ValueError {
        kind: ValueKind::Amount,
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parses `DD/MM/YYYY` (also `-`, 2-digit years) first, then `YYYY-MM-DD`.
///
/// Two-digit years below 50 land in the 2000s, the rest in the 1900s.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let cleaned = input.trim();
    if cleaned.is_empty() {
        return Err(date_error(input, "empty date"));
    }

    let (day, month, year) = if let Some(caps) = DAY_FIRST.captures(cleaned) {
        let mut year: i32 = caps[3].parse().map_err(|_| date_error(input, "bad year"))?;
        if year < 100 {
            year += if year < 50 { 2000 } else { 1900 };
        }
        (
            caps[1].parse::<u32>().map_err(|_| date_error(input, "bad day"))?,
            caps[2].parse::<u32>().map_err(|_| date_error(input, "bad month"))?,
            year,
        )
    } else if let Some(caps) = YEAR_FIRST.captures(cleaned) {
        (
            caps[3].parse::<u32>().map_err(|_| date_error(input, "bad day"))?,
            caps[2].parse::<u32>().map_err(|_| date_error(input, "bad month"))?,
            caps[1].parse::<i32>().map_err(|_| date_error(input, "bad year"))?,
        )
    } else {
        return Err(date_error(input, "unrecognised date format"));
    };

    if !(1..=31).contains(&day) {
        return Err(date_error(input, format!("invalid day: {}", day)));
    }
    if !(1..=12).contains(&month) {
        return Err(date_error(input, format!("invalid month: {}", month)));
    }
    if !(1900..=2100).contains(&year) {
        return Err(date_error(input, format!("invalid year: {}", year)));
    }

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| date_error(input, format!("no such date: {}/{}/{}", day, month, year)))
}

/// Reads dates as stored by any version of the data file: `YYYY-MM-DD`,
/// an ISO timestamp, or a statement-style date. Unreadable input yields `None`.
pub fn parse_stored_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .or_else(|| parse_date(trimmed).ok())
}

/// Parses a money cell.
///
/// Currency symbols and whitespace are dropped, `(x)` is negative and an empty
/// cell is zero. When the last comma follows the last dot the value is read as
/// `1.234,56`; otherwise commas are thousands separators.
pub fn parse_amount(input: &str) -> Result<Decimal> {
    let mut cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let mut negative = false;
    if cleaned.len() >= 2 && cleaned.starts_with('(') && cleaned.ends_with(')') {
        negative = true;
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(comma), dot) if dot.map_or(true, |dot| comma > dot) => {
            cleaned.replace('.', "").replacen(',', ".", 1)
        }
        (Some(_), _) => cleaned.replace(',', ""),
        (None, _) => cleaned,
    };

    let value = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| amount_error(input, "not a number"))?;

    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn parses_brazilian_dates() {
        assert_eq!(parse_date("15/01/2025").unwrap(), NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(parse_date("5-3-2024").unwrap(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(parse_date(" 01/02/25 ").unwrap(), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(parse_date("01/02/75").unwrap(), NaiveDate::from_ymd_opt(1975, 2, 1).unwrap());
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_date("2025-01-20").unwrap(), NaiveDate::from_ymd_opt(2025, 1, 20).unwrap());
        assert_eq!(parse_date("2025/1/2").unwrap(), NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(parse_date("31/02/2025").is_err());
        assert!(parse_date("00/01/2025").is_err());
        assert!(parse_date("10/13/2025").is_err());
        assert!(parse_date("01/01/1850").is_err());
        assert!(parse_date("").is_err());
        assert!(parse_date("Jan 5 2025").is_err());
    }

    #[test]
    fn stored_dates_accept_timestamps() {
        assert_eq!(
            parse_stored_date("2025-01-01T00:00:00.000Z"),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(parse_stored_date("20/01/2025"), NaiveDate::from_ymd_opt(2025, 1, 20));
        assert_eq!(parse_stored_date("not a date"), None);
        assert_eq!(parse_stored_date(""), None);
    }

    #[test]
    fn parses_brazilian_amounts() {
        assert_eq!(parse_amount("1.234,56").unwrap(), dec("1234.56"));
        assert_eq!(parse_amount("R$ 1.234.567,89").unwrap(), dec("1234567.89"));
        assert_eq!(parse_amount("89,90").unwrap(), dec("89.90"));
        assert_eq!(parse_amount("-80,40").unwrap(), dec("-80.40"));
    }

    #[test]
    fn parses_international_amounts() {
        assert_eq!(parse_amount("1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_amount("2500.00").unwrap(), dec("2500.00"));
        assert_eq!(parse_amount("$ 12").unwrap(), dec("12"));
    }

    #[test]
    fn comma_after_last_dot_is_always_brazilian() {
        // read as `1.234,567`, which has two decimal separators
        assert!(parse_amount("1,234,567").is_err());
        assert_eq!(parse_amount("1234,567").unwrap(), dec("1234.567"));
    }

    #[test]
    fn parentheses_mean_negative() {
        assert_eq!(parse_amount("(1.200,00)").unwrap(), dec("-1200.00"));
    }

    #[test]
    fn empty_is_zero_and_garbage_fails() {
        assert_eq!(parse_amount("").unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount("   ").unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount("R$").unwrap(), Decimal::ZERO);
        assert!(parse_amount("abc").is_err());
    }
}
