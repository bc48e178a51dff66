//! Serde adapters for the persisted data file.
//!
//! Files written by older versions store amounts as JSON numbers, dates as ISO
//! timestamps and occasionally `null` in text columns, so every reader here is
//! lenient. Writers always emit the canonical form.

use crate::domain::values::{parse_amount, parse_stored_date};
use crate::utils::format::{amount_str, round_money};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Amounts as two-decimal strings; reads numbers or strings.
pub mod money {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount_str(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = Option::<RawScalar>::deserialize(deserializer)?;
        let value = match raw {
            None | Some(RawScalar::Bool(_)) => Decimal::ZERO,
            Some(RawScalar::Integer(n)) => Decimal::from(n),
            Some(RawScalar::Float(f)) => {
                let repr = f.to_string();
                Decimal::from_str(&repr)
                    .or_else(|_| Decimal::from_scientific(&repr))
                    .map_err(serde::de::Error::custom)?
            }
            Some(RawScalar::Text(s)) => parse_amount(&s).map_err(serde::de::Error::custom)?,
        };
        Ok(round_money(value))
    }
}

/// Dates as `YYYY-MM-DD`, empty string when unknown.
pub mod stored_date {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_stored_date))
    }
}

/// Text columns that tolerate `null` and numbers.
pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = Option::<RawScalar>::deserialize(deserializer)?;
    Ok(match raw {
        None => String::new(),
        Some(RawScalar::Bool(b)) => b.to_string(),
        Some(RawScalar::Integer(n)) => n.to_string(),
        Some(RawScalar::Float(f)) => f.to_string(),
        Some(RawScalar::Text(s)) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Deserialize)]
    struct Row {
        #[serde(with = "money", default)]
        amount: Decimal,
        #[serde(with = "stored_date", default)]
        date: Option<NaiveDate>,
        #[serde(deserialize_with = "text", default)]
        note: String,
    }

    #[test]
    fn reads_legacy_numbers_and_timestamps() {
        let row: Row = serde_json::from_str(
            r#"{"amount": 44324.91, "date": "2025-01-01T00:00:00.000Z", "note": null}"#,
        )
        .unwrap();
        assert_eq!(row.amount, Decimal::from_str("44324.91").unwrap());
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(row.note, "");
    }

    #[test]
    fn reads_strings_and_missing_fields() {
        let row: Row = serde_json::from_str(r#"{"amount": "1.234,50", "note": 42}"#).unwrap();
        assert_eq!(row.amount, Decimal::from_str("1234.50").unwrap());
        assert_eq!(row.date, None);
        assert_eq!(row.note, "42");
    }

    #[test]
    fn writes_canonical_form() {
        let row = Row {
            amount: Decimal::from(80),
            date: NaiveDate::from_ymd_opt(2025, 1, 4),
            note: String::new(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["amount"], "80.00");
        assert_eq!(json["date"], "2025-01-04");
    }
}
