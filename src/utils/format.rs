//! pt-BR presentation helpers shared by reports, the assistant context and the CLI.

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

const MONTH_NAMES: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Plain two-decimal amount for CSV cells: `1234.50`.
pub fn amount_str(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}

/// `R$ 1.234,56`, with a leading `-` for negatives.
pub fn format_currency(value: Decimal) -> String {
    let rounded = round_money(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{}", sign, grouped, frac_part)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Grouping key `YYYY-MM`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn parse_month_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d").ok()
}

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("")
}

/// `janeiro de 2025`
pub fn month_label(date: NaiveDate) -> String {
    format!("{} de {}", month_name(date.month()), date.year())
}

/// Ids keep the `id_` prefix used by previously exported data.
pub fn generate_id() -> String {
    format!("id_{}", uuid::Uuid::new_v4().simple())
}

pub fn format_percent(value: Decimal, total: Decimal) -> String {
    if total.is_zero() {
        return "0.0".to_string();
    }
    format!("{:.1}", (value / total * Decimal::ONE_HUNDRED).round_dp(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn currency_uses_brazilian_grouping() {
        assert_eq!(format_currency(dec("44324.91")), "R$ 44.324,91");
        assert_eq!(format_currency(dec("0")), "R$ 0,00");
        assert_eq!(format_currency(dec("-1200")), "-R$ 1.200,00");
        assert_eq!(format_currency(dec("1234567.005")), "R$ 1.234.567,01");
        assert_eq!(format_currency(dec("999.999")), "R$ 1.000,00");
    }

    #[test]
    fn csv_amounts_have_two_decimals() {
        assert_eq!(amount_str(dec("80.4")), "80.40");
        assert_eq!(amount_str(dec("-3")), "-3.00");
    }

    #[test]
    fn month_helpers() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(month_key(date), "2025-03");
        assert_eq!(format_date(date), "09/03/2025");
        assert_eq!(month_label(date), "março de 2025");
        assert_eq!(parse_month_key("2025-03"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_month_key("garbage"), None);
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = generate_id();
        let b = generate_id();
        assert!(a.starts_with("id_"));
        assert_ne!(a, b);
    }

    #[test]
    fn percent_of_zero_total() {
        assert_eq!(format_percent(dec("10"), Decimal::ZERO), "0.0");
        assert_eq!(format_percent(dec("1200"), dec("2500")), "48.0");
    }
}
