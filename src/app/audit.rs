//! Ledger audit: duplicates, gaps, outliers and suspicious dates or amounts.

use crate::domain::model::{AppData, Transaction};
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InvalidDate,
    FutureDate,
    OldDate,
    ZeroAmount,
    DoubleAmount,
}

impl IssueKind {
    pub fn message(&self) -> &'static str {
        match self {
            IssueKind::InvalidDate => "Data inválida",
            IssueKind::FutureDate => "Data no futuro",
            IssueKind::OldDate => "Data muito antiga",
            IssueKind::ZeroAmount => "Transação sem valor",
            IssueKind::DoubleAmount => "Transação com entrada e saída simultaneamente",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicatePair {
    pub original_id: String,
    pub duplicate_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub unclassified: Vec<String>,
    pub duplicates: Vec<DuplicatePair>,
    pub outliers: Vec<String>,
    pub incomplete: Vec<String>,
    pub date_issues: Vec<Issue>,
    pub balance_issues: Vec<Issue>,
}

impl AuditReport {
    pub fn total_issues(&self) -> usize {
        self.unclassified.len()
            + self.duplicates.len()
            + self.outliers.len()
            + self.incomplete.len()
            + self.date_issues.len()
            + self.balance_issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.total_issues() == 0
    }
}

pub fn unclassified(transactions: &[Transaction]) -> Vec<String> {
    transactions
        .iter()
        .filter(|t| !t.is_classified())
        .map(|t| t.id.clone())
        .collect()
}

/// Later copies sharing date, description and both amounts, each paired with
/// the first occurrence.
pub fn duplicates(transactions: &[Transaction]) -> Vec<DuplicatePair> {
    let mut seen: HashMap<(Option<NaiveDate>, &str, Decimal, Decimal), &str> = HashMap::new();
    let mut pairs = Vec::new();
    for tx in transactions {
        let key = (tx.date, tx.description.as_str(), tx.inflow, tx.outflow);
        match seen.get(&key) {
            Some(original) => pairs.push(DuplicatePair {
                original_id: original.to_string(),
                duplicate_id: tx.id.clone(),
            }),
            None => {
                seen.insert(key, tx.id.as_str());
            }
        }
    }
    pairs
}

pub fn incomplete(transactions: &[Transaction]) -> Vec<String> {
    transactions
        .iter()
        .filter(|t| {
            t.description.trim().is_empty()
                || t.date.is_none()
                || (t.inflow <= Decimal::ZERO && t.outflow <= Decimal::ZERO)
        })
        .map(|t| t.id.clone())
        .collect()
}

fn magnitude(tx: &Transaction) -> Decimal {
    tx.inflow.max(tx.outflow)
}

/// Interquartile-range outliers over the larger of inflow and outflow.
pub fn outliers(transactions: &[Transaction]) -> Vec<String> {
    let mut amounts: Vec<Decimal> = transactions
        .iter()
        .map(magnitude)
        .filter(|a| *a > Decimal::ZERO)
        .collect();
    if amounts.is_empty() {
        return Vec::new();
    }
    amounts.sort();

    let n = amounts.len();
    let q1 = amounts[n / 4];
    let q3 = amounts[(n * 3 / 4).min(n - 1)];
    let fence = (q3 - q1) * Decimal::new(15, 1);
    let lower = q1 - fence;
    let upper = q3 + fence;

    transactions
        .iter()
        .filter(|t| {
            let amount = magnitude(t);
            amount < lower || amount > upper
        })
        .map(|t| t.id.clone())
        .collect()
}

pub fn date_issues(transactions: &[Transaction], today: NaiveDate) -> Vec<Issue> {
    let future_limit = today + Duration::days(1);
    let oldest = NaiveDate::from_ymd_opt(today.year() - 5, 1, 1).unwrap_or(today);

    transactions
        .iter()
        .filter_map(|t| {
            let kind = match t.date {
                None => IssueKind::InvalidDate,
                Some(date) if date > future_limit => IssueKind::FutureDate,
                Some(date) if date < oldest => IssueKind::OldDate,
                Some(_) => return None,
            };
            Some(issue(kind, t))
        })
        .collect()
}

fn issue(kind: IssueKind, tx: &Transaction) -> Issue {
    Issue {
        kind,
        transaction_id: tx.id.clone(),
    }
}

pub fn balance_issues(transactions: &[Transaction]) -> Vec<Issue> {
    let zero = transactions
        .iter()
        .filter(|t| t.inflow.is_zero() && t.outflow.is_zero())
        .map(|t| issue(IssueKind::ZeroAmount, t));
    let double = transactions
        .iter()
        .filter(|t| t.inflow > Decimal::ZERO && t.outflow > Decimal::ZERO)
        .map(|t| issue(IssueKind::DoubleAmount, t));
    zero.chain(double).collect()
}

pub fn run(transactions: &[Transaction], today: NaiveDate) -> AuditReport {
    let report = AuditReport {
        unclassified: unclassified(transactions),
        duplicates: duplicates(transactions),
        outliers: outliers(transactions),
        incomplete: incomplete(transactions),
        date_issues: date_issues(transactions, today),
        balance_issues: balance_issues(transactions),
    };
    tracing::info!(
        "Audit finished: {} issue(s) across {} transaction(s)",
        report.total_issues(),
        transactions.len()
    );
    report
}

/// Removes every duplicate copy and returns how many were deleted.
pub fn fix_duplicates(data: &mut AppData) -> usize {
    let copies: HashSet<String> = duplicates(&data.transactions)
        .into_iter()
        .map(|p| p.duplicate_id)
        .collect();
    if copies.is_empty() {
        return 0;
    }

    let before = data.transactions.len();
    data.transactions.retain(|t| !copies.contains(&t.id));
    let removed = before - data.transactions.len();
    tracing::info!("Removed {} duplicate transaction(s)", removed);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn tx(id: &str, day: u32, inflow: i64, outflow: i64) -> Transaction {
        Transaction {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, day),
            description: format!("Lançamento {}", day),
            inflow: Decimal::from(inflow),
            outflow: Decimal::from(outflow),
            level1: "2.0 CUSTOS E DESPESAS OPERACIONAIS".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn example_data_is_clean() {
        let data = AppData::example();
        let report = run(&data.transactions, today());
        assert!(report.duplicates.is_empty());
        assert!(report.unclassified.is_empty());
        assert!(report.date_issues.is_empty());
        assert!(report.balance_issues.is_empty());
    }

    #[test]
    fn duplicates_pair_with_first() {
        let mut a = tx("a", 5, 0, 100);
        a.description = "Aluguel".to_string();
        let mut b = a.clone();
        b.id = "b".to_string();
        let mut c = a.clone();
        c.id = "c".to_string();
        let mut d = a.clone();
        d.id = "d".to_string();
        d.outflow = Decimal::from(101);

        let pairs = duplicates(&[a, b, c, d]);
        assert_eq!(
            pairs,
            vec![
                DuplicatePair {
                    original_id: "a".to_string(),
                    duplicate_id: "b".to_string()
                },
                DuplicatePair {
                    original_id: "a".to_string(),
                    duplicate_id: "c".to_string()
                },
            ]
        );
    }

    #[test]
    fn fix_duplicates_keeps_first() {
        let mut data = AppData::example();
        let mut copy = data.transactions[1].clone();
        copy.id = "copy".to_string();
        data.transactions.push(copy);

        assert_eq!(fix_duplicates(&mut data), 1);
        assert_eq!(data.transactions.len(), 5);
        assert!(data.find("copy").is_none());
        assert_eq!(fix_duplicates(&mut data), 0);
    }

    #[test]
    fn iqr_outlier() {
        let mut txs: Vec<Transaction> = (1..=8).map(|d| tx(&format!("t{}", d), d, 0, 100)).collect();
        txs.push(tx("big", 9, 10_000, 0));
        // zero rows stay out of the quartiles but still fall below the fence
        txs.push(tx("zero", 10, 0, 0));
        assert_eq!(outliers(&txs), vec!["big", "zero"]);
    }

    #[test]
    fn incomplete_and_unclassified() {
        let mut blank = tx("blank", 3, 0, 10);
        blank.description = "   ".to_string();
        let mut undated = tx("undated", 4, 10, 0);
        undated.date = None;
        let mut loose = tx("loose", 5, 10, 0);
        loose.level1.clear();
        let zero = tx("zero", 6, 0, 0);

        let txs = vec![blank, undated, loose, zero];
        assert_eq!(incomplete(&txs), vec!["blank", "undated", "zero"]);
        assert_eq!(unclassified(&txs), vec!["loose"]);
    }

    #[test]
    fn date_issue_bounds() {
        let mut future = tx("future", 1, 10, 0);
        future.date = NaiveDate::from_ymd_opt(2025, 3, 3);
        let mut tomorrow = tx("tomorrow", 1, 10, 0);
        tomorrow.date = NaiveDate::from_ymd_opt(2025, 3, 2);
        let mut old = tx("old", 1, 10, 0);
        old.date = NaiveDate::from_ymd_opt(2019, 12, 31);
        let mut edge = tx("edge", 1, 10, 0);
        edge.date = NaiveDate::from_ymd_opt(2020, 1, 1);
        let mut invalid = tx("invalid", 1, 10, 0);
        invalid.date = None;

        let issues = date_issues(&[future, tomorrow, old, edge, invalid], today());
        let kinds: Vec<(&str, IssueKind)> = issues
            .iter()
            .map(|i| (i.transaction_id.as_str(), i.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("future", IssueKind::FutureDate),
                ("old", IssueKind::OldDate),
                ("invalid", IssueKind::InvalidDate),
            ]
        );
    }

    #[test]
    fn balance_issue_kinds() {
        let txs = vec![tx("zero", 1, 0, 0), tx("both", 2, 10, 5), tx("ok", 3, 10, 0)];
        let issues = balance_issues(&txs);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::ZeroAmount);
        assert_eq!(issues[1].transaction_id, "both");
        assert_eq!(issues[1].kind.to_string(), "Transação com entrada e saída simultaneamente");
    }
}
