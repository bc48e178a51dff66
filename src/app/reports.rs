//! Income statement (DRE), monthly cash flow and balance by account.

use crate::app::dashboard::{monthly_series, UNCLASSIFIED_LABEL};
use crate::domain::model::Transaction;
use crate::utils::error::{CfoError, Result};
use crate::utils::format::{amount_str, format_percent, month_label};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    All,
    CurrentMonth,
    LastMonth,
    CurrentYear,
    Custom { from: NaiveDate, to: NaiveDate },
}

impl FromStr for ReportPeriod {
    type Err = CfoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "all" => Ok(ReportPeriod::All),
            "current-month" => Ok(ReportPeriod::CurrentMonth),
            "last-month" => Ok(ReportPeriod::LastMonth),
            "current-year" => Ok(ReportPeriod::CurrentYear),
            other => Err(CfoError::validation(format!(
                "Unknown period '{}'. Use all, current-month, last-month or current-year",
                other
            ))),
        }
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

impl ReportPeriod {
    pub fn custom(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(CfoError::validation("The start date must not be after the end date"));
        }
        Ok(ReportPeriod::Custom { from, to })
    }

    /// Inclusive date range relative to `today`; `None` for all time.
    pub fn range(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            ReportPeriod::All => None,
            ReportPeriod::CurrentMonth => Some((month_start(today), month_end(today))),
            ReportPeriod::LastMonth => {
                let last = month_start(today).pred_opt().unwrap_or(today);
                Some((month_start(last), month_end(last)))
            }
            ReportPeriod::CurrentYear => Some((
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
            )),
            ReportPeriod::Custom { from, to } => Some((from, to)),
        }
    }

    pub fn label(&self, today: NaiveDate) -> String {
        match *self {
            ReportPeriod::All => "Todo o período".to_string(),
            ReportPeriod::CurrentMonth => month_label(today),
            ReportPeriod::LastMonth => month_label(month_start(today).pred_opt().unwrap_or(today)),
            ReportPeriod::CurrentYear => today.year().to_string(),
            ReportPeriod::Custom { from, to } => format!(
                "{} a {}",
                from.format("%d/%m/%Y"),
                to.format("%d/%m/%Y")
            ),
        }
    }

    pub fn select<'a>(&self, transactions: &'a [Transaction], today: NaiveDate) -> Vec<&'a Transaction> {
        match self.range(today) {
            None => transactions.iter().collect(),
            Some((from, to)) => transactions
                .iter()
                .filter(|t| t.date.is_some_and(|d| d >= from && d <= to))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DreReport {
    pub period: String,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub financial_result: Decimal,
    pub operational_result: Decimal,
    pub net_result: Decimal,
    pub revenue_by_category: BTreeMap<String, Decimal>,
    pub expenses_by_category: BTreeMap<String, Decimal>,
    pub operational_margin: Decimal,
    pub net_margin: Decimal,
}

fn margin(value: Decimal, revenue: Decimal) -> Decimal {
    if revenue > Decimal::ZERO {
        value / revenue
    } else {
        Decimal::ZERO
    }
}

/// Income statement over reconciled transactions, grouped by the level 1
/// code of their classification.
pub fn dre(transactions: &[Transaction], period: ReportPeriod, today: NaiveDate) -> DreReport {
    let mut total_revenue = Decimal::ZERO;
    let mut total_expenses = Decimal::ZERO;
    let mut financial_result = Decimal::ZERO;
    let mut revenue_by_category = BTreeMap::new();
    let mut expenses_by_category = BTreeMap::new();

    for tx in period
        .select(transactions, today)
        .into_iter()
        .filter(|t| t.is_reconciled())
    {
        let level1 = if tx.level1.is_empty() {
            UNCLASSIFIED_LABEL
        } else {
            tx.level1.as_str()
        };
        let category = if tx.level2.is_empty() {
            level1.to_string()
        } else {
            tx.level2.clone()
        };

        if level1.contains("RECEITAS OPERACIONAIS") || level1.contains("1.0") {
            total_revenue += tx.inflow;
            *revenue_by_category.entry(category).or_insert(Decimal::ZERO) += tx.inflow;
        } else if level1.contains("CUSTOS E DESPESAS OPERACIONAIS") || level1.contains("2.0") {
            total_expenses += tx.outflow;
            *expenses_by_category.entry(category).or_insert(Decimal::ZERO) += tx.outflow;
        } else if level1.contains("RESULTADO FINANCEIRO") || level1.contains("3.0") {
            financial_result += tx.inflow - tx.outflow;
        }
    }

    let operational_result = total_revenue - total_expenses;
    let net_result = operational_result + financial_result;

    DreReport {
        period: period.label(today),
        total_revenue,
        total_expenses,
        financial_result,
        operational_result,
        net_result,
        revenue_by_category,
        expenses_by_category,
        operational_margin: margin(operational_result, total_revenue),
        net_margin: margin(net_result, total_revenue),
    }
}

fn write_rows<I, R>(rows: I) -> Result<String>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CfoError::processing(format!("failed to flush report rows: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| CfoError::processing(format!("report rows are not UTF-8: {}", e)))
}

pub fn dre_csv(report: &DreReport) -> Result<String> {
    let revenue = report.total_revenue;
    let line = |label: &str, value: String, share: Decimal| {
        vec![
            label.to_string(),
            value,
            format!("{}%", format_percent(share, revenue)),
        ]
    };

    write_rows([
        vec![
            "Conta".to_string(),
            "Valor (R$)".to_string(),
            "Percentual".to_string(),
        ],
        line("RECEITAS OPERACIONAIS", amount_str(revenue), revenue),
        line(
            "(-) CUSTOS E DESPESAS OPERACIONAIS",
            format!("-{}", amount_str(report.total_expenses)),
            report.total_expenses,
        ),
        line(
            "RESULTADO OPERACIONAL",
            amount_str(report.operational_result),
            report.operational_result,
        ),
        line(
            "RESULTADO FINANCEIRO",
            amount_str(report.financial_result),
            report.financial_result,
        ),
        line(
            "RESULTADO LÍQUIDO DO PERÍODO",
            amount_str(report.net_result),
            report.net_result,
        ),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashflowMonth {
    pub month: String,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub result: Decimal,
    pub accumulated: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashflowReport {
    pub period: String,
    pub months: Vec<CashflowMonth>,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub net_result: Decimal,
    pub average_monthly: Decimal,
}

pub fn cashflow(transactions: &[Transaction], period: ReportPeriod, today: NaiveDate) -> CashflowReport {
    let selected: Vec<Transaction> = period
        .select(transactions, today)
        .into_iter()
        .cloned()
        .collect();

    let mut accumulated = Decimal::ZERO;
    let months: Vec<CashflowMonth> = monthly_series(&selected)
        .into_iter()
        .map(|point| {
            accumulated += point.net;
            CashflowMonth {
                month: point.month,
                revenue: point.revenue,
                expenses: point.expenses,
                result: point.net,
                accumulated,
            }
        })
        .collect();

    let total_revenue: Decimal = months.iter().map(|m| m.revenue).sum();
    let total_expenses: Decimal = months.iter().map(|m| m.expenses).sum();
    let net_result = total_revenue - total_expenses;
    let average_monthly = if months.is_empty() {
        Decimal::ZERO
    } else {
        net_result / Decimal::from(months.len())
    };

    CashflowReport {
        period: period.label(today),
        months,
        total_revenue,
        total_expenses,
        net_result,
        average_monthly,
    }
}

pub fn cashflow_csv(report: &CashflowReport) -> Result<String> {
    let header = ["Mês", "Receitas", "Despesas", "Resultado", "Saldo Acumulado"]
        .map(str::to_string)
        .to_vec();
    let rows = report.months.iter().map(|month| {
        vec![
            month.month.clone(),
            amount_str(month.revenue),
            amount_str(month.expenses),
            amount_str(month.result),
            amount_str(month.accumulated),
        ]
    });
    write_rows(std::iter::once(header).chain(rows))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceLine {
    pub level1: String,
    pub level2: String,
    pub level3: String,
    pub inflow: Decimal,
    pub outflow: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub period: String,
    pub lines: Vec<BalanceLine>,
    pub total_inflow: Decimal,
    pub total_outflow: Decimal,
    pub net: Decimal,
}

/// Trial balance: totals per level1 › level2 › level3 path.
pub fn balance(transactions: &[Transaction], period: ReportPeriod, today: NaiveDate) -> BalanceReport {
    let mut totals: BTreeMap<(String, String, String), (Decimal, Decimal)> = BTreeMap::new();
    for tx in period.select(transactions, today) {
        let level1 = if tx.is_classified() {
            tx.level1.clone()
        } else {
            UNCLASSIFIED_LABEL.to_string()
        };
        let entry = totals
            .entry((level1, tx.level2.clone(), tx.level3.clone()))
            .or_default();
        entry.0 += tx.inflow;
        entry.1 += tx.outflow;
    }

    let lines: Vec<BalanceLine> = totals
        .into_iter()
        .map(|((level1, level2, level3), (inflow, outflow))| BalanceLine {
            level1,
            level2,
            level3,
            inflow,
            outflow,
            net: inflow - outflow,
        })
        .collect();
    let total_inflow: Decimal = lines.iter().map(|l| l.inflow).sum();
    let total_outflow: Decimal = lines.iter().map(|l| l.outflow).sum();

    BalanceReport {
        period: period.label(today),
        lines,
        total_inflow,
        total_outflow,
        net: total_inflow - total_outflow,
    }
}

pub fn balance_csv(report: &BalanceReport) -> Result<String> {
    let mut rows: Vec<Vec<String>> = vec![["Nível 1", "Nível 2", "Nível 3", "Entradas", "Saídas", "Saldo"]
        .map(str::to_string)
        .to_vec()];
    for line in &report.lines {
        rows.push(vec![
            line.level1.clone(),
            line.level2.clone(),
            line.level3.clone(),
            amount_str(line.inflow),
            amount_str(line.outflow),
            amount_str(line.net),
        ]);
    }
    rows.push(vec![
        "TOTAL".to_string(),
        String::new(),
        String::new(),
        amount_str(report.total_inflow),
        amount_str(report.total_outflow),
        amount_str(report.net),
    ]);
    write_rows(rows)
}
