//! Headline figures for the dashboard view.

use crate::domain::model::Transaction;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

pub const UNCLASSIFIED_LABEL: &str = "Não Classificado";
pub const KPI_CACHE_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub net_result: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PendingSummary {
    pub pending: usize,
    pub unclassified: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodInfo {
    pub first: NaiveDate,
    pub last: NaiveDate,
    /// Inclusive of both ends.
    pub days: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Performance {
    pub average_inflow: Decimal,
    pub max_inflow: Decimal,
    pub max_outflow: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub kpis: Kpis,
    pub pending: PendingSummary,
    pub period: Option<PeriodInfo>,
    pub performance: Performance,
    pub monthly: Vec<MonthlyPoint>,
    pub categories: Vec<CategoryTotal>,
}

pub fn kpis(transactions: &[Transaction]) -> Kpis {
    let total_revenue: Decimal = transactions.iter().map(|t| t.inflow).sum();
    let total_expenses: Decimal = transactions.iter().map(|t| t.outflow).sum();
    Kpis {
        total_revenue,
        total_expenses,
        net_result: total_revenue - total_expenses,
        transaction_count: transactions.len(),
    }
}

pub fn pending_summary(transactions: &[Transaction]) -> PendingSummary {
    PendingSummary {
        pending: transactions.iter().filter(|t| !t.is_reconciled()).count(),
        unclassified: transactions.iter().filter(|t| !t.is_classified()).count(),
    }
}

pub fn period_info(transactions: &[Transaction]) -> Option<PeriodInfo> {
    let first = transactions.iter().filter_map(|t| t.date).min()?;
    let last = transactions.iter().filter_map(|t| t.date).max()?;
    Some(PeriodInfo {
        first,
        last,
        days: (last - first).num_days() + 1,
    })
}

pub fn performance(transactions: &[Transaction]) -> Performance {
    let inflows: Vec<Decimal> = transactions
        .iter()
        .map(|t| t.inflow)
        .filter(|v| *v > Decimal::ZERO)
        .collect();
    let average_inflow = if inflows.is_empty() {
        Decimal::ZERO
    } else {
        inflows.iter().sum::<Decimal>() / Decimal::from(inflows.len())
    };

    Performance {
        average_inflow,
        max_inflow: inflows.iter().copied().max().unwrap_or_default(),
        max_outflow: transactions
            .iter()
            .map(|t| t.outflow)
            .max()
            .unwrap_or_default(),
    }
}

/// Revenue, expenses and net per `YYYY-MM`, oldest first.
pub fn monthly_series(transactions: &[Transaction]) -> Vec<MonthlyPoint> {
    let mut months: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for tx in transactions {
        if let Some(month) = tx.month_key() {
            let entry = months.entry(month).or_default();
            entry.0 += tx.inflow;
            entry.1 += tx.outflow;
        }
    }
    months
        .into_iter()
        .map(|(month, (revenue, expenses))| MonthlyPoint {
            month,
            revenue,
            expenses,
            net: revenue - expenses,
        })
        .collect()
}

/// Expenses grouped by level 1, largest first.
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut totals: HashMap<String, Decimal> = HashMap::new();
    for tx in transactions.iter().filter(|t| t.outflow > Decimal::ZERO) {
        let category = if tx.is_classified() {
            tx.level1.clone()
        } else {
            UNCLASSIFIED_LABEL.to_string()
        };
        *totals.entry(category).or_default() += tx.outflow;
    }

    let mut breakdown: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, amount)| CategoryTotal { category, amount })
        .collect();
    breakdown.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
    breakdown
}

pub fn summary(transactions: &[Transaction]) -> DashboardSummary {
    summary_with_kpis(transactions, kpis(transactions))
}

/// Like [`summary`], reusing KPIs already computed (e.g. from a [`KpiCache`]).
pub fn summary_with_kpis(transactions: &[Transaction], kpis: Kpis) -> DashboardSummary {
    DashboardSummary {
        kpis,
        pending: pending_summary(transactions),
        period: period_info(transactions),
        performance: performance(transactions),
        monthly: monthly_series(transactions),
        categories: category_breakdown(transactions),
    }
}

/// KPIs memoised per store revision for a short time.
#[derive(Debug)]
pub struct KpiCache {
    ttl: Duration,
    entry: Option<(u64, Instant, Kpis)>,
}

impl Default for KpiCache {
    fn default() -> Self {
        Self::new(KPI_CACHE_TTL)
    }
}

impl KpiCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn get_or_compute(&mut self, revision: u64, transactions: &[Transaction]) -> Kpis {
        if let Some((cached_revision, at, kpis)) = self.entry {
            if cached_revision == revision && at.elapsed() < self.ttl {
                return kpis;
            }
        }
        let fresh = kpis(transactions);
        self.entry = Some((revision, Instant::now(), fresh));
        fresh
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Store revision of the cached KPIs, if any.
    pub fn cached_revision(&self) -> Option<u64> {
        self.entry.map(|(revision, _, _)| revision)
    }
}
