//! Projected cash flow from monthly history.

use crate::app::dashboard::{monthly_series, MonthlyPoint};
use crate::domain::model::Transaction;
use crate::utils::error::{CfoError, Result};
use crate::utils::format::{month_key, month_label, parse_month_key};
use chrono::{Datelike, Months};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

pub const MIN_HISTORY_MONTHS: usize = 2;
pub const DEFAULT_HORIZON: u32 = 6;
pub const MAX_HORIZON: u32 = 24;
const AVERAGE_WINDOW: usize = 6;
const TREND_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMethod {
    #[default]
    Average,
    Trend,
    Seasonal,
}

impl FromStr for ProjectionMethod {
    type Err = CfoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "average" | "media" | "média" => Ok(ProjectionMethod::Average),
            "trend" | "tendencia" | "tendência" => Ok(ProjectionMethod::Trend),
            "seasonal" | "sazonal" => Ok(ProjectionMethod::Seasonal),
            other => Err(CfoError::validation(format!(
                "Unknown projection method '{}'. Use average, trend or seasonal",
                other
            ))),
        }
    }
}

impl ProjectionMethod {
    /// Confidence decays per step down to a floor; kept in hundredths.
    fn confidence(self, step: u32) -> f64 {
        let i = i64::from(step);
        let hundredths = match self {
            ProjectionMethod::Average => (85 - 8 * i).max(50),
            ProjectionMethod::Trend => (90 - 10 * i).max(30),
            ProjectionMethod::Seasonal => (80 - 5 * i).max(40),
        };
        hundredths as f64 / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub month: String,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub result: Decimal,
    pub accumulated: Decimal,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAlert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Pair {
    revenue: Decimal,
    expenses: Decimal,
}

fn mean(points: &[&MonthlyPoint]) -> Pair {
    if points.is_empty() {
        return Pair::default();
    }
    let n = Decimal::from(points.len());
    Pair {
        revenue: points.iter().map(|p| p.revenue).sum::<Decimal>() / n,
        expenses: points.iter().map(|p| p.expenses).sum::<Decimal>() / n,
    }
}

fn last_n(history: &[MonthlyPoint], n: usize) -> Vec<&MonthlyPoint> {
    history[history.len().saturating_sub(n)..].iter().collect()
}

fn first_n(history: &[MonthlyPoint], n: usize) -> Vec<&MonthlyPoint> {
    history.iter().take(n).collect()
}

/// Projects `horizon` months past the last month of history, capped at
/// [`MAX_HORIZON`]. History with fewer than two months yields nothing.
pub fn project(
    history: &[MonthlyPoint],
    horizon: u32,
    method: ProjectionMethod,
) -> Vec<Projection> {
    if history.len() < MIN_HISTORY_MONTHS {
        return Vec::new();
    }
    let Some(last_month) = history.last().and_then(|p| parse_month_key(&p.month)) else {
        return Vec::new();
    };

    let average = mean(&last_n(history, AVERAGE_WINDOW));
    let recent = mean(&last_n(history, TREND_WINDOW));
    let old = mean(&first_n(history, TREND_WINDOW));
    let window = Decimal::from(TREND_WINDOW);
    let slope = Pair {
        revenue: (recent.revenue - old.revenue) / window,
        expenses: (recent.expenses - old.expenses) / window,
    };

    let mut accumulated = Decimal::ZERO;
    let mut projections = Vec::new();
    for step in 1..=horizon.min(MAX_HORIZON) {
        let Some(target) = last_month.checked_add_months(Months::new(step)) else {
            break;
        };

        let estimate = match method {
            ProjectionMethod::Average => average,
            ProjectionMethod::Trend => {
                let i = Decimal::from(step);
                Pair {
                    revenue: slope.revenue * i + recent.revenue,
                    expenses: slope.expenses * i + recent.expenses,
                }
            }
            ProjectionMethod::Seasonal => {
                let same_month: Vec<&MonthlyPoint> = history
                    .iter()
                    .filter(|p| {
                        parse_month_key(&p.month).is_some_and(|d| d.month() == target.month())
                    })
                    .collect();
                if same_month.is_empty() {
                    average
                } else {
                    mean(&same_month)
                }
            }
        };

        let revenue = estimate.revenue.max(Decimal::ZERO).round_dp(2);
        let expenses = estimate.expenses.max(Decimal::ZERO).round_dp(2);
        let result = revenue - expenses;
        accumulated += result;

        projections.push(Projection {
            month: month_key(target),
            revenue,
            expenses,
            result,
            accumulated,
            confidence: method.confidence(step),
        });
    }

    tracing::debug!(
        "Projected {} month(s) with {:?} from {} month(s) of history",
        projections.len(),
        method,
        history.len()
    );
    projections
}

pub fn project_transactions(
    transactions: &[Transaction],
    horizon: u32,
    method: ProjectionMethod,
) -> Vec<Projection> {
    project(&monthly_series(transactions), horizon, method)
}

pub fn risk_alerts(projections: &[Projection]) -> Vec<RiskAlert> {
    let mut alerts = Vec::new();
    if projections.is_empty() {
        return alerts;
    }

    for projection in projections.iter().take(3) {
        if projection.accumulated < Decimal::ZERO {
            let label = parse_month_key(&projection.month)
                .map(month_label)
                .unwrap_or_else(|| projection.month.clone());
            alerts.push(RiskAlert {
                level: AlertLevel::Error,
                title: "Risco de Saldo Negativo".to_string(),
                message: format!("Saldo projetado negativo em {}", label),
            });
        }
    }

    let negative = projections
        .iter()
        .filter(|p| p.result < Decimal::ZERO)
        .count();
    if negative * 2 >= projections.len() {
        alerts.push(RiskAlert {
            level: AlertLevel::Warning,
            title: "Tendência Preocupante".to_string(),
            message: "Mais da metade dos meses projetados apresentam resultado negativo"
                .to_string(),
        });
    }

    let low_confidence = projections.iter().filter(|p| p.confidence < 0.5).count();
    if low_confidence > 0 {
        alerts.push(RiskAlert {
            level: AlertLevel::Info,
            title: "Baixa Confiança nas Projeções".to_string(),
            message: format!(
                "{} mês(es) com baixa confiança. Considere mais dados históricos.",
                low_confidence
            ),
        });
    }

    alerts
}
