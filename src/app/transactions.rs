//! Listing, editing and deleting ledger entries.

use crate::domain::model::{columns, AppData, ReconciliationStatus, Transaction};
use crate::utils::error::{CfoError, Result};
use crate::utils::format::month_key;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ReconciliationStatus),
}

impl FromStr for StatusFilter {
    type Err = CfoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" | "todos" => Ok(StatusFilter::All),
            "pendente" | "pending" => Ok(StatusFilter::Only(ReconciliationStatus::Pending)),
            "conciliado" | "reconciled" => {
                Ok(StatusFilter::Only(ReconciliationStatus::Reconciled))
            }
            other => Err(CfoError::validation(format!("Unknown status filter: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub search: String,
    pub status: StatusFilter,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        let search = self.search.trim().to_lowercase();
        if !search.is_empty() {
            let hit = [&tx.description, &tx.payee, &tx.bank]
                .iter()
                .any(|field| field.to_lowercase().contains(&search));
            if !hit {
                return false;
            }
        }

        if let StatusFilter::Only(status) = self.status {
            if tx.status != status {
                return false;
            }
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = tx.date else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Date,
    /// Signed value: inflow, or negated outflow.
    Value,
    /// Any text column, by wire name.
    Text(&'static str),
}

const TEXT_COLUMNS: [&str; 11] = [
    columns::BANK,
    columns::DESCRIPTION,
    columns::PAYEE,
    columns::LEVEL1,
    columns::LEVEL2,
    columns::LEVEL3,
    columns::COST_CENTER,
    columns::STATUS,
    columns::NOTES,
    columns::CONTRACT_NOTE,
    columns::MONTH,
];

impl FromStr for SortKey {
    type Err = CfoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Data" | "data" | "date" => Ok(SortKey::Date),
            "value" | "valor" => Ok(SortKey::Value),
            other => TEXT_COLUMNS
                .iter()
                .copied()
                .find(|c| c.eq_ignore_ascii_case(other))
                .map(SortKey::Text)
                .ok_or_else(|| CfoError::validation(format!("Unknown sort column: {}", other))),
        }
    }
}

fn text_field<'a>(tx: &'a Transaction, column: &str) -> std::borrow::Cow<'a, str> {
    match column {
        columns::BANK => tx.bank.as_str().into(),
        columns::DESCRIPTION => tx.description.as_str().into(),
        columns::PAYEE => tx.payee.as_str().into(),
        columns::LEVEL1 => tx.level1.as_str().into(),
        columns::LEVEL2 => tx.level2.as_str().into(),
        columns::LEVEL3 => tx.level3.as_str().into(),
        columns::COST_CENTER => tx.cost_center.as_str().into(),
        columns::STATUS => tx.status.as_str().into(),
        columns::NOTES => tx.notes.as_str().into(),
        columns::CONTRACT_NOTE => tx.contract_note.as_str().into(),
        columns::MONTH => tx.month_key().unwrap_or_default().into(),
        _ => "".into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Date,
            descending: true,
        }
    }
}

impl SortSpec {
    fn compare(&self, a: &Transaction, b: &Transaction) -> Ordering {
        let ordering = match &self.key {
            SortKey::Date => a.date.cmp(&b.date),
            SortKey::Value => a.value().cmp(&b.value()),
            SortKey::Text(column) => text_field(a, column)
                .to_lowercase()
                .cmp(&text_field(b, column).to_lowercase()),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub per_page: usize,
}

/// 1-based pagination. An empty list still has one (empty) page.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Result<Page<T>> {
    if per_page == 0 {
        return Err(CfoError::validation("Items per page must be at least 1"));
    }
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    if page == 0 || page > total_pages {
        return Err(CfoError::validation(format!(
            "Page {} is out of range (1-{})",
            page, total_pages
        )));
    }

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    Ok(Page {
        items,
        page,
        total_pages,
        total_items,
        per_page,
    })
}

pub fn query<'a>(
    transactions: &'a [Transaction],
    filter: &TransactionFilter,
    sort: &SortSpec,
    page: usize,
    per_page: usize,
) -> Result<Page<&'a Transaction>> {
    let mut matching: Vec<&Transaction> = transactions.iter().filter(|t| filter.matches(t)).collect();
    matching.sort_by(|a, b| sort.compare(a, b));
    paginate(matching, page, per_page)
}

pub fn get<'a>(data: &'a AppData, id: &str) -> Result<&'a Transaction> {
    data.find(id)
        .ok_or_else(|| CfoError::not_found("transaction", id))
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct TransactionEdit {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub payee: Option<String>,
    pub bank: Option<String>,
    pub inflow: Option<Decimal>,
    pub outflow: Option<Decimal>,
    pub cost_center: Option<String>,
    pub contract_note: Option<String>,
    pub notes: Option<String>,
}

pub fn edit(data: &mut AppData, id: &str, changes: TransactionEdit) -> Result<()> {
    if let Some(description) = &changes.description {
        if description.trim().is_empty() {
            return Err(CfoError::validation("Description cannot be empty"));
        }
    }
    for amount in [changes.inflow, changes.outflow].into_iter().flatten() {
        if amount < Decimal::ZERO {
            return Err(CfoError::validation("Amounts cannot be negative"));
        }
    }

    let tx = data
        .find_mut(id)
        .ok_or_else(|| CfoError::not_found("transaction", id))?;

    if let Some(date) = changes.date {
        tx.date = Some(date);
        tx.month = month_key(date);
    }
    if let Some(description) = changes.description {
        tx.description = description.trim().to_string();
    }
    if let Some(payee) = changes.payee {
        tx.payee = payee;
    }
    if let Some(bank) = changes.bank {
        tx.bank = bank;
    }
    if let Some(inflow) = changes.inflow {
        tx.inflow = inflow;
    }
    if let Some(outflow) = changes.outflow {
        tx.outflow = outflow;
    }
    if let Some(cost_center) = changes.cost_center {
        tx.cost_center = cost_center;
    }
    if let Some(contract_note) = changes.contract_note {
        tx.contract_note = contract_note;
    }
    if let Some(notes) = changes.notes {
        tx.notes = notes;
    }

    tracing::info!("Transaction {} updated", id);
    Ok(())
}

pub fn delete(data: &mut AppData, id: &str) -> Result<Transaction> {
    let index = data
        .transactions
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| CfoError::not_found("transaction", id))?;
    let removed = data.transactions.remove(index);
    tracing::info!("Transaction {} deleted", id);
    Ok(removed)
}
