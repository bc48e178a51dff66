//! Reconciliation: classify pending transactions against the chart of accounts.

use crate::domain::accounts::ChartOfAccounts;
use crate::domain::model::{AppData, ReconciliationStatus, Transaction};
use crate::utils::error::{CfoError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub level1: String,
    pub level2: String,
    pub level3: String,
}

impl Classification {
    fn new(level1: &str, level2: &str, level3: &str) -> Self {
        Self {
            level1: level1.to_string(),
            level2: level2.to_string(),
            level3: level3.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileForm {
    pub classification: Classification,
    pub cost_center: String,
    pub contract_note: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastClassification {
    pub classification: Classification,
    pub cost_center: String,
}

/// Pending transaction ids in ledger order; skipped entries go to the back.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationQueue {
    ids: VecDeque<String>,
}

impl ReconciliationQueue {
    pub fn new(transactions: &[Transaction]) -> Self {
        Self {
            ids: transactions
                .iter()
                .filter(|t| !t.is_reconciled())
                .map(|t| t.id.clone())
                .collect(),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.ids.front().map(String::as_str)
    }

    pub fn skip(&mut self, id: &str) -> bool {
        match self.ids.iter().position(|i| i == id) {
            Some(index) => {
                if let Some(skipped) = self.ids.remove(index) {
                    self.ids.push_back(skipped);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.retain(|i| i != id);
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub fn pending_queue(transactions: &[Transaction]) -> Vec<&Transaction> {
    transactions.iter().filter(|t| !t.is_reconciled()).collect()
}

fn validate_classification(chart: &ChartOfAccounts, c: &Classification) -> Result<()> {
    if c.level1.trim().is_empty() {
        return Err(CfoError::validation("Select at least the level 1 classification"));
    }
    if !c.level2.is_empty()
        && chart.has_category(&c.level1)
        && !chart.subcategories(&c.level1).contains(&c.level2.as_str())
    {
        return Err(CfoError::validation(format!(
            "'{}' is not a subcategory of '{}'",
            c.level2, c.level1
        )));
    }
    if !c.level3.is_empty()
        && chart.has_subcategory(&c.level1, &c.level2)
        && !chart.accounts(&c.level1, &c.level2).contains(&c.level3)
    {
        return Err(CfoError::validation(format!(
            "'{}' is not an account of '{}'",
            c.level3, c.level2
        )));
    }
    Ok(())
}

pub fn reconcile(data: &mut AppData, id: &str, form: ReconcileForm) -> Result<()> {
    validate_classification(&data.chart_of_accounts, &form.classification)?;

    let tx = data
        .find_mut(id)
        .ok_or_else(|| CfoError::not_found("transaction", id))?;
    tx.level1 = form.classification.level1;
    tx.level2 = form.classification.level2;
    tx.level3 = form.classification.level3;
    tx.cost_center = form.cost_center;
    tx.contract_note = form.contract_note;
    tx.notes = form.notes;
    tx.status = ReconciliationStatus::Reconciled;

    tracing::info!("Transaction {} reconciled", id);
    Ok(())
}

const INCOME_RULES: &[(&[&str], (&str, &str, &str))] = &[
    (
        &["serviço", "consultoria", "projeto"],
        (
            "1.0 RECEITAS OPERACIONAIS",
            "1.1 Receita de Vendas/Serviços",
            "1.1.2 Prestação de Serviços",
        ),
    ),
    (
        &["venda", "produto"],
        (
            "1.0 RECEITAS OPERACIONAIS",
            "1.1 Receita de Vendas/Serviços",
            "1.1.1 Venda de Produtos",
        ),
    ),
    (
        &["juros", "rendimento"],
        (
            "3.0 RESULTADO FINANCEIRO",
            "3.1 Receitas Financeiras",
            "3.1.1 Rendimentos de Aplicações",
        ),
    ),
];

const EXPENSE_RULES: &[(&[&str], (&str, &str, &str))] = &[
    (
        &["aluguel", "condomínio"],
        (
            "2.0 CUSTOS E DESPESAS OPERACIONAIS",
            "2.3 Despesas Administrativas",
            "2.3.1 Aluguel e Condomínio",
        ),
    ),
    (
        &["salário", "pagamento funcionário"],
        (
            "2.0 CUSTOS E DESPESAS OPERACIONAIS",
            "2.2 Despesas com Pessoal",
            "2.2.1 Salários e Ordenados",
        ),
    ),
    (
        &["material", "papelaria", "escritório"],
        (
            "2.0 CUSTOS E DESPESAS OPERACIONAIS",
            "2.3 Despesas Administrativas",
            "2.3.3 Materiais de Escritório",
        ),
    ),
    (
        &["internet", "telefone", "comunicação"],
        (
            "2.0 CUSTOS E DESPESAS OPERACIONAIS",
            "2.3 Despesas Administrativas",
            "2.3.4 Comunicação e Internet",
        ),
    ),
    (
        &["marketing", "publicidade", "propaganda"],
        (
            "2.0 CUSTOS E DESPESAS OPERACIONAIS",
            "2.4 Despesas Comerciais",
            "2.4.1 Marketing e Publicidade",
        ),
    ),
];

/// Keyword rules over the lowercased description. Income and expense rules
/// are chosen by whether the transaction has an inflow.
pub fn suggest_classification(tx: &Transaction) -> Option<Classification> {
    let description = tx.description.to_lowercase();
    let rules = if tx.inflow > Decimal::ZERO {
        INCOME_RULES
    } else {
        EXPENSE_RULES
    };

    rules
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| description.contains(k)))
        .map(|(_, (l1, l2, l3))| Classification::new(l1, l2, l3))
}

/// Classification and cost centre of the last reconciled transaction.
pub fn last_classification(transactions: &[Transaction]) -> Option<LastClassification> {
    transactions
        .iter()
        .rev()
        .find(|t| t.is_reconciled() && t.is_classified())
        .map(|t| LastClassification {
            classification: Classification::new(&t.level1, &t.level2, &t.level3),
            cost_center: t.cost_center.clone(),
        })
}

/// Options for a cascading select: level 1 takes no parents, level 2 takes
/// the category, level 3 takes category and subcategory.
pub fn classification_options(
    chart: &ChartOfAccounts,
    level: u8,
    parents: &[&str],
) -> Result<Vec<String>> {
    let options: Vec<String> = match (level, parents) {
        (1, []) => chart.categories().into_iter().map(str::to_string).collect(),
        (2, [l1]) => chart.subcategories(l1).into_iter().map(str::to_string).collect(),
        (3, [l1, l2]) => chart.accounts(l1, l2).to_vec(),
        _ => {
            return Err(CfoError::validation(format!(
                "Level {} needs {} parent(s)",
                level,
                level.saturating_sub(1)
            )))
        }
    };
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(l1: &str, l2: &str, l3: &str) -> ReconcileForm {
        ReconcileForm {
            classification: Classification::new(l1, l2, l3),
            cost_center: "4GOTECH".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn queue_holds_pending_in_order() {
        let mut data = AppData::example();
        data.transactions[0].status = ReconciliationStatus::Pending;
        let mut queue = ReconciliationQueue::new(&data.transactions);
        assert_eq!(queue.current(), Some("example_1"));
        assert_eq!(queue.len(), 2);

        assert!(queue.skip("example_1"));
        assert_eq!(queue.current(), Some("example_5"));
        assert_eq!(queue.ids().last(), Some("example_1"));
        assert!(!queue.skip("missing"));

        queue.remove("example_5");
        assert_eq!(queue.current(), Some("example_1"));
        assert_eq!(pending_queue(&data.transactions).len(), 2);
    }

    #[test]
    fn reconcile_requires_level1() {
        let mut data = AppData::example();
        let err = reconcile(&mut data, "example_5", form("", "", "")).unwrap_err();
        assert!(matches!(err, CfoError::ValidationError { .. }));
    }

    #[test]
    fn reconcile_checks_chart_membership() {
        let mut data = AppData::example();
        let bad = form(
            "2.0 CUSTOS E DESPESAS OPERACIONAIS",
            "1.1 Receita de Vendas/Serviços",
            "",
        );
        assert!(reconcile(&mut data, "example_5", bad).is_err());

        let good = form(
            "2.0 CUSTOS E DESPESAS OPERACIONAIS",
            "2.3 Despesas Administrativas",
            "2.3.4 Comunicação e Internet",
        );
        reconcile(&mut data, "example_5", good).unwrap();
        let tx = data.find("example_5").unwrap();
        assert!(tx.is_reconciled());
        assert_eq!(tx.level3, "2.3.4 Comunicação e Internet");
        assert_eq!(tx.cost_center, "4GOTECH");
    }

    #[test]
    fn unknown_category_is_accepted_as_free_text() {
        let mut data = AppData::example();
        reconcile(&mut data, "example_5", form("9.0 OUTROS", "9.1 Livre", "")).unwrap();
    }

    #[test]
    fn suggestions_follow_keyword_rules() {
        let income = Transaction {
            description: "Prestação de Serviço mensal".to_string(),
            inflow: Decimal::from(100),
            ..Default::default()
        };
        assert_eq!(
            suggest_classification(&income).unwrap().level3,
            "1.1.2 Prestação de Serviços"
        );

        let rent = Transaction {
            description: "ALUGUEL sala".to_string(),
            outflow: Decimal::from(100),
            ..Default::default()
        };
        assert_eq!(
            suggest_classification(&rent).unwrap().level3,
            "2.3.1 Aluguel e Condomínio"
        );

        let ads = Transaction {
            description: "Campanha de publicidade".to_string(),
            outflow: Decimal::from(100),
            ..Default::default()
        };
        assert_eq!(
            suggest_classification(&ads).unwrap().level2,
            "2.4 Despesas Comerciais"
        );

        let unknown = Transaction {
            description: "TED recebida".to_string(),
            inflow: Decimal::from(1),
            ..Default::default()
        };
        assert!(suggest_classification(&unknown).is_none());
    }

    #[test]
    fn last_classification_is_latest_reconciled() {
        let data = AppData::example();
        let last = last_classification(&data.transactions).unwrap();
        assert_eq!(last.classification.level3, "2.3.1 Aluguel e Condomínio");
        assert_eq!(last.cost_center, "4GOTECH");
    }

    #[test]
    fn cascading_options() {
        let chart = ChartOfAccounts::default();
        assert_eq!(classification_options(&chart, 1, &[]).unwrap().len(), 4);
        assert_eq!(
            classification_options(&chart, 2, &["3.0 RESULTADO FINANCEIRO"]).unwrap(),
            vec!["3.1 Receitas Financeiras", "3.2 Despesas Financeiras"]
        );
        assert_eq!(
            classification_options(
                &chart,
                3,
                &["3.0 RESULTADO FINANCEIRO", "3.2 Despesas Financeiras"]
            )
            .unwrap()
            .len(),
            4
        );
        assert!(classification_options(&chart, 3, &["x"]).is_err());
    }
}
