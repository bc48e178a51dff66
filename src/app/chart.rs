//! Chart of accounts edits that keep ledger classifications in step.

use crate::domain::accounts::AccountPath;
use crate::domain::model::AppData;
use crate::utils::error::Result;

/// Renames a chart node and relabels the transactions classified under it.
/// Returns how many transactions changed.
pub fn rename_account(data: &mut AppData, path: &str, new_name: &str) -> Result<usize> {
    let target = data.chart_of_accounts.rename(path, new_name)?;
    let new_name = new_name.trim();

    let mut relabelled = 0;
    for tx in &mut data.transactions {
        let slot = match &target {
            AccountPath::Category(l1) if tx.level1 == *l1 => &mut tx.level1,
            AccountPath::Subcategory(l1, l2) if tx.level1 == *l1 && tx.level2 == *l2 => {
                &mut tx.level2
            }
            AccountPath::Account(l1, l2, l3)
                if tx.level1 == *l1 && tx.level2 == *l2 && tx.level3 == *l3 =>
            {
                &mut tx.level3
            }
            _ => continue,
        };
        *slot = new_name.to_string();
        relabelled += 1;
    }

    tracing::info!(
        "Renamed {} to '{}' ({} transaction(s) relabelled)",
        target,
        new_name,
        relabelled
    );
    Ok(relabelled)
}

/// Removes a chart node. Transactions keep their labels and show up in
/// reports under the old name.
pub fn delete_account(data: &mut AppData, path: &str) -> Result<usize> {
    let target = data.chart_of_accounts.delete(path)?;
    let still_using = data
        .transactions
        .iter()
        .filter(|tx| match &target {
            AccountPath::Category(l1) => tx.level1 == *l1,
            AccountPath::Subcategory(l1, l2) => tx.level1 == *l1 && tx.level2 == *l2,
            AccountPath::Account(l1, l2, l3) => {
                tx.level1 == *l1 && tx.level2 == *l2 && tx.level3 == *l3
            }
        })
        .count();
    if still_using > 0 {
        tracing::warn!(
            "Deleted {} while {} transaction(s) still reference it",
            target,
            still_using
        );
    }
    Ok(still_using)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: &str = "2.0 CUSTOS E DESPESAS OPERACIONAIS|2.3 Despesas Administrativas";

    #[test]
    fn rename_subcategory_relabels_transactions() {
        let mut data = AppData::example();
        let changed = rename_account(&mut data, ADMIN, "2.3 Administrativas").unwrap();
        assert_eq!(changed, 3);
        assert!(data
            .chart_of_accounts
            .has_subcategory("2.0 CUSTOS E DESPESAS OPERACIONAIS", "2.3 Administrativas"));
        assert_eq!(data.find("example_4").unwrap().level2, "2.3 Administrativas");
        // level 3 labels stay
        assert_eq!(data.find("example_4").unwrap().level3, "2.3.1 Aluguel e Condomínio");
    }

    #[test]
    fn rename_account_leaf() {
        let mut data = AppData::example();
        let path = format!("{}|2.3.1 Aluguel e Condomínio", ADMIN);
        assert_eq!(rename_account(&mut data, &path, " 2.3.1 Aluguel ").unwrap(), 1);
        assert_eq!(data.find("example_4").unwrap().level3, "2.3.1 Aluguel");
    }

    #[test]
    fn failed_rename_leaves_ledger_alone() {
        let mut data = AppData::example();
        assert!(rename_account(&mut data, ADMIN, "").is_err());
        assert!(rename_account(&mut data, "9.0 NADA", "x").is_err());
        assert_eq!(
            data.find("example_4").unwrap().level2,
            "2.3 Despesas Administrativas"
        );
    }

    #[test]
    fn delete_reports_orphans() {
        let mut data = AppData::example();
        assert_eq!(delete_account(&mut data, "1.0 RECEITAS OPERACIONAIS").unwrap(), 1);
        assert!(!data.chart_of_accounts.has_category("1.0 RECEITAS OPERACIONAIS"));
        assert!(delete_account(&mut data, "1.0 RECEITAS OPERACIONAIS").is_err());
    }
}
