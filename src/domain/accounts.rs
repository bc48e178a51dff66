//! Three-level chart of accounts: category → subcategory → accounts.

use crate::utils::error::{CfoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node in the chart addressed as `l1`, `l1|l2` or `l1|l2|l3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountPath {
    Category(String),
    Subcategory(String, String),
    Account(String, String, String),
}

impl AccountPath {
    pub fn parse(path: &str) -> Result<Self> {
        let parts: Vec<&str> = path.split('|').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CfoError::validation(format!("Invalid account path: '{}'", path)));
        }
        match parts.as_slice() {
            [l1] => Ok(AccountPath::Category(l1.to_string())),
            [l1, l2] => Ok(AccountPath::Subcategory(l1.to_string(), l2.to_string())),
            [l1, l2, l3] => Ok(AccountPath::Account(
                l1.to_string(),
                l2.to_string(),
                l3.to_string(),
            )),
            _ => Err(CfoError::validation(format!(
                "Account paths have at most three levels: '{}'",
                path
            ))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AccountPath::Category(name)
            | AccountPath::Subcategory(_, name)
            | AccountPath::Account(_, _, name) => name,
        }
    }
}

impl std::fmt::Display for AccountPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountPath::Category(l1) => write!(f, "{}", l1),
            AccountPath::Subcategory(l1, l2) => write!(f, "{}|{}", l1, l2),
            AccountPath::Account(l1, l2, l3) => write!(f, "{}|{}|{}", l1, l2, l3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartOfAccounts(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl Default for ChartOfAccounts {
    fn default() -> Self {
        serde_json::from_str(include_str!("fixtures/default_chart.json"))
            .expect("bundled chart of accounts is valid")
    }
}

fn required_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CfoError::validation("Account name cannot be empty"));
    }
    if trimmed.contains('|') {
        return Err(CfoError::validation("Account names cannot contain '|'"));
    }
    Ok(trimmed.to_string())
}

impl ChartOfAccounts {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn categories(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn subcategories(&self, category: &str) -> Vec<&str> {
        self.0
            .get(category)
            .map(|subs| subs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn accounts(&self, category: &str, subcategory: &str) -> &[String] {
        self.0
            .get(category)
            .and_then(|subs| subs.get(subcategory))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.0.contains_key(category)
    }

    pub fn has_subcategory(&self, category: &str, subcategory: &str) -> bool {
        self.0
            .get(category)
            .is_some_and(|subs| subs.contains_key(subcategory))
    }

    /// Number of leaf accounts.
    pub fn account_count(&self) -> usize {
        self.0.values().flat_map(|subs| subs.values()).map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Vec<String>>)> {
        self.0.iter()
    }

    pub fn add_category(&mut self, name: &str) -> Result<()> {
        let name = required_name(name)?;
        if self.0.contains_key(&name) {
            return Err(CfoError::validation(format!("Category already exists: {}", name)));
        }
        self.0.insert(name, BTreeMap::new());
        Ok(())
    }

    pub fn add_subcategory(&mut self, category: &str, name: &str) -> Result<()> {
        let name = required_name(name)?;
        let subs = self
            .0
            .get_mut(category)
            .ok_or_else(|| CfoError::not_found("category", category))?;
        if subs.contains_key(&name) {
            return Err(CfoError::validation(format!("Subcategory already exists: {}", name)));
        }
        subs.insert(name, Vec::new());
        Ok(())
    }

    pub fn add_account(&mut self, category: &str, subcategory: &str, name: &str) -> Result<()> {
        let name = required_name(name)?;
        let accounts = self
            .0
            .get_mut(category)
            .ok_or_else(|| CfoError::not_found("category", category))?
            .get_mut(subcategory)
            .ok_or_else(|| CfoError::not_found("subcategory", subcategory))?;
        if accounts.contains(&name) {
            return Err(CfoError::validation(format!("Account already exists: {}", name)));
        }
        accounts.push(name);
        Ok(())
    }

    /// Renames the node at `path`. Returns the parsed path of the old node.
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<AccountPath> {
        let target = AccountPath::parse(path)?;
        let new_name = required_name(new_name)?;
        if new_name == target.name() {
            return Err(CfoError::validation("The new name is the same as the current one"));
        }

        match &target {
            AccountPath::Category(l1) => {
                if self.0.contains_key(&new_name) {
                    return Err(CfoError::validation(format!(
                        "Category already exists: {}",
                        new_name
                    )));
                }
                let subs = self
                    .0
                    .remove(l1)
                    .ok_or_else(|| CfoError::not_found("category", l1.as_str()))?;
                self.0.insert(new_name, subs);
            }
            AccountPath::Subcategory(l1, l2) => {
                let subs = self
                    .0
                    .get_mut(l1)
                    .ok_or_else(|| CfoError::not_found("category", l1.as_str()))?;
                if subs.contains_key(&new_name) {
                    return Err(CfoError::validation(format!(
                        "Subcategory already exists: {}",
                        new_name
                    )));
                }
                let accounts = subs
                    .remove(l2)
                    .ok_or_else(|| CfoError::not_found("subcategory", l2.as_str()))?;
                subs.insert(new_name, accounts);
            }
            AccountPath::Account(l1, l2, l3) => {
                let accounts = self
                    .0
                    .get_mut(l1)
                    .ok_or_else(|| CfoError::not_found("category", l1.as_str()))?
                    .get_mut(l2)
                    .ok_or_else(|| CfoError::not_found("subcategory", l2.as_str()))?;
                if accounts.contains(&new_name) {
                    return Err(CfoError::validation(format!(
                        "Account already exists: {}",
                        new_name
                    )));
                }
                let slot = accounts
                    .iter_mut()
                    .find(|a| *a == l3)
                    .ok_or_else(|| CfoError::not_found("account", l3.as_str()))?;
                *slot = new_name;
            }
        }
        Ok(target)
    }

    pub fn delete(&mut self, path: &str) -> Result<AccountPath> {
        let target = AccountPath::parse(path)?;
        match &target {
            AccountPath::Category(l1) => {
                self.0
                    .remove(l1)
                    .ok_or_else(|| CfoError::not_found("category", l1.as_str()))?;
            }
            AccountPath::Subcategory(l1, l2) => {
                self.0
                    .get_mut(l1)
                    .ok_or_else(|| CfoError::not_found("category", l1.as_str()))?
                    .remove(l2)
                    .ok_or_else(|| CfoError::not_found("subcategory", l2.as_str()))?;
            }
            AccountPath::Account(l1, l2, l3) => {
                let accounts = self
                    .0
                    .get_mut(l1)
                    .ok_or_else(|| CfoError::not_found("category", l1.as_str()))?
                    .get_mut(l2)
                    .ok_or_else(|| CfoError::not_found("subcategory", l2.as_str()))?;
                let before = accounts.len();
                accounts.retain(|a| a != l3);
                if accounts.len() == before {
                    return Err(CfoError::not_found("account", l3.as_str()));
                }
            }
        }
        Ok(target)
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn import_json(content: &str) -> Result<Self> {
        let chart: Self = serde_json::from_str(content).map_err(|e| {
            CfoError::validation(format!("Invalid chart of accounts file: {}", e))
        })?;
        if chart.is_empty() {
            return Err(CfoError::validation("The chart of accounts file has no categories"));
        }
        Ok(chart)
    }
}
