use crate::domain::accounts::ChartOfAccounts;
use crate::domain::wire;
use crate::utils::format::{generate_id, month_key};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DATA_VERSION: &str = "10.0";
pub const DEFAULT_ITEMS_PER_PAGE: usize = 25;

/// Column names shared by the data file, CSV exports and the converter.
pub mod columns {
    pub const DATE: &str = "Data";
    pub const BANK: &str = "Banco Origem/Destino";
    pub const DESCRIPTION: &str = "Descrição Original";
    pub const PAYEE: &str = "Favorecido / Pagador Padronizado";
    pub const INFLOW: &str = "Entrada (R$)";
    pub const OUTFLOW: &str = "Saída (R$)";
    pub const LEVEL1: &str = "Classificação Nível 1";
    pub const LEVEL2: &str = "Classificação Nível 2";
    pub const LEVEL3: &str = "Classificação Nível 3";
    pub const COST_CENTER: &str = "Centro de Custo";
    pub const STATUS: &str = "Status Conciliação";
    pub const NOTES: &str = "Notas";
    pub const CONTRACT_NOTE: &str = "Contrato/Nota?";
    pub const MONTH: &str = "Mes";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReconciliationStatus {
    #[default]
    Pending,
    Reconciled,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::Pending => "Pendente",
            ReconciliationStatus::Reconciled => "Conciliado",
        }
    }

    /// Case-insensitive; anything unknown is pending.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "conciliado" | "reconciled" => ReconciliationStatus::Reconciled,
            _ => ReconciliationStatus::Pending,
        }
    }
}

impl std::fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReconciliationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReconciliationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = wire::text(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, deserialize_with = "wire::text")]
    pub id: String,
    #[serde(rename = "Data", default, with = "wire::stored_date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Banco Origem/Destino", default, deserialize_with = "wire::text")]
    pub bank: String,
    #[serde(rename = "Descrição Original", default, deserialize_with = "wire::text")]
    pub description: String,
    #[serde(
        rename = "Favorecido / Pagador Padronizado",
        default,
        deserialize_with = "wire::text"
    )]
    pub payee: String,
    #[serde(rename = "Entrada (R$)", default, with = "wire::money")]
    pub inflow: Decimal,
    #[serde(rename = "Saída (R$)", default, with = "wire::money")]
    pub outflow: Decimal,
    #[serde(rename = "Classificação Nível 1", default, deserialize_with = "wire::text")]
    pub level1: String,
    #[serde(rename = "Classificação Nível 2", default, deserialize_with = "wire::text")]
    pub level2: String,
    #[serde(rename = "Classificação Nível 3", default, deserialize_with = "wire::text")]
    pub level3: String,
    #[serde(rename = "Centro de Custo", default, deserialize_with = "wire::text")]
    pub cost_center: String,
    #[serde(rename = "Status Conciliação", default)]
    pub status: ReconciliationStatus,
    #[serde(rename = "Notas", default, deserialize_with = "wire::text")]
    pub notes: String,
    #[serde(rename = "Contrato/Nota?", default, deserialize_with = "wire::text")]
    pub contract_note: String,
    #[serde(rename = "Mes", default, deserialize_with = "wire::text")]
    pub month: String,
}

impl Transaction {
    /// Inflow when positive, otherwise the negated outflow.
    pub fn value(&self) -> Decimal {
        if self.inflow > Decimal::ZERO {
            self.inflow
        } else {
            -self.outflow
        }
    }

    pub fn net(&self) -> Decimal {
        self.inflow - self.outflow
    }

    pub fn is_reconciled(&self) -> bool {
        self.status == ReconciliationStatus::Reconciled
    }

    pub fn is_classified(&self) -> bool {
        !self.level1.trim().is_empty()
    }

    /// `YYYY-MM`, taken from the stored month or derived from the date.
    pub fn month_key(&self) -> Option<String> {
        if !self.month.trim().is_empty() {
            return Some(self.month.clone());
        }
        self.date.map(month_key)
    }

    /// Fills in a missing id and recomputes the month from the date.
    pub fn ensure_structure(&mut self) {
        if self.id.trim().is_empty() {
            self.id = generate_id();
        }
        if let Some(date) = self.date {
            self.month = month_key(date);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, deserialize_with = "wire::text")]
    pub gemini_api_key: String,
    #[serde(default)]
    pub last_backup: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub auto_backup: bool,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
}

fn default_true() -> bool {
    true
}

fn default_items_per_page() -> usize {
    DEFAULT_ITEMS_PER_PAGE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            last_backup: None,
            auto_backup: true,
            debug_mode: false,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Manual,
    Auto,
}

/// Index entry for a backup file under `backups/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub size: usize,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    #[serde(default)]
    pub file: String,
}

/// The whole persisted document (`data.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default = "current_version")]
    pub version: String,
    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub chart_of_accounts: ChartOfAccounts,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub backups: Vec<BackupEntry>,
}

fn current_version() -> String {
    DATA_VERSION.to_string()
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            version: current_version(),
            last_saved: None,
            transactions: Vec::new(),
            chart_of_accounts: ChartOfAccounts::default(),
            settings: Settings::default(),
            backups: Vec::new(),
        }
    }
}

impl AppData {
    /// Five sample January 2025 transactions and the default chart.
    pub fn example() -> Self {
        Self {
            transactions: example_transactions(),
            ..Self::default()
        }
    }

    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|t| t.id == id)
    }

    /// Repairs ids and months and stamps the current version.
    pub fn ensure_structure(&mut self) {
        for tx in &mut self.transactions {
            tx.ensure_structure();
        }
        if self.settings.items_per_page == 0 {
            self.settings.items_per_page = DEFAULT_ITEMS_PER_PAGE;
        }
        if self.version != DATA_VERSION {
            tracing::info!("Migrating data from version {} to {}", self.version, DATA_VERSION);
            self.version = current_version();
        }
    }
}

/// A row the parser could not read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Output of the transform step: the transactions plus what was left behind.
#[derive(Debug, Clone, Default)]
pub struct ParsedStatement {
    pub source: String,
    pub separator: char,
    pub transactions: Vec<Transaction>,
    pub errors: Vec<RowError>,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub imported: usize,
    pub skipped_rows: usize,
    pub errors: Vec<RowError>,
    pub total_inflow: Decimal,
    pub total_outflow: Decimal,
}

pub fn example_transactions() -> Vec<Transaction> {
    serde_json::from_str(include_str!("fixtures/example_transactions.json"))
        .expect("bundled example transactions are valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn example_data_loads() {
        let data = AppData::example();
        assert_eq!(data.transactions.len(), 5);
        let first = &data.transactions[0];
        assert_eq!(first.id, "example_1");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(first.inflow, Decimal::from_str("44324.91").unwrap());
        assert!(first.is_reconciled());
        assert_eq!(data.transactions[4].status, ReconciliationStatus::Pending);
        assert_eq!(data.chart_of_accounts.categories().len(), 4);
    }

    #[test]
    fn status_is_lenient() {
        assert_eq!(
            ReconciliationStatus::parse_lenient("CONCILIADO"),
            ReconciliationStatus::Reconciled
        );
        assert_eq!(
            ReconciliationStatus::parse_lenient("whatever"),
            ReconciliationStatus::Pending
        );
    }

    #[test]
    fn transaction_round_trips_wire_names() {
        let tx = Transaction {
            id: "t1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 2, 3),
            description: "Venda".to_string(),
            inflow: Decimal::from(10),
            ..Default::default()
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["Data"], "2025-02-03");
        assert_eq!(json["Descrição Original"], "Venda");
        assert_eq!(json["Entrada (R$)"], "10.00");
        assert_eq!(json["Status Conciliação"], "Pendente");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn ensure_structure_fills_id_and_month() {
        let mut data = AppData {
            version: "9.0".to_string(),
            transactions: vec![Transaction {
                date: NaiveDate::from_ymd_opt(2024, 12, 31),
                ..Default::default()
            }],
            ..AppData::default()
        };
        data.ensure_structure();
        assert!(data.transactions[0].id.starts_with("id_"));
        assert_eq!(data.transactions[0].month, "2024-12");
        assert_eq!(data.version, DATA_VERSION);
    }

    #[test]
    fn settings_default_when_missing() {
        let data: AppData = serde_json::from_str(r#"{"transactions": []}"#).unwrap();
        assert!(data.settings.auto_backup);
        assert_eq!(data.settings.items_per_page, DEFAULT_ITEMS_PER_PAGE);
        assert_eq!(data.chart_of_accounts.categories().len(), 4);
    }

    #[test]
    fn value_is_signed() {
        let expense = Transaction {
            outflow: Decimal::from(30),
            ..Default::default()
        };
        assert_eq!(expense.value(), Decimal::from(-30));
        assert_eq!(expense.net(), Decimal::from(-30));
    }
}
