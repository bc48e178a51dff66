//! Persistence of the application document: load, save, backups, export,
//! import and reset.

use crate::domain::model::{AppData, BackupEntry, BackupKind, Settings, Transaction, DATA_VERSION};
use crate::domain::ports::Storage;
use crate::utils::error::{CfoError, Result};
use crate::utils::validation::validate_range;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DATA_FILE: &str = "data.json";
pub const BACKUP_DIR: &str = "backups";
const MANUAL_PREFIX: &str = "backup_";
const AUTO_PREFIX: &str = "auto_backup_";
const APP_NAME: &str = "CFO Pro";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupPolicy {
    pub max_manual: usize,
    pub keep_auto: usize,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            max_manual: 10,
            keep_auto: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub transaction_count: usize,
    pub account_count: usize,
}

/// Contents of a file under `backups/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFile {
    pub timestamp: DateTime<Utc>,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub data: AppData,
    pub metadata: BackupMetadata,
}

/// Document written by `export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    pub app_name: String,
    pub data: AppData,
}

pub struct AppStore<S: Storage> {
    storage: S,
    data: AppData,
    policy: BackupPolicy,
    revision: u64,
    dirty: bool,
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(CfoError::InvalidConfigValueError {
            field: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Reads `settings.debugMode` from the data file without loading the store,
/// so logging can be configured first.
pub async fn stored_debug_mode<S: Storage>(storage: &S) -> bool {
    let Ok(bytes) = storage.read_file(DATA_FILE).await else {
        return false;
    };
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|v| v.get("settings")?.get("debugMode")?.as_bool())
        .unwrap_or(false)
}

impl<S: Storage> AppStore<S> {
    /// Loads `data.json`, falling back to the example data when it is missing
    /// or unreadable.
    pub async fn load(storage: S, policy: BackupPolicy) -> Result<Self> {
        let data = if storage.exists(DATA_FILE).await? {
            let bytes = storage.read_file(DATA_FILE).await?;
            match serde_json::from_slice::<AppData>(&bytes) {
                Ok(data) => {
                    tracing::info!("Loaded {} transactions", data.transactions.len());
                    data
                }
                Err(e) => {
                    tracing::warn!("Data file is corrupt ({}), starting from example data", e);
                    AppData::example()
                }
            }
        } else {
            tracing::info!("No data file found, initialising example data");
            AppData::example()
        };

        let mut store = Self {
            storage,
            data,
            policy,
            revision: 0,
            dirty: false,
        };
        store.data.ensure_structure();
        Ok(store)
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    /// Mutable access; bumps the revision so cached figures are recomputed.
    pub fn data_mut(&mut self) -> &mut AppData {
        self.revision += 1;
        self.dirty = true;
        &mut self.data
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.data.transactions
    }

    pub fn settings(&self) -> &Settings {
        &self.data.settings
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn replace_transactions(&mut self, transactions: Vec<Transaction>) {
        let data = self.data_mut();
        data.transactions = transactions;
        data.ensure_structure();
    }

    pub async fn save(&mut self) -> Result<()> {
        self.data.version = DATA_VERSION.to_string();
        self.data.last_saved = Some(Utc::now());
        let json = serde_json::to_vec_pretty(&self.data)?;
        self.storage.write_file(DATA_FILE, &json).await?;
        self.dirty = false;
        tracing::debug!("Saved {} bytes to {}", json.len(), DATA_FILE);
        Ok(())
    }

    pub async fn save_if_dirty(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    /// `backups/<prefix><13-digit millis>.json`, unique within the directory.
    async fn next_backup_path(&self, prefix: &str) -> Result<(String, String)> {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let name = format!("{}{:013}.json", prefix, millis);
            let path = format!("{}/{}", BACKUP_DIR, name);
            if !self.storage.exists(&path).await? {
                return Ok((name, path));
            }
            millis += 1;
        }
    }

    async fn write_backup(&self, kind: BackupKind, prefix: &str) -> Result<(String, usize)> {
        let file = BackupFile {
            timestamp: Utc::now(),
            version: DATA_VERSION.to_string(),
            kind,
            data: self.data.clone(),
            metadata: BackupMetadata {
                transaction_count: self.data.transactions.len(),
                account_count: self.data.chart_of_accounts.len(),
            },
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        let (name, path) = self.next_backup_path(prefix).await?;
        self.storage.write_file(&path, &bytes).await?;
        Ok((name, bytes.len()))
    }

    /// Writes a manual backup, records it in the index and evicts entries
    /// beyond the policy limit.
    pub async fn create_manual_backup(&mut self) -> Result<BackupEntry> {
        let (name, size) = self.write_backup(BackupKind::Manual, MANUAL_PREFIX).await?;
        let now = Utc::now();
        let entry = BackupEntry {
            id: name.trim_end_matches(".json").to_string(),
            timestamp: now,
            size,
            kind: BackupKind::Manual,
            file: name,
        };

        let max_manual = self.policy.max_manual;
        let data = self.data_mut();
        data.backups.push(entry.clone());
        data.settings.last_backup = Some(now);
        let evicted: Vec<BackupEntry> = if data.backups.len() > max_manual {
            let excess = data.backups.len() - max_manual;
            data.backups.drain(..excess).collect()
        } else {
            Vec::new()
        };

        for old in evicted {
            tracing::debug!("Removing old backup {}", old.file);
            self.storage
                .delete_file(&format!("{}/{}", BACKUP_DIR, old.file))
                .await?;
        }

        self.save().await?;
        tracing::info!("Manual backup created: {} ({} bytes)", entry.file, entry.size);
        Ok(entry)
    }

    /// Writes an auto backup and keeps only the newest ones. `last_backup` is
    /// updated in memory and reaches disk with the next save.
    pub async fn create_auto_backup(&mut self) -> Result<String> {
        let (name, size) = self.write_backup(BackupKind::Auto, AUTO_PREFIX).await?;
        self.data_mut().settings.last_backup = Some(Utc::now());

        let autos: Vec<String> = self
            .storage
            .list_files(BACKUP_DIR)
            .await?
            .into_iter()
            .filter(|f| f.starts_with(AUTO_PREFIX))
            .collect();
        if autos.len() > self.policy.keep_auto {
            let excess = autos.len() - self.policy.keep_auto;
            for old in &autos[..excess] {
                self.storage
                    .delete_file(&format!("{}/{}", BACKUP_DIR, old))
                    .await?;
            }
        }

        tracing::debug!("Auto backup created: {} ({} bytes)", name, size);
        Ok(name)
    }

    pub fn backups(&self) -> &[BackupEntry] {
        &self.data.backups
    }

    pub fn export_data(&self) -> Result<Vec<u8>> {
        let envelope = ExportEnvelope {
            exported_at: Utc::now(),
            version: DATA_VERSION.to_string(),
            app_name: APP_NAME.to_string(),
            data: self.data.clone(),
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    /// Imports an exported document (or a backup file).
    ///
    /// A manual backup is taken first. Transactions and the chart are
    /// replaced; settings present in the file override the current ones.
    pub async fn import_data(&mut self, bytes: &[u8]) -> Result<usize> {
        let document: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| CfoError::validation(format!("Invalid import file: {}", e)))?;
        let imported = document
            .get("data")
            .filter(|data| data.get("transactions").is_some_and(|t| t.is_array()))
            .ok_or_else(|| CfoError::validation("Invalid file: data.transactions is missing"))?;

        let transactions: Vec<Transaction> =
            serde_json::from_value(imported["transactions"].clone())?;
        let chart = match imported.get("chartOfAccounts") {
            Some(value) if value.is_object() => Some(serde_json::from_value(value.clone())?),
            _ => None,
        };
        let settings = match imported.get("settings") {
            Some(serde_json::Value::Object(overlay)) => {
                let mut current = serde_json::to_value(&self.data.settings)?;
                if let serde_json::Value::Object(base) = &mut current {
                    for (key, value) in overlay {
                        base.insert(key.clone(), value.clone());
                    }
                }
                Some(serde_json::from_value::<Settings>(current)?)
            }
            _ => None,
        };

        self.create_manual_backup().await?;

        let count = transactions.len();
        let data = self.data_mut();
        data.transactions = transactions;
        if let Some(chart) = chart {
            data.chart_of_accounts = chart;
        }
        if let Some(settings) = settings {
            data.settings = settings;
        }
        data.ensure_structure();
        self.save().await?;

        tracing::info!("Imported {} transactions", count);
        Ok(count)
    }

    pub async fn restore_backup(&mut self, file: &str) -> Result<usize> {
        let path = format!("{}/{}", BACKUP_DIR, file);
        if !self.storage.exists(&path).await? {
            return Err(CfoError::not_found("backup", file));
        }
        let bytes = self.storage.read_file(&path).await?;
        self.import_data(&bytes).await
    }

    /// Removes the data file and every backup, then re-seeds the example data.
    pub async fn clear_all(&mut self) -> Result<()> {
        for name in self.storage.list_files(BACKUP_DIR).await? {
            self.storage
                .delete_file(&format!("{}/{}", BACKUP_DIR, name))
                .await?;
        }
        self.storage.delete_file(DATA_FILE).await?;

        *self.data_mut() = AppData::example();
        self.data.ensure_structure();
        self.save().await?;
        tracing::info!("All data cleared");
        Ok(())
    }

    pub async fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        let settings = &mut self.data_mut().settings;
        match key {
            "gemini_api_key" | "geminiApiKey" => settings.gemini_api_key = value.trim().to_string(),
            "auto_backup" | "autoBackup" => settings.auto_backup = parse_flag(key, value)?,
            "debug_mode" | "debugMode" => settings.debug_mode = parse_flag(key, value)?,
            "items_per_page" | "itemsPerPage" => {
                let parsed: usize = value.trim().parse().map_err(|_| {
                    CfoError::InvalidConfigValueError {
                        field: key.to_string(),
                        value: value.to_string(),
                        reason: "expected a number".to_string(),
                    }
                })?;
                validate_range(key, parsed, 1, 500)?;
                settings.items_per_page = parsed;
            }
            other => {
                return Err(CfoError::validation(format!("Unknown setting: {}", other)));
            }
        }
        self.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalStorage;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                CfoError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn delete_file(&self, path: &str) -> Result<()> {
            self.files.lock().await.remove(path);
            Ok(())
        }

        async fn exists(&self, path: &str) -> Result<bool> {
            Ok(self.files.lock().await.contains_key(path))
        }

        async fn list_files(&self, dir: &str) -> Result<Vec<String>> {
            let prefix = format!("{}/", dir);
            let mut names: Vec<String> = self
                .files
                .lock()
                .await
                .keys()
                .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
                .collect();
            names.sort();
            Ok(names)
        }
    }

    async fn store() -> AppStore<MockStorage> {
        AppStore::load(MockStorage::default(), BackupPolicy::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_file_starts_with_example_data() {
        let store = store().await;
        assert_eq!(store.transactions().len(), 5);
        assert_eq!(store.data().version, DATA_VERSION);
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_example_data() {
        let storage = MockStorage::default();
        storage.write_file(DATA_FILE, b"{not json").await.unwrap();
        let store = AppStore::load(storage, BackupPolicy::default()).await.unwrap();
        assert_eq!(store.transactions().len(), 5);
    }

    #[tokio::test]
    async fn debug_mode_is_read_before_load() {
        let storage = MockStorage::default();
        assert!(!stored_debug_mode(&storage).await);

        let mut store = AppStore::load(storage.clone(), BackupPolicy::default())
            .await
            .unwrap();
        store.set_setting("debugMode", "on").await.unwrap();
        assert!(stored_debug_mode(&storage).await);
    }

    #[tokio::test]
    async fn save_then_reload() {
        let storage = MockStorage::default();
        let mut store = AppStore::load(storage.clone(), BackupPolicy::default())
            .await
            .unwrap();
        store.data_mut().transactions.truncate(2);
        assert!(store.is_dirty());
        store.save().await.unwrap();
        assert!(!store.is_dirty());

        let reloaded = AppStore::load(storage, BackupPolicy::default()).await.unwrap();
        assert_eq!(reloaded.transactions().len(), 2);
        assert!(reloaded.data().last_saved.is_some());
    }

    #[tokio::test]
    async fn manual_backups_are_capped() {
        let mut store = AppStore::load(
            MockStorage::default(),
            BackupPolicy {
                max_manual: 2,
                keep_auto: 3,
            },
        )
        .await
        .unwrap();

        for _ in 0..3 {
            store.create_manual_backup().await.unwrap();
        }
        assert_eq!(store.backups().len(), 2);
        let files = store.storage().list_files(BACKUP_DIR).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(store.settings().last_backup.is_some());
    }

    #[tokio::test]
    async fn auto_backups_keep_newest() {
        let mut store = store().await;
        let mut names = Vec::new();
        for _ in 0..5 {
            names.push(store.create_auto_backup().await.unwrap());
        }
        let files = store.storage().list_files(BACKUP_DIR).await.unwrap();
        assert_eq!(files, names[2..].to_vec());
    }

    #[tokio::test]
    async fn auto_backup_stamps_last_backup() {
        let mut store = store().await;
        assert!(store.settings().last_backup.is_none());

        store.create_auto_backup().await.unwrap();
        assert!(store.settings().last_backup.is_some());
        assert!(store.is_dirty());
        assert!(store.backups().is_empty());
    }

    #[tokio::test]
    async fn import_requires_transactions() {
        let mut store = store().await;
        let err = store.import_data(br#"{"data": {}}"#).await.unwrap_err();
        assert!(matches!(err, CfoError::ValidationError { .. }));
        assert!(store.backups().is_empty());
    }

    #[tokio::test]
    async fn export_import_round_trip() {
        let mut source = store().await;
        source.data_mut().settings.items_per_page = 50;
        let exported = source.export_data().unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&exported).unwrap();
        assert_eq!(envelope["appName"], "CFO Pro");
        assert_eq!(envelope["version"], "10.0");

        let mut target = store().await;
        target.replace_transactions(Vec::new());
        let count = target.import_data(&exported).await.unwrap();
        assert_eq!(count, 5);
        assert_eq!(target.settings().items_per_page, 50);
        assert_eq!(target.backups().len(), 1);
    }

    #[tokio::test]
    async fn clear_all_reseeds() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = AppStore::load(LocalStorage::new(dir.path()), BackupPolicy::default())
            .await
            .unwrap();
        store.create_manual_backup().await.unwrap();
        store.replace_transactions(Vec::new());
        store.clear_all().await.unwrap();

        assert_eq!(store.transactions().len(), 5);
        assert!(store.backups().is_empty());
        assert!(store.storage().list_files(BACKUP_DIR).await.unwrap().is_empty());
        assert!(dir.path().join(DATA_FILE).exists());
    }

    #[tokio::test]
    async fn settings_are_validated() {
        let mut store = store().await;
        store.set_setting("items_per_page", "100").await.unwrap();
        assert_eq!(store.settings().items_per_page, 100);
        assert!(store.set_setting("items_per_page", "0").await.is_err());
        assert!(store.set_setting("auto_backup", "maybe").await.is_err());
        store.set_setting("auto_backup", "off").await.unwrap();
        assert!(!store.settings().auto_backup);
        assert!(store.set_setting("theme", "dark").await.is_err());
    }
}
