use crate::core::encoding::{decode, validate_upload};
use crate::core::parser::parse_csv;
use crate::core::store::AppStore;
use crate::domain::model::{ImportReport, ParsedStatement};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Imports one bank statement into the ledger.
///
/// Extract reads `file_name` from `source`, transform parses it and load
/// replaces the ledger's transactions and saves.
pub struct ImportPipeline<S: Storage, T: Storage, C: ConfigProvider> {
    source: S,
    file_name: String,
    store: Arc<Mutex<AppStore<T>>>,
    config: C,
}

impl<S: Storage, T: Storage, C: ConfigProvider> ImportPipeline<S, T, C> {
    pub fn new(source: S, file_name: impl Into<String>, store: Arc<Mutex<AppStore<T>>>, config: C) -> Self {
        Self {
            source,
            file_name: file_name.into(),
            store,
            config,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, T: Storage, C: ConfigProvider> Pipeline for ImportPipeline<S, T, C> {
    async fn extract(&self) -> Result<String> {
        tracing::debug!("Reading statement {}", self.file_name);
        let bytes = self.source.read_file(&self.file_name).await?;
        validate_upload(&self.file_name, bytes.len() as u64, self.config.max_file_size_mb())?;
        decode(&bytes)
    }

    async fn transform(&self, content: String) -> Result<ParsedStatement> {
        let mut parsed = parse_csv(&content, self.config.max_errors())?;
        parsed.source = self.file_name.clone();
        Ok(parsed)
    }

    async fn load(&self, parsed: ParsedStatement) -> Result<ImportReport> {
        let (total_inflow, total_outflow) = parsed
            .transactions
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(i, o), tx| (i + tx.inflow, o + tx.outflow));

        let report = ImportReport {
            source: parsed.source,
            imported: parsed.transactions.len(),
            skipped_rows: parsed.skipped_rows,
            errors: parsed.errors,
            total_inflow,
            total_outflow,
        };

        let mut store = self.store.lock().await;
        store.replace_transactions(parsed.transactions);
        store.save().await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalStorage;
    use crate::core::parser::sample_csv;
    use crate::core::store::BackupPolicy;
    use crate::utils::error::CfoError;
    use tempfile::TempDir;

    struct Limits {
        max_file_size_mb: u64,
        max_errors: usize,
    }

    impl ConfigProvider for Limits {
        fn max_file_size_mb(&self) -> u64 {
            self.max_file_size_mb
        }

        fn max_errors(&self) -> usize {
            self.max_errors
        }
    }

    fn limits() -> Limits {
        Limits {
            max_file_size_mb: 50,
            max_errors: 10,
        }
    }

    async fn setup(
        name: &str,
        content: &[u8],
    ) -> (TempDir, ImportPipeline<LocalStorage, LocalStorage, Limits>) {
        let dir = TempDir::new().unwrap();
        let inbox = LocalStorage::new(dir.path().join("inbox"));
        inbox.write_file(name, content).await.unwrap();
        let store = AppStore::load(LocalStorage::new(dir.path().join("data")), BackupPolicy::default())
            .await
            .unwrap();
        let pipeline = ImportPipeline::new(inbox, name, Arc::new(Mutex::new(store)), limits());
        (dir, pipeline)
    }

    #[tokio::test]
    async fn extract_decodes_statement() {
        let (_dir, pipeline) = setup("extrato.csv", sample_csv().as_bytes()).await;
        let content = pipeline.extract().await.unwrap();
        assert!(content.starts_with("Data,"));
    }

    #[tokio::test]
    async fn extract_rejects_excel() {
        let (_dir, pipeline) = setup("extrato.xlsx", b"PK\x03\x04").await;
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, CfoError::UploadError { .. }));
    }

    #[tokio::test]
    async fn load_replaces_ledger() {
        let (dir, pipeline) = setup("extrato.csv", sample_csv().as_bytes()).await;
        let content = pipeline.extract().await.unwrap();
        let parsed = pipeline.transform(content).await.unwrap();
        assert_eq!(parsed.source, "extrato.csv");

        let report = pipeline.load(parsed).await.unwrap();
        assert_eq!(report.imported, 4);
        assert_eq!(report.total_outflow, "1289.90".parse::<Decimal>().unwrap());

        assert_eq!(pipeline.store.lock().await.transactions().len(), 4);
        assert!(dir.path().join("data").join("data.json").exists());
    }
}
