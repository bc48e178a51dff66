use crate::domain::model::{ImportReport, ParsedStatement};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Byte storage addressed by relative paths (`data.json`, `backups/...`).
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn delete_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    /// File names (not paths) directly under `dir`, sorted.
    fn list_files(
        &self,
        dir: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// Limits applied to statement imports.
pub trait ConfigProvider: Send + Sync {
    fn max_file_size_mb(&self) -> u64;
    fn max_errors(&self) -> usize;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Reads and decodes the source file.
    async fn extract(&self) -> Result<String>;
    async fn transform(&self, content: String) -> Result<ParsedStatement>;
    async fn load(&self, parsed: ParsedStatement) -> Result<ImportReport>;
}
