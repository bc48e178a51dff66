//! Periodic auto-save and auto-backup tasks.

use crate::core::store::AppStore;
use crate::domain::ports::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const DEFAULT_AUTO_BACKUP_MINUTES: u64 = 3;
pub const DEFAULT_AUTO_SAVE_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub auto_backup_every: Duration,
    pub auto_save_every: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auto_backup_every: Duration::from_secs(DEFAULT_AUTO_BACKUP_MINUTES * 60),
            auto_save_every: Duration::from_secs(DEFAULT_AUTO_SAVE_SECS),
        }
    }
}

/// Handles of the running background tasks.
pub struct BackgroundServices {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

fn ticker(period: Duration) -> tokio::time::Interval {
    // the first tick would fire immediately
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

impl BackgroundServices {
    pub fn spawn<S>(store: Arc<Mutex<AppStore<S>>>, config: ServiceConfig) -> Self
    where
        S: Storage + 'static,
    {
        let (shutdown, rx) = watch::channel(false);

        let backup_store = store.clone();
        let mut backup_rx = rx.clone();
        let backup = tokio::spawn(async move {
            let mut interval = ticker(config.auto_backup_every);
            loop {
                let stopping = tokio::select! {
                    _ = interval.tick() => false,
                    _ = backup_rx.changed() => true,
                };
                if stopping {
                    break;
                }
                let mut guard = backup_store.lock().await;
                if !guard.settings().auto_backup {
                    continue;
                }
                match guard.create_auto_backup().await {
                    Ok(name) => tracing::info!("Auto backup written: {}", name),
                    Err(e) => tracing::error!("Auto backup failed: {}", e),
                }
            }
            tracing::debug!("Auto backup task stopped");
        });

        let save_store = store;
        let mut save_rx = rx;
        let save = tokio::spawn(async move {
            let mut interval = ticker(config.auto_save_every);
            loop {
                let stopping = tokio::select! {
                    _ = interval.tick() => false,
                    _ = save_rx.changed() => true,
                };
                match save_store.lock().await.save_if_dirty().await {
                    Ok(true) => tracing::debug!("Auto-saved pending changes"),
                    Ok(false) => {}
                    Err(e) => tracing::error!("Auto-save failed: {}", e),
                }
                if stopping {
                    break;
                }
            }
            tracing::debug!("Auto-save task stopped");
        });

        tracing::info!(
            "Background services started (backup every {:?}, save every {:?})",
            config.auto_backup_every,
            config.auto_save_every
        );
        Self {
            shutdown,
            handles: vec![backup, save],
        }
    }

    /// Signals the tasks and waits for them; pending changes get a final save.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!("Background task ended abnormally: {}", e);
            }
        }
        tracing::info!("Background services stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalStorage;
    use crate::core::store::{BackupPolicy, BACKUP_DIR};
    use crate::domain::ports::Storage;
    use tempfile::TempDir;

    async fn shared_store(dir: &TempDir) -> Arc<Mutex<AppStore<LocalStorage>>> {
        let storage = LocalStorage::new(dir.path());
        let store = AppStore::load(storage, BackupPolicy::default()).await.unwrap();
        Arc::new(Mutex::new(store))
    }

    fn fast() -> ServiceConfig {
        ServiceConfig {
            auto_backup_every: Duration::from_millis(40),
            auto_save_every: Duration::from_millis(40),
        }
    }

    #[tokio::test]
    async fn writes_auto_backups_and_keeps_three() {
        let dir = TempDir::new().unwrap();
        let store = shared_store(&dir).await;

        let services = BackgroundServices::spawn(store.clone(), fast());
        tokio::time::sleep(Duration::from_millis(400)).await;
        services.shutdown().await;

        let guard = store.lock().await;
        let files = guard.storage().list_files(BACKUP_DIR).await.unwrap();
        assert!(!files.is_empty());
        assert!(files.len() <= 3);
        assert!(files.iter().all(|f| f.starts_with("auto_backup_")));
    }

    #[tokio::test]
    async fn respects_disabled_auto_backup() {
        let dir = TempDir::new().unwrap();
        let store = shared_store(&dir).await;
        store
            .lock()
            .await
            .set_setting("auto_backup", "off")
            .await
            .unwrap();

        let services = BackgroundServices::spawn(store.clone(), fast());
        tokio::time::sleep(Duration::from_millis(150)).await;
        services.shutdown().await;

        let guard = store.lock().await;
        assert!(guard.storage().list_files(BACKUP_DIR).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_flushes_dirty_state() {
        let dir = TempDir::new().unwrap();
        let store = shared_store(&dir).await;
        let config = ServiceConfig {
            auto_backup_every: Duration::from_secs(3600),
            auto_save_every: Duration::from_secs(3600),
        };

        let services = BackgroundServices::spawn(store.clone(), config);
        store.lock().await.data_mut().transactions.clear();
        services.shutdown().await;

        let guard = store.lock().await;
        assert!(!guard.is_dirty());
        let saved = guard.storage().read_file("data.json").await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&saved).unwrap();
        assert_eq!(value["transactions"].as_array().unwrap().len(), 0);
    }
}
