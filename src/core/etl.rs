use crate::domain::model::ImportReport;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::ProcessMonitor;

/// Drives a [`Pipeline`] through extract, transform and load.
pub struct ImportEngine<P: Pipeline> {
    pipeline: P,
    monitor: ProcessMonitor,
}

impl<P: Pipeline> ImportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: ProcessMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<ImportReport> {
        tracing::info!("Starting import...");
        self.monitor.log_stats("start");

        let content = self.pipeline.extract().await?;
        tracing::info!("Read {} characters", content.len());
        self.monitor.log_stats("extract");

        let parsed = self.pipeline.transform(content).await?;
        tracing::info!(
            "Parsed {} transactions ({} rows with errors)",
            parsed.transactions.len(),
            parsed.errors.len()
        );
        self.monitor.log_stats("transform");

        let report = self.pipeline.load(parsed).await?;
        tracing::info!("Imported {} transactions from {}", report.imported, report.source);
        self.monitor.log_stats("load");
        self.monitor.log_final_stats();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ParsedStatement, RowError};
    use crate::utils::error::CfoError;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPipeline {
        calls: AtomicUsize,
        fail_transform: bool,
    }

    #[async_trait::async_trait]
    impl Pipeline for CountingPipeline {
        async fn extract(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("content".to_string())
        }

        async fn transform(&self, _content: String) -> Result<ParsedStatement> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_transform {
                return Err(CfoError::processing("boom"));
            }
            Ok(ParsedStatement {
                source: "mock.csv".to_string(),
                errors: vec![RowError {
                    line: 3,
                    message: "bad".to_string(),
                }],
                ..Default::default()
            })
        }

        async fn load(&self, parsed: ParsedStatement) -> Result<ImportReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImportReport {
                source: parsed.source,
                imported: 0,
                skipped_rows: 0,
                errors: parsed.errors,
                total_inflow: Decimal::ZERO,
                total_outflow: Decimal::ZERO,
            })
        }
    }

    #[tokio::test]
    async fn runs_all_phases() {
        let engine = ImportEngine::new(CountingPipeline {
            calls: AtomicUsize::new(0),
            fail_transform: false,
        });
        let report = engine.run().await.unwrap();
        assert_eq!(report.source, "mock.csv");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(engine.pipeline.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_transform_error() {
        let engine = ImportEngine::new(CountingPipeline {
            calls: AtomicUsize::new(0),
            fail_transform: true,
        });
        assert!(engine.run().await.is_err());
        assert_eq!(engine.pipeline.calls.load(Ordering::SeqCst), 2);
    }
}
