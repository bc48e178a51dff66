use cfo_pro::app::commands::{execute, CommandContext};
use cfo_pro::core::store::stored_debug_mode;
use cfo_pro::utils::error::{CfoError, ErrorSeverity};
use cfo_pro::utils::{logger, validation::Validate};
use cfo_pro::{AppConfig, AppStore, Cli, LocalStorage};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::Mutex;

fn report_failure(context: &str, e: &CfoError) -> ! {
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match AppConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose);
            report_failure("Configuration could not be read", &e)
        }
    };

    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    let storage = LocalStorage::new(config.storage.data_dir.clone());

    let verbose = cli.verbose || config.logging.verbose || stored_debug_mode(&storage).await;
    if cli.json_logs || config.logging.json {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Starting CFO Pro {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Data directory: {}", config.storage.data_dir);

    if let Err(e) = config.validate() {
        report_failure("Configuration validation failed", &e);
    }

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let store = match AppStore::load(storage, config.backup_policy()).await {
        Ok(store) => store,
        Err(e) => report_failure("Data could not be loaded", &e),
    };

    let ctx = CommandContext::new(config, Arc::new(Mutex::new(store)), cli.monitor);

    if let Err(e) = execute(cli.command, &ctx).await {
        report_failure("Command failed", &e);
    }

    // commands that only mutate in memory still reach disk
    ctx.store.lock().await.save_if_dirty().await?;
    Ok(())
}
