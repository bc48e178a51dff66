//! Runs parsed CLI commands against the shared store and prints results.

use crate::adapters::LocalStorage;
use crate::app::assistant::{test_and_save_key, GeminiClient};
use crate::app::reconciliation::{
    classification_options, last_classification, reconcile, suggest_classification, Classification,
    ReconcileForm, ReconciliationQueue,
};
use crate::app::reports::{self, ReportPeriod};
use crate::app::dashboard::{KpiCache, Kpis};
use crate::app::services::BackgroundServices;
use crate::app::transactions::{self, SortSpec, TransactionEdit, TransactionFilter};
use crate::app::{audit, chart, converter, dashboard, projection};
use crate::config::cli::{
    AccountsCommand, ApplyArgs, Command, EditArgs, ListArgs, ReconcileCommand, ReportArgs,
    ReportKind, SettingsCommand, TransactionsCommand,
};
use crate::config::toml_config::AppConfig;
use crate::core::etl::ImportEngine;
use crate::core::parser::sample_csv;
use crate::core::pipeline::ImportPipeline;
use crate::core::store::AppStore;
use crate::domain::accounts::{AccountPath, ChartOfAccounts};
use crate::domain::model::{AppData, Transaction};
use crate::utils::error::{CfoError, Result};
use crate::utils::format::{format_currency, format_date, format_percent};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedStore = Arc<Mutex<AppStore<LocalStorage>>>;

pub struct CommandContext {
    pub config: AppConfig,
    pub store: SharedStore,
    pub monitor: bool,
    pub kpi_cache: Mutex<KpiCache>,
}

impl CommandContext {
    pub fn new(config: AppConfig, store: SharedStore, monitor: bool) -> Self {
        Self {
            config,
            store,
            monitor,
            kpi_cache: Mutex::new(KpiCache::default()),
        }
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn percent(fraction: Decimal) -> String {
    format!("{}%", (fraction * Decimal::ONE_HUNDRED).round_dp(1))
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes).await?;
    println!("📁 Written to {}", path.display());
    Ok(())
}

pub async fn execute(command: Command, ctx: &CommandContext) -> Result<()> {
    match command {
        Command::Import { file } => import(&file, ctx).await,
        Command::SampleCsv { output } => match output {
            Some(path) => write_output(&path, sample_csv().as_bytes()).await,
            None => {
                print!("{}", sample_csv());
                Ok(())
            }
        },
        Command::Dashboard { json } => {
            let store = ctx.store.lock().await;
            let kpis = ctx
                .kpi_cache
                .lock()
                .await
                .get_or_compute(store.revision(), store.transactions());
            print_dashboard(store.data(), kpis, json)
        }
        Command::Transactions(cmd) => transactions_command(cmd, ctx).await,
        Command::Reconcile(cmd) => reconcile_command(cmd, ctx).await,
        Command::Report(args) => report_command(args, ctx).await,
        Command::Project { months, method } => {
            let horizon = months.unwrap_or(ctx.config.projection.horizon);
            let method = match method {
                Some(method) => method,
                None => ctx.config.projection_method()?,
            };
            let store = ctx.store.lock().await;
            print_projection(store.transactions(), horizon, method);
            Ok(())
        }
        Command::Audit { fix_duplicates } => {
            let mut store = ctx.store.lock().await;
            let report = audit::run(store.transactions(), today());
            print_audit(&report);
            if fix_duplicates && !report.duplicates.is_empty() {
                let removed = audit::fix_duplicates(store.data_mut());
                store.save().await?;
                println!("✅ Removed {} duplicate transaction(s)", removed);
            }
            Ok(())
        }
        Command::Accounts(cmd) => accounts_command(cmd, ctx).await,
        Command::Convert { file, output } => {
            let bytes = tokio::fs::read(&file).await?;
            let name = file_name(&file)?;
            let converted = converter::convert_csv(&name, &bytes)?;
            let path = output.unwrap_or_else(|| PathBuf::from(&converted.name));
            println!(
                "✅ Converted {} transaction(s), {} row(s) skipped",
                converted.transactions, converted.skipped_rows
            );
            write_output(&path, converted.content.as_bytes()).await
        }
        Command::Bundle { output } => {
            let bytes = {
                let store = ctx.store.lock().await;
                converter::bundle(store.transactions())?
            };
            write_output(&output, &bytes).await
        }
        Command::Chat { message } => {
            let message = message.join(" ");
            let store = ctx.store.lock().await;
            let client = assistant_client(&ctx.config, store.data())?;
            let answer = client.chat(store.data(), &message).await?;
            println!("{}", answer);
            Ok(())
        }
        Command::ChatTest { key } => {
            let mut store = ctx.store.lock().await;
            test_and_save_key(&mut store, &ctx.config.assistant.gemini, &key).await?;
            println!("✅ Conexão com Gemini verificada; chave salva");
            Ok(())
        }
        Command::Backup { list } => {
            let mut store = ctx.store.lock().await;
            if list {
                if store.backups().is_empty() {
                    println!("No backups yet");
                }
                for entry in store.backups() {
                    println!(
                        "{}  {}  {} bytes",
                        entry.file,
                        entry.timestamp.format("%d/%m/%Y %H:%M:%S"),
                        entry.size
                    );
                }
                return Ok(());
            }
            let entry = store.create_manual_backup().await?;
            println!("✅ Backup created: {}", entry.file);
            Ok(())
        }
        Command::Export { output } => {
            let bytes = ctx.store.lock().await.export_data()?;
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "cfo_pro_export_{}.json",
                    chrono::Local::now().format("%Y-%m-%d")
                ))
            });
            write_output(&path, &bytes).await
        }
        Command::Restore { name, file } => {
            let mut store = ctx.store.lock().await;
            let count = match (name, file) {
                (_, Some(path)) => {
                    let bytes = tokio::fs::read(&path).await?;
                    store.import_data(&bytes).await?
                }
                (Some(name), None) => store.restore_backup(&name).await?,
                (None, None) => {
                    return Err(CfoError::validation(
                        "Give a backup name or --file with an exported document",
                    ))
                }
            };
            println!("✅ Restored {} transaction(s)", count);
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                return Err(CfoError::validation(
                    "Clearing deletes all data and backups; pass --yes to confirm",
                ));
            }
            ctx.store.lock().await.clear_all().await?;
            println!("✅ All data cleared");
            Ok(())
        }
        Command::Settings(cmd) => settings_command(cmd, ctx).await,
        Command::Daemon => {
            let services =
                BackgroundServices::spawn(ctx.store.clone(), ctx.config.service_config());
            println!("Running auto-save and auto-backup; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            services.shutdown().await;
            Ok(())
        }
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CfoError::UploadError {
            message: format!("{} is not a file", path.display()),
        })
}

async fn import(file: &Path, ctx: &CommandContext) -> Result<()> {
    let name = file_name(file)?;
    let dir = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let pipeline = ImportPipeline::new(
        LocalStorage::new(dir),
        name,
        ctx.store.clone(),
        ctx.config.clone(),
    );
    let engine = ImportEngine::new_with_monitoring(pipeline, ctx.monitor);
    let report = engine.run().await?;

    println!("✅ Imported {} transaction(s) from {}", report.imported, report.source);
    println!(
        "   Entradas {}  Saídas {}",
        format_currency(report.total_inflow),
        format_currency(report.total_outflow)
    );
    if report.skipped_rows > 0 {
        println!("   {} empty or summary row(s) skipped", report.skipped_rows);
    }
    for error in &report.errors {
        println!("⚠️  line {}: {}", error.line, error.message);
    }
    Ok(())
}

fn print_dashboard(data: &AppData, kpis: Kpis, json: bool) -> Result<()> {
    let summary = dashboard::summary_with_kpis(&data.transactions, kpis);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let k = summary.kpis;
    println!("Receitas Totais:  {}", format_currency(k.total_revenue));
    println!("Despesas Totais:  {}", format_currency(k.total_expenses));
    println!("Resultado Líquido: {}", format_currency(k.net_result));
    println!("Transações:       {}", k.transaction_count);
    println!(
        "Pendentes: {}  Não classificadas: {}",
        summary.pending.pending, summary.pending.unclassified
    );
    if let Some(period) = summary.period {
        println!(
            "Período: {} a {} ({} dias)",
            format_date(period.first),
            format_date(period.last),
            period.days
        );
    }
    println!(
        "Entrada média {}  Maior entrada {}  Maior saída {}",
        format_currency(summary.performance.average_inflow),
        format_currency(summary.performance.max_inflow),
        format_currency(summary.performance.max_outflow)
    );
    if !summary.monthly.is_empty() {
        println!("\nMês       Receitas         Despesas         Resultado");
        for point in &summary.monthly {
            println!(
                "{}   {:>15}  {:>15}  {:>15}",
                point.month,
                format_currency(point.revenue),
                format_currency(point.expenses),
                format_currency(point.net)
            );
        }
    }
    if !summary.categories.is_empty() {
        println!("\nDespesas por categoria:");
        for category in &summary.categories {
            println!("  {}: {}", category.category, format_currency(category.amount));
        }
    }
    Ok(())
}

async fn transactions_command(cmd: TransactionsCommand, ctx: &CommandContext) -> Result<()> {
    match cmd {
        TransactionsCommand::List(args) => {
            let store = ctx.store.lock().await;
            list_transactions(store.data(), args)
        }
        TransactionsCommand::Show { id } => {
            let store = ctx.store.lock().await;
            let tx = transactions::get(store.data(), &id)?;
            println!("{}", serde_json::to_string_pretty(tx)?);
            Ok(())
        }
        TransactionsCommand::Edit(args) => {
            let mut store = ctx.store.lock().await;
            let id = args.id.clone();
            transactions::edit(store.data_mut(), &id, edit_from_args(args))?;
            store.save().await?;
            println!("✅ Transaction {} updated", id);
            Ok(())
        }
        TransactionsCommand::Delete { id } => {
            let mut store = ctx.store.lock().await;
            let removed = transactions::delete(store.data_mut(), &id)?;
            store.save().await?;
            println!("✅ Deleted {} ({})", removed.id, removed.description);
            Ok(())
        }
    }
}

fn list_transactions(data: &AppData, args: ListArgs) -> Result<()> {
    let filter = TransactionFilter {
        search: args.search,
        status: args.status,
        date_from: args.from,
        date_to: args.to,
    };
    let sort = SortSpec {
        key: args.sort,
        descending: !args.asc,
    };
    let per_page = args.per_page.unwrap_or(data.settings.items_per_page);
    let page = transactions::query(&data.transactions, &filter, &sort, args.page, per_page)?;

    for tx in &page.items {
        println!(
            "{:<20} {:<10} {:>14} {:>14}  {:<11} {}",
            tx.id,
            tx.date.map(format_date).unwrap_or_else(|| "-".to_string()),
            format_currency(tx.inflow),
            format_currency(tx.outflow),
            tx.status.as_str(),
            tx.description
        );
    }
    println!(
        "Page {}/{} ({} transaction(s))",
        page.page, page.total_pages, page.total_items
    );
    Ok(())
}

fn edit_from_args(args: EditArgs) -> TransactionEdit {
    TransactionEdit {
        date: args.date,
        description: args.description,
        payee: args.payee,
        bank: args.bank,
        inflow: args.inflow,
        outflow: args.outflow,
        cost_center: args.cost_center,
        contract_note: args.contract_note,
        notes: args.notes,
    }
}

/// Pending ids in review order, with `skip` ids moved to the back.
fn queue_order(transactions: &[Transaction], skip: &[String]) -> Vec<String> {
    let mut queue = ReconciliationQueue::new(transactions);
    for id in skip {
        if !queue.skip(id) {
            tracing::warn!("⚠️ {} is not pending reconciliation, nothing to skip", id);
        }
    }
    queue.ids().map(str::to_string).collect()
}

async fn reconcile_command(cmd: ReconcileCommand, ctx: &CommandContext) -> Result<()> {
    match cmd {
        ReconcileCommand::Queue { skip } => {
            let store = ctx.store.lock().await;
            let queue = queue_order(store.transactions(), &skip);
            if queue.is_empty() {
                println!("✅ Nothing left to reconcile");
            }
            for tx in queue.iter().filter_map(|id| store.data().find(id)) {
                println!(
                    "{}  {}  {}  {}",
                    tx.id,
                    tx.date.map(format_date).unwrap_or_else(|| "-".to_string()),
                    format_currency(tx.value()),
                    tx.description
                );
                if let Some(suggestion) = suggest_classification(tx) {
                    println!(
                        "    💡 {} › {} › {}",
                        suggestion.level1, suggestion.level2, suggestion.level3
                    );
                }
            }
            Ok(())
        }
        ReconcileCommand::Apply(args) => {
            let mut store = ctx.store.lock().await;
            let id = args.id.clone();
            let form = reconcile_form(store.data(), args)?;
            reconcile(store.data_mut(), &id, form)?;
            store.save().await?;
            println!("✅ Transaction {} reconciled", id);
            Ok(())
        }
        ReconcileCommand::Options { level, parents } => {
            let store = ctx.store.lock().await;
            let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
            for option in classification_options(&store.data().chart_of_accounts, level, &parents)? {
                println!("{}", option);
            }
            Ok(())
        }
    }
}

fn reconcile_form(data: &AppData, args: ApplyArgs) -> Result<ReconcileForm> {
    let mut cost_center = args.cost_center;
    let classification = if args.repeat_last {
        let last = last_classification(&data.transactions)
            .ok_or_else(|| CfoError::validation("No reconciled transaction to repeat"))?;
        if cost_center.is_empty() {
            cost_center = last.cost_center;
        }
        last.classification
    } else if let Some(level1) = args.level1 {
        Classification {
            level1,
            level2: args.level2,
            level3: args.level3,
        }
    } else if args.suggest {
        let tx = data
            .find(&args.id)
            .ok_or_else(|| CfoError::not_found("transaction", args.id.as_str()))?;
        suggest_classification(tx)
            .ok_or_else(|| CfoError::validation("No suggestion matches this description"))?
    } else {
        return Err(CfoError::validation(
            "Give --level1, --suggest or --repeat-last",
        ));
    };

    Ok(ReconcileForm {
        classification,
        cost_center,
        contract_note: args.contract_note,
        notes: args.notes,
    })
}

async fn report_command(args: ReportArgs, ctx: &CommandContext) -> Result<()> {
    let period = match (args.from, args.to) {
        (Some(from), Some(to)) => ReportPeriod::custom(from, to)?,
        _ => args.period.parse()?,
    };
    let today = today();
    let store = ctx.store.lock().await;
    let txs = store.transactions();

    let csv = match args.kind {
        ReportKind::Dre => {
            let report = reports::dre(txs, period, today);
            println!("DRE - {}", report.period);
            println!("Receitas:            {}", format_currency(report.total_revenue));
            for (category, amount) in &report.revenue_by_category {
                println!("  {}: {}", category, format_currency(*amount));
            }
            println!("Despesas:            {}", format_currency(report.total_expenses));
            for (category, amount) in &report.expenses_by_category {
                println!("  {}: {}", category, format_currency(*amount));
            }
            println!("Resultado Financeiro: {}", format_currency(report.financial_result));
            println!(
                "Resultado Operacional: {} ({})",
                format_currency(report.operational_result),
                percent(report.operational_margin)
            );
            println!(
                "Resultado Líquido:   {} ({})",
                format_currency(report.net_result),
                percent(report.net_margin)
            );
            reports::dre_csv(&report)
        }
        ReportKind::Cashflow => {
            let report = reports::cashflow(txs, period, today);
            println!("Fluxo de Caixa - {}", report.period);
            for month in &report.months {
                println!(
                    "{}  {:>15} {:>15} {:>15} {:>15}",
                    month.month,
                    format_currency(month.revenue),
                    format_currency(month.expenses),
                    format_currency(month.result),
                    format_currency(month.accumulated)
                );
            }
            println!(
                "Total: receitas {}  despesas {}  resultado {}  média mensal {}",
                format_currency(report.total_revenue),
                format_currency(report.total_expenses),
                format_currency(report.net_result),
                format_currency(report.average_monthly)
            );
            reports::cashflow_csv(&report)
        }
        ReportKind::Balance => {
            let report = reports::balance(txs, period, today);
            println!("Balancete - {}", report.period);
            for line in &report.lines {
                println!(
                    "{} › {} › {}: {}",
                    line.level1,
                    line.level2,
                    line.level3,
                    format_currency(line.net)
                );
            }
            println!(
                "TOTAL: entradas {}  saídas {}  saldo {}",
                format_currency(report.total_inflow),
                format_currency(report.total_outflow),
                format_currency(report.net)
            );
            reports::balance_csv(&report)
        }
    }?;

    if let Some(path) = args.csv {
        write_output(&path, csv.as_bytes()).await?;
    }
    Ok(())
}

fn print_projection(
    transactions: &[Transaction],
    horizon: u32,
    method: projection::ProjectionMethod,
) {
    let projections = projection::project_transactions(transactions, horizon, method);
    if projections.is_empty() {
        println!(
            "⚠️  At least {} months of history are needed for a projection",
            projection::MIN_HISTORY_MONTHS
        );
        return;
    }
    for p in &projections {
        println!(
            "{}  receitas {:>15}  despesas {:>15}  resultado {:>15}  acumulado {:>15}  confiança {:.0}%",
            p.month,
            format_currency(p.revenue),
            format_currency(p.expenses),
            format_currency(p.result),
            format_currency(p.accumulated),
            p.confidence * 100.0
        );
    }
    for alert in projection::risk_alerts(&projections) {
        let icon = match alert.level {
            projection::AlertLevel::Error => "❌",
            projection::AlertLevel::Warning => "⚠️ ",
            projection::AlertLevel::Info => "ℹ️ ",
        };
        println!("{} {}: {}", icon, alert.title, alert.message);
    }
}

fn print_audit(report: &audit::AuditReport) {
    if report.is_clean() {
        println!("✅ No issues found");
        return;
    }
    println!("Issues found: {}", report.total_issues());
    let sections: [(&str, &Vec<String>); 3] = [
        ("Unclassified", &report.unclassified),
        ("Incomplete", &report.incomplete),
        ("Outliers", &report.outliers),
    ];
    for (title, ids) in sections {
        if !ids.is_empty() {
            println!("{} ({}): {}", title, ids.len(), ids.join(", "));
        }
    }
    for pair in &report.duplicates {
        println!("Duplicate: {} repeats {}", pair.duplicate_id, pair.original_id);
    }
    for issue in report.date_issues.iter().chain(&report.balance_issues) {
        println!("{}: {}", issue.transaction_id, issue.kind);
    }
}

async fn accounts_command(cmd: AccountsCommand, ctx: &CommandContext) -> Result<()> {
    let mut store = ctx.store.lock().await;
    match cmd {
        AccountsCommand::List => {
            for (category, subcategories) in store.data().chart_of_accounts.iter() {
                println!("{}", category);
                for (subcategory, accounts) in subcategories {
                    println!("  {}", subcategory);
                    for account in accounts {
                        println!("    {}", account);
                    }
                }
            }
            return Ok(());
        }
        AccountsCommand::Add { path } => {
            let chart = &mut store.data_mut().chart_of_accounts;
            match AccountPath::parse(&path)? {
                AccountPath::Category(l1) => chart.add_category(&l1)?,
                AccountPath::Subcategory(l1, l2) => chart.add_subcategory(&l1, &l2)?,
                AccountPath::Account(l1, l2, l3) => chart.add_account(&l1, &l2, &l3)?,
            }
            println!("✅ Added {}", path);
        }
        AccountsCommand::Rename { path, new_name } => {
            let changed = chart::rename_account(store.data_mut(), &path, &new_name)?;
            println!("✅ Renamed; {} transaction(s) relabelled", changed);
        }
        AccountsCommand::Delete { path } => {
            let orphans = chart::delete_account(store.data_mut(), &path)?;
            println!("✅ Deleted {}", path);
            if orphans > 0 {
                println!("⚠️  {} transaction(s) still use this classification", orphans);
            }
        }
        AccountsCommand::Export { output } => {
            let json = store.data().chart_of_accounts.export_json()?;
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "plano_contas_{}.json",
                    chrono::Local::now().format("%Y-%m-%d")
                ))
            });
            return write_output(&path, json.as_bytes()).await;
        }
        AccountsCommand::Import { file } => {
            let content = tokio::fs::read_to_string(&file).await?;
            let chart = ChartOfAccounts::import_json(&content)?;
            let categories = chart.len();
            store.data_mut().chart_of_accounts = chart;
            println!("✅ Imported chart with {} categories", categories);
        }
    }
    store.save().await
}

async fn settings_command(cmd: SettingsCommand, ctx: &CommandContext) -> Result<()> {
    let mut store = ctx.store.lock().await;
    match cmd {
        SettingsCommand::Show => {
            let s = store.settings();
            let key = if s.gemini_api_key.is_empty() {
                "(not set)"
            } else {
                "(configured)"
            };
            println!("gemini_api_key: {}", key);
            println!("auto_backup:    {}", s.auto_backup);
            println!("debug_mode:     {}", s.debug_mode);
            println!("items_per_page: {}", s.items_per_page);
            match s.last_backup {
                Some(at) => println!("last_backup:    {}", at.format("%d/%m/%Y %H:%M:%S")),
                None => println!("last_backup:    never"),
            }
            let k = ctx
                .kpi_cache
                .lock()
                .await
                .get_or_compute(store.revision(), store.transactions());
            println!(
                "margin:         {}%",
                format_percent(k.net_result, k.total_revenue)
            );
            Ok(())
        }
        SettingsCommand::Set { key, value } => {
            store.set_setting(&key, &value).await?;
            println!("✅ {} updated", key);
            Ok(())
        }
    }
}

/// The stored key wins over the one in the config file.
fn assistant_client(config: &AppConfig, data: &AppData) -> Result<GeminiClient> {
    let settings = config.assistant.gemini.clone();
    if data.settings.gemini_api_key.trim().is_empty() {
        if let Some(key) = config.api_key() {
            return GeminiClient::new(settings, key);
        }
    }
    GeminiClient::from_data(settings, data)
}
