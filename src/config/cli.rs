use crate::app::projection::{ProjectionMethod, MAX_HORIZON};
use crate::app::transactions::{SortKey, StatusFilter};
use crate::domain::values::{parse_amount, parse_date};
use crate::utils::error::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cfo-pro")]
#[command(version, about = "Local financial ledger for bank statements")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = super::toml_config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Overrides storage.data_dir from the config file
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Log process CPU and memory around imports")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a bank statement CSV, replacing the ledger
    Import { file: PathBuf },
    /// Print (or write) the example statement
    SampleCsv {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show KPIs, pending counts and monthly totals
    Dashboard {
        #[arg(long)]
        json: bool,
    },
    #[command(subcommand)]
    Transactions(TransactionsCommand),
    #[command(subcommand)]
    Reconcile(ReconcileCommand),
    /// Income statement, cash flow or balance
    Report(ReportArgs),
    /// Project future months from history
    Project {
        /// Months to project (1-24)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=MAX_HORIZON as i64))]
        months: Option<u32>,
        #[arg(long)]
        method: Option<ProjectionMethod>,
    },
    /// Run the ledger audit
    Audit {
        /// Delete duplicate copies after auditing
        #[arg(long)]
        fix_duplicates: bool,
    },
    #[command(subcommand)]
    Accounts(AccountsCommand),
    /// Convert a statement to the standard layout
    Convert {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the ledger as a ZIP with CSV, TSV and JSON
    Bundle {
        #[arg(short, long, default_value = "transacoes.zip")]
        output: PathBuf,
    },
    /// Ask the assistant about the ledger
    Chat {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Verify a Gemini API key and store it
    ChatTest { key: String },
    /// Create a manual backup, or list existing ones
    Backup {
        #[arg(long)]
        list: bool,
    },
    /// Export all data as JSON
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore a backup by file name, or import an exported file
    Restore {
        /// Backup file name under backups/
        name: Option<String>,
        /// Path to an exported JSON file
        #[arg(long, conflicts_with = "name")]
        file: Option<PathBuf>,
    },
    /// Delete all data and backups and start over with the example data
    Clear {
        #[arg(long)]
        yes: bool,
    },
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Run auto-save and auto-backup until Ctrl-C
    Daemon,
}

#[derive(Debug, Subcommand)]
pub enum TransactionsCommand {
    List(ListArgs),
    Show { id: String },
    Edit(EditArgs),
    Delete { id: String },
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(short, long, default_value = "")]
    pub search: String,
    #[arg(long, default_value = "all")]
    pub status: StatusFilter,
    #[arg(long, value_parser = parse_cli_date)]
    pub from: Option<NaiveDate>,
    #[arg(long, value_parser = parse_cli_date)]
    pub to: Option<NaiveDate>,
    /// date, value, or a column name such as "Centro de Custo"
    #[arg(long, default_value = "date")]
    pub sort: SortKey,
    #[arg(long)]
    pub asc: bool,
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,
    #[arg(long)]
    pub per_page: Option<usize>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    pub id: String,
    #[arg(long, value_parser = parse_cli_date)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub payee: Option<String>,
    #[arg(long)]
    pub bank: Option<String>,
    #[arg(long, value_parser = parse_cli_amount, allow_hyphen_values = true)]
    pub inflow: Option<Decimal>,
    #[arg(long, value_parser = parse_cli_amount, allow_hyphen_values = true)]
    pub outflow: Option<Decimal>,
    #[arg(long)]
    pub cost_center: Option<String>,
    #[arg(long)]
    pub contract_note: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ReconcileCommand {
    /// List pending transactions with a suggested classification
    Queue {
        /// Move these transaction ids to the back of the queue
        #[arg(long, value_name = "ID")]
        skip: Vec<String>,
    },
    /// Classify a transaction and mark it reconciled
    Apply(ApplyArgs),
    /// Show classification options for a level
    Options {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=3))]
        level: u8,
        parents: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    pub id: String,
    #[arg(long)]
    pub level1: Option<String>,
    #[arg(long, default_value = "")]
    pub level2: String,
    #[arg(long, default_value = "")]
    pub level3: String,
    #[arg(long, default_value = "")]
    pub cost_center: String,
    #[arg(long, default_value = "")]
    pub contract_note: String,
    #[arg(long, default_value = "")]
    pub notes: String,
    /// Use the keyword suggestion when no level 1 is given
    #[arg(long)]
    pub suggest: bool,
    /// Reuse the last reconciled classification
    #[arg(long)]
    pub repeat_last: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Dre,
    Cashflow,
    Balance,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[arg(value_enum)]
    pub kind: ReportKind,
    /// all, current-month, last-month or current-year
    #[arg(long, default_value = "all")]
    pub period: String,
    #[arg(long, value_parser = parse_cli_date, requires = "to")]
    pub from: Option<NaiveDate>,
    #[arg(long, value_parser = parse_cli_date, requires = "from")]
    pub to: Option<NaiveDate>,
    /// Write the report as CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum AccountsCommand {
    List,
    /// Add a node: `l1`, `l1|l2` or `l1|l2|l3`
    Add { path: String },
    Rename { path: String, new_name: String },
    Delete { path: String },
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Import { file: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    /// gemini_api_key, auto_backup, debug_mode or items_per_page
    Set { key: String, value: String },
}

fn parse_cli_date(input: &str) -> Result<NaiveDate> {
    parse_date(input)
}

fn parse_cli_amount(input: &str) -> Result<Decimal> {
    parse_amount(input)
}
