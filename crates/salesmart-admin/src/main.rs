use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use salesmart_core::config::AppConfig;
use salesmart_core::credentials::SecretCipher;
use salesmart_core::db;
use salesmart_core::sample::{self, SampleOptions};
use salesmart_core::staging::{PgStagingLedger, StagingLedger, StagingStatus};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Salesmart administrative tooling", long_about = None)]
struct Cli {
    /// Config file (defaults to $SALESMART_CONFIG, then salesmart.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show staging ledger rows, e.g. to find files stuck at status A
    Ledger(LedgerArgs),
    /// Print the encrypted form of a credential for the config file
    EncryptSecret(EncryptSecretArgs),
    /// Write deterministic sample sales CSV files
    GenerateSample(GenerateSampleArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusFilter {
    A,
    I,
}

impl From<StatusFilter> for StagingStatus {
    fn from(value: StatusFilter) -> Self {
        match value {
            StatusFilter::A => StagingStatus::Active,
            StatusFilter::I => StagingStatus::Ingested,
        }
    }
}

#[derive(Args, Debug)]
struct LedgerArgs {
    /// Only rows with this status
    #[arg(long, value_enum, ignore_case = true)]
    status: Option<StatusFilter>,
}

#[derive(Args, Debug)]
struct EncryptSecretArgs {
    plaintext: String,
}

#[derive(Args, Debug)]
struct GenerateSampleArgs {
    /// Output directory
    #[arg(long)]
    out: PathBuf,
    /// Rows per file
    #[arg(long, default_value_t = 100)]
    rows: usize,
    /// Number of files
    #[arg(long, default_value_t = 1)]
    files: usize,
    /// Append a payment_mode column outside the mandatory set
    #[arg(long)]
    extra_column: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Ledger(args) => handle_ledger(&config, args).await,
        Command::EncryptSecret(args) => {
            let cipher = SecretCipher::new(&config.encryption)?;
            println!("{}", cipher.encrypt(&args.plaintext));
            Ok(())
        }
        Command::GenerateSample(args) => {
            let written = sample::generate(
                &args.out,
                &SampleOptions {
                    rows_per_file: args.rows,
                    files: args.files,
                    extra_column: args.extra_column,
                },
            )?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

async fn handle_ledger(config: &AppConfig, args: LedgerArgs) -> Result<()> {
    let database_url = config.database_url()?;
    let pool = db::connect(database_url, config.database.max_connections)
        .await
        .context("failed to connect to the database")?;

    let ledger = PgStagingLedger::new(pool, config.tables.staging.clone());
    let records = ledger.records(args.status.map(StagingStatus::from)).await?;

    if records.is_empty() {
        println!("No staging rows found.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["file_name", "file_location", "created_date", "updated_date", "status"]);
    for record in &records {
        table.add_row(vec![
            record.file_name.clone(),
            record.file_location.clone(),
            record.created_date.to_string(),
            record
                .updated_date
                .map(|value| value.to_string())
                .unwrap_or_default(),
            record.status.code().to_string(),
        ]);
    }
    println!("{table}");

    let pending = records
        .iter()
        .filter(|record| record.status == StagingStatus::Active)
        .count();
    info!(rows = records.len(), pending, "Listed staging ledger");
    Ok(())
}
