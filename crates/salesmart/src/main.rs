use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use salesmart_bucket::{S3BucketStore, S3Config};
use salesmart_core::config::AppConfig;
use salesmart_core::credentials::resolve_credentials;
use salesmart_core::driver::{self, PipelineContext};
use salesmart_core::schema::{FileVerdict, SchemaValidator};
use salesmart_core::staging::PgStagingLedger;
use salesmart_core::warehouse::PgWarehouse;
use salesmart_core::db;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily sales ETL driver", long_about = None)]
struct Cli {
    /// Config file (defaults to $SALESMART_CONFIG, then salesmart.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full ETL pipeline once
    Run(RunArgs),
    /// Run database migrations
    Migrate,
    /// Check local files against the mandatory columns without side effects
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Apply embedded migrations before running
    #[arg(long)]
    migrate: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Files to check
    #[arg(required = true)]
    files: Vec<PathBuf>,
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
        Command::Run(args) => handle_run(&config, args).await,
        Command::Migrate => {
            let pool = connect_pool(&config).await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
        Command::Validate(args) => handle_validate(&config, args),
    }
}

async fn handle_run(config: &AppConfig, args: RunArgs) -> Result<()> {
    let pool = connect_pool(config).await?;
    if args.migrate {
        db::run_migrations(&pool).await?;
    }

    let object_store = &config.object_store;
    let credentials = resolve_credentials(
        object_store.access_key.as_deref(),
        object_store.secret_key.as_deref(),
        object_store.credentials_encrypted,
        &config.encryption,
    )
    .context("failed to decrypt object store credentials")?;

    let store = S3BucketStore::new(S3Config {
        bucket: object_store.bucket.clone(),
        region: object_store.region.clone(),
        endpoint: object_store.endpoint.clone(),
        access_key_id: credentials.as_ref().map(|c| c.access_key_id.clone()),
        secret_access_key: credentials.as_ref().map(|c| c.secret_access_key.clone()),
        force_path_style: object_store.force_path_style,
    })
    .await
    .context("failed to configure object store")?;

    let ledger = PgStagingLedger::new(pool.clone(), config.tables.staging.clone());
    let warehouse = PgWarehouse::new(pool, config.tables.clone());

    let report = driver::run(&PipelineContext {
        config,
        store: &store,
        ledger: &ledger,
        warehouse: &warehouse,
    })
    .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn handle_validate(config: &AppConfig, args: ValidateArgs) -> Result<()> {
    let validator = SchemaValidator::new(config.schema.mandatory_columns.iter().cloned());

    let mut failures = 0;
    for path in &args.files {
        let check = validator
            .check_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match check.verdict {
            FileVerdict::Correct => println!("ok       {}", path.display()),
            FileVerdict::NotCsv => {
                failures += 1;
                println!("error    {} (not a CSV file)", path.display());
            }
            FileVerdict::MissingColumns(missing) => {
                failures += 1;
                println!("error    {} (missing: {})", path.display(), missing.join(", "));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} files failed schema validation", args.files.len());
    }
    Ok(())
}

async fn connect_pool(config: &AppConfig) -> Result<db::DbPool> {
    let database_url = config.database_url()?;
    let pool = db::connect(database_url, config.database.max_connections)
        .await
        .context("failed to connect to the database")?;
    Ok(pool)
}
