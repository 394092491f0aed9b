//! End-to-end run: list, download, validate, quarantine, stage, transform,
//! publish, move processed sources, clean up, and close out the ledger.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use salesmart_bucket::{join_key, key_file_name, BucketStore};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, IncentiveConfig, LocalPaths};
use crate::dimensions::{self, DimensionTables};
use crate::error::{PipelineError, Result};
use crate::gateway;
use crate::marts::{self, CustomerMartRow, SalesTeamMartRow};
use crate::outputs;
use crate::quarantine::{self, QuarantineReport};
use crate::reconcile::ColumnReconciler;
use crate::schema::SchemaValidator;
use crate::staging::{self, PriorRunStatus, StagingEntry, StagingLedger};
use crate::warehouse::Warehouse;
use crate::workspace;

pub const PARTITION_KEYS: [&str; 2] = ["sales_month", "store_id"];

/// Collaborators for one run.
pub struct PipelineContext<'a> {
    pub config: &'a AppConfig,
    pub store: &'a dyn BucketStore,
    pub ledger: &'a dyn StagingLedger,
    pub warehouse: &'a dyn Warehouse,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub prior_run: PriorRunStatus,
    pub listed_keys: Vec<String>,
    pub correct_files: Vec<String>,
    pub error_files: Vec<String>,
    pub quarantine: QuarantineReport,
    pub normalized_rows: usize,
    pub enriched_rows: usize,
    pub customer_mart_rows: usize,
    pub sales_team_mart_rows: usize,
    pub uploaded_keys: Vec<String>,
    pub processed_keys: Vec<String>,
    pub ledger_rows_ingested: u64,
}

/// Result of the blocking dataframe stage.
#[derive(Debug)]
struct TransformOutput {
    normalized_rows: usize,
    enriched_rows: usize,
    customer_rows: Vec<CustomerMartRow>,
    sales_rows: Vec<SalesTeamMartRow>,
}

pub async fn run(ctx: &PipelineContext<'_>) -> Result<RunReport> {
    let config = ctx.config;
    let paths = &config.paths;
    let prefixes = &config.object_store;
    let run_id = Uuid::new_v4();
    info!(%run_id, bucket = ctx.store.bucket(), "Starting sales ETL run");

    let prior_run = staging::check_prior_run(ctx.ledger, &paths.download_dir).await?;

    let listed_keys = gateway::list_source_files(ctx.store, &prefixes.source_prefix).await?;
    if listed_keys.is_empty() {
        return Err(PipelineError::NoInput(format!(
            "no files available under '{}'",
            prefixes.source_prefix
        )));
    }
    gateway::download_files(ctx.store, &listed_keys, &paths.download_dir).await?;

    let local_files = workspace::list_files(&paths.download_dir)?;
    if local_files.is_empty() {
        return Err(PipelineError::NoInput("local download directory is empty".into()));
    }
    if !local_files.iter().any(|path| workspace::is_csv(path)) {
        return Err(PipelineError::NoInput("no CSV data available to process".into()));
    }

    let validator = SchemaValidator::new(config.schema.mandatory_columns.iter().cloned());
    let partition = validator.partition(&local_files)?;
    let correct_files = partition.correct_names();
    let error_files: Vec<String> = partition.error.iter().map(|p| workspace::file_name(p)).collect();

    let quarantine = quarantine::quarantine_files(
        ctx.store,
        &partition.error,
        &paths.error_dir,
        &prefixes.source_prefix,
        &prefixes.error_prefix,
    )
    .await?;

    if correct_files.is_empty() {
        return Err(PipelineError::NoInput("no correct files to process".into()));
    }

    let locations: HashMap<&str, &str> = listed_keys
        .iter()
        .map(|key| (key_file_name(key), key.as_str()))
        .collect();
    let entries: Vec<StagingEntry> = correct_files
        .iter()
        .map(|name| StagingEntry {
            file_name: name.clone(),
            file_location: locations
                .get(name.as_str())
                .map(|key| key.to_string())
                .unwrap_or_else(|| join_key(&prefixes.source_prefix, name)),
        })
        .collect();
    ctx.ledger
        .insert_active(&entries, Utc::now().naive_utc())
        .await?;

    let dims = ctx.warehouse.load_dimensions().await?;

    let output = {
        let files = partition.correct.clone();
        let paths = paths.clone();
        let incentive = config.incentive;
        tokio::task::spawn_blocking(move || {
            transform(&files, &dims, &paths, &incentive, run_id)
        })
        .await??
    };

    let stamp = outputs::epoch_millis().to_string();
    let mut uploaded_keys = Vec::new();
    for (dir, prefix) in [
        (&paths.customer_mart_dir, &prefixes.customer_mart_prefix),
        (&paths.sales_mart_dir, &prefixes.sales_mart_prefix),
        (&paths.sales_partitioned_dir, &prefixes.sales_partitioned_prefix),
    ] {
        let keys = gateway::upload_directory(ctx.store, dir, &join_key(prefix, &stamp)).await?;
        uploaded_keys.extend(keys);
    }

    ctx.warehouse.write_customer_mart(&output.customer_rows).await?;
    ctx.warehouse.write_sales_team_mart(&output.sales_rows).await?;

    let mut processed_keys = Vec::new();
    for name in &correct_files {
        let moved = gateway::move_file(
            ctx.store,
            &prefixes.source_prefix,
            &prefixes.processed_prefix,
            name,
        )
        .await?;
        processed_keys.extend(moved);
    }

    for dir in [
        &paths.download_dir,
        &paths.customer_mart_dir,
        &paths.sales_mart_dir,
        &paths.sales_partitioned_dir,
    ] {
        workspace::clear_directory(dir)?;
    }
    info!("Cleared local working directories");

    let ledger_rows_ingested = finalize_ledger(ctx.ledger, &correct_files).await?;

    let report = RunReport {
        run_id,
        prior_run,
        listed_keys,
        correct_files,
        error_files,
        quarantine,
        normalized_rows: output.normalized_rows,
        enriched_rows: output.enriched_rows,
        customer_mart_rows: output.customer_rows.len(),
        sales_team_mart_rows: output.sales_rows.len(),
        uploaded_keys,
        processed_keys,
        ledger_rows_ingested,
    };
    info!(
        %run_id,
        files = report.correct_files.len(),
        rows = report.normalized_rows,
        uploaded = report.uploaded_keys.len(),
        "Sales ETL run finished"
    );
    Ok(report)
}

/// `A -> I` for every processed file, with one shared timestamp.
async fn finalize_ledger(ledger: &dyn StagingLedger, files: &[String]) -> Result<u64> {
    if files.is_empty() {
        return Err(PipelineError::LedgerNotUpdated(
            "no processed files to mark as ingested".into(),
        ));
    }

    let changed = ledger
        .mark_ingested(files, Utc::now().naive_utc())
        .await?;
    if changed < files.len() as u64 {
        warn!(
            expected = files.len(),
            changed,
            "Fewer staging rows moved to status I than files processed"
        );
    }
    info!(rows = changed, "Staging rows marked as ingested");
    Ok(changed)
}

/// Dataframe stage; runs on a blocking worker.
fn transform(
    files: &[PathBuf],
    dims: &DimensionTables,
    paths: &LocalPaths,
    incentive: &IncentiveConfig,
    run_id: Uuid,
) -> Result<TransformOutput> {
    let normalized = ColumnReconciler::new().normalize(files)?;
    let normalized_rows = normalized.height();

    let enriched = dimensions::enrich(normalized, dims)?;
    let enriched_rows = enriched.height();

    let customer_projection = marts::customer_projection(&enriched)?;
    outputs::write_parquet(&customer_projection, &paths.customer_mart_dir, run_id)?;
    let customer_rows = marts::customer_mart(&customer_projection)?;

    let sales_projection = marts::sales_projection(&enriched)?;
    outputs::write_parquet(&sales_projection, &paths.sales_mart_dir, run_id)?;
    outputs::write_partitioned(
        &sales_projection,
        &paths.sales_partitioned_dir,
        &PARTITION_KEYS,
        run_id,
    )?;
    let sales_rows = marts::sales_team_mart(&sales_projection, incentive)?;

    Ok(TransformOutput {
        normalized_rows,
        enriched_rows,
        customer_rows,
        sales_rows,
    })
}
