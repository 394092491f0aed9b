mod common;

use anyhow::Result;
use bytes::Bytes;
use salesmart_bucket::{BucketStore, MemoryBucketStore};
use salesmart_core::config::{AppConfig, LocalPaths};
use salesmart_core::driver::{run, PipelineContext};
use salesmart_core::error::PipelineError;
use salesmart_core::staging::{MemoryStagingLedger, StagingStatus};
use salesmart_core::warehouse::MemoryWarehouse;

use common::{dimensions, HEADER};

async fn seed_bucket(store: &MemoryBucketStore) -> Result<()> {
    let files = [
        (
            "sales_data/sales_1.csv",
            format!("{HEADER}\n1,121,sugar,2024-01-05,1,50,2,100\n2,121,maida,2024-01-06,2,20,5,100\n"),
        ),
        (
            "sales_data/sales_2.csv",
            format!(
                "{HEADER},payment_mode\n\
                 3,122,besan,2024-02-10,5,52,1,52,cash\n\
                 1,121,sugar,2024-01-20,1,50,4,200,UPI\n\
                 2,122,tata salt,2024-02-11,6,20,3,60,card\n"
            ),
        ),
        (
            "sales_data/sales_bad.csv",
            "customer_id,store_id,product_name,sales_date,sales_person_id,price,total_cost\n\
             1,121,sugar,2024-01-05,1,50,100\n"
                .to_string(),
        ),
    ];
    for (key, body) in files {
        store.put_object(key, Bytes::from(body), "text/csv").await?;
    }
    Ok(())
}

fn is_empty_dir(path: &std::path::Path) -> bool {
    std::fs::read_dir(path).map(|mut entries| entries.next().is_none()).unwrap_or(true)
}

#[tokio::test]
async fn full_run_quarantines_bad_files_and_closes_the_ledger() -> Result<()> {
    let workdir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.object_store.bucket = "test".into();
    config.paths = LocalPaths::under(workdir.path());
    std::fs::create_dir_all(&config.paths.error_dir)?;

    let store = MemoryBucketStore::new("test");
    seed_bucket(&store).await?;
    let ledger = MemoryStagingLedger::new();
    let warehouse = MemoryWarehouse::new(dimensions());
    let ctx = PipelineContext {
        config: &config,
        store: &store,
        ledger: &ledger,
        warehouse: &warehouse,
    };

    let report = run(&ctx).await?;

    assert_eq!(report.correct_files, vec!["sales_1.csv", "sales_2.csv"]);
    assert_eq!(report.error_files, vec!["sales_bad.csv"]);
    assert_eq!(report.normalized_rows, 5);
    assert_eq!(report.enriched_rows, 5);
    assert_eq!(report.ledger_rows_ingested, 2);

    // Bad file quarantined on both sides.
    assert!(store.contains("sales_data_error/sales_bad.csv"));
    assert!(config.paths.error_dir.join("sales_bad.csv").is_file());

    // Processed sources moved out of the source prefix.
    assert!(store.contains("sales_data_processed/sales_1.csv"));
    assert!(store.contains("sales_data_processed/sales_2.csv"));
    assert!(store.list_objects("sales_data/").await?.is_empty());

    // Mart outputs uploaded under timestamped prefixes.
    let keys = store.keys();
    assert!(keys.iter().any(|k| k.starts_with("customer_data_mart/") && k.ends_with(".parquet")));
    assert!(keys.iter().any(|k| k.starts_with("sales_data_mart/") && k.ends_with(".parquet")));
    assert!(keys
        .iter()
        .any(|k| k.starts_with("sales_partitioned_data_mart/") && k.contains("/sales_month=2024-02/store_id=122/")));

    // Ledger: only the good files, both closed out.
    let rows = ledger.snapshot();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.status == StagingStatus::Ingested));
    assert!(rows.iter().all(|row| row.updated_date.is_some()));
    assert_eq!(rows[0].file_location, "sales_data/sales_1.csv");
    assert!(rows.iter().all(|row| row.file_name != "sales_bad.csv"));

    assert_eq!(warehouse.customer_mart_rows().len(), 4);
    let team = warehouse.sales_team_mart_rows();
    assert_eq!(team.len(), 4);
    assert_eq!(team.iter().filter(|row| row.incentive > 0.0).count(), 2);

    for dir in [
        &config.paths.download_dir,
        &config.paths.customer_mart_dir,
        &config.paths.sales_mart_dir,
        &config.paths.sales_partitioned_dir,
    ] {
        assert!(is_empty_dir(dir), "{} should be empty", dir.display());
    }

    // Nothing left to process: the rerun stops before touching the ledger.
    let err = run(&ctx).await.expect_err("rerun has no input");
    assert!(matches!(err, PipelineError::NoInput(_)));
    assert_eq!(ledger.snapshot().len(), 2);
    assert_eq!(warehouse.customer_mart_rows().len(), 4);
    Ok(())
}

#[tokio::test]
async fn missing_error_directory_leaves_file_in_place() -> Result<()> {
    let workdir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.paths = LocalPaths::under(workdir.path());

    let store = MemoryBucketStore::new("test");
    seed_bucket(&store).await?;
    let ledger = MemoryStagingLedger::new();
    let warehouse = MemoryWarehouse::new(dimensions());

    let report = run(&PipelineContext {
        config: &config,
        store: &store,
        ledger: &ledger,
        warehouse: &warehouse,
    })
    .await?;

    assert_eq!(report.quarantine.skipped.len(), 1);
    assert!(report.quarantine.moved.is_empty());
    assert!(!store.contains("sales_data_error/sales_bad.csv"));
    // Still under the source prefix for a later run to pick up.
    assert!(store.contains("sales_data/sales_bad.csv"));
    Ok(())
}

#[tokio::test]
async fn empty_bucket_is_no_input() -> Result<()> {
    let workdir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.paths = LocalPaths::under(workdir.path());

    let store = MemoryBucketStore::new("test");
    let ledger = MemoryStagingLedger::new();
    let warehouse = MemoryWarehouse::new(dimensions());

    let err = run(&PipelineContext {
        config: &config,
        store: &store,
        ledger: &ledger,
        warehouse: &warehouse,
    })
    .await
    .expect_err("nothing to process");

    assert!(matches!(err, PipelineError::NoInput(_)));
    assert!(ledger.snapshot().is_empty());
    Ok(())
}
