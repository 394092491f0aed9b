//! Staging ledger: per-file processing status used as audit log and re-run guard.
//!
//! A row is inserted at `A` once a file passes schema validation and flips to
//! `I` only after its data has been written downstream. Rows are never deleted.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use tracing::{info, warn};

use crate::db::{self, DbPool};
use crate::error::{PipelineError, Result};
use crate::workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StagingStatus {
    /// Arrived: validated and inserted, downstream writes not yet confirmed.
    Active,
    /// Ingested: downstream writes finished.
    Ingested,
}

impl StagingStatus {
    pub fn code(self) -> &'static str {
        match self {
            StagingStatus::Active => "A",
            StagingStatus::Ingested => "I",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "A" => Some(StagingStatus::Active),
            "I" => Some(StagingStatus::Ingested),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagingRecord {
    pub file_name: String,
    pub file_location: String,
    pub created_date: NaiveDateTime,
    pub updated_date: Option<NaiveDateTime>,
    pub status: StagingStatus,
}

/// A file about to be recorded as `A`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingEntry {
    pub file_name: String,
    pub file_location: String,
}

#[async_trait]
pub trait StagingLedger: Send + Sync {
    /// Distinct names from `file_names` that still have an `A` row.
    async fn unfinished(&self, file_names: &[String]) -> Result<Vec<String>>;

    /// One `A` row per entry, each committed on its own.
    async fn insert_active(&self, entries: &[StagingEntry], created: NaiveDateTime) -> Result<()>;

    /// Flip `A` rows for `file_names` to `I`. Returns the number of rows changed.
    async fn mark_ingested(&self, file_names: &[String], updated: NaiveDateTime) -> Result<u64>;

    async fn records(&self, status: Option<StagingStatus>) -> Result<Vec<StagingRecord>>;
}

#[derive(Debug, FromRow)]
struct StagingRow {
    file_name: String,
    file_location: Option<String>,
    created_date: NaiveDateTime,
    updated_date: Option<NaiveDateTime>,
    status: String,
}

impl TryFrom<StagingRow> for StagingRecord {
    type Error = PipelineError;

    fn try_from(row: StagingRow) -> Result<Self> {
        let status = StagingStatus::from_code(&row.status).ok_or_else(|| {
            PipelineError::Processing(format!(
                "staging row for '{}' has unknown status '{}'",
                row.file_name, row.status
            ))
        })?;
        Ok(StagingRecord {
            file_name: row.file_name,
            file_location: row.file_location.unwrap_or_default(),
            created_date: row.created_date,
            updated_date: row.updated_date,
            status,
        })
    }
}

/// Ledger backed by the staging table. `table` must already be a validated identifier.
#[derive(Debug, Clone)]
pub struct PgStagingLedger {
    pool: DbPool,
    table: String,
}

impl PgStagingLedger {
    pub fn new(pool: DbPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl StagingLedger for PgStagingLedger {
    async fn unfinished(&self, file_names: &[String]) -> Result<Vec<String>> {
        if file_names.is_empty() {
            return Ok(Vec::new());
        }

        let statement = format!(
            "SELECT DISTINCT file_name FROM {} WHERE file_name = ANY($1) AND status = 'A' ORDER BY file_name",
            self.table
        );
        let mut conn = db::unit_of_work(&self.pool, "staging_check").await?;
        let names: Vec<String> = sqlx::query_scalar(&statement)
            .bind(file_names.to_vec())
            .fetch_all(&mut *conn)
            .await?;
        Ok(names)
    }

    async fn insert_active(&self, entries: &[StagingEntry], created: NaiveDateTime) -> Result<()> {
        let statement = format!(
            "INSERT INTO {} (file_name, file_location, created_date, status) VALUES ($1, $2, $3, 'A')",
            self.table
        );
        let mut conn = db::unit_of_work(&self.pool, "staging_insert").await?;
        for entry in entries {
            sqlx::query(&statement)
                .bind(&entry.file_name)
                .bind(&entry.file_location)
                .bind(created)
                .execute(&mut *conn)
                .await?;
            info!(table = %self.table, file = %entry.file_name, "Inserted staging row with status A");
        }
        Ok(())
    }

    async fn mark_ingested(&self, file_names: &[String], updated: NaiveDateTime) -> Result<u64> {
        let statement = format!(
            "UPDATE {} SET status = 'I', updated_date = $1 WHERE file_name = $2 AND status = 'A'",
            self.table
        );
        let mut conn = db::unit_of_work(&self.pool, "staging_update").await?;
        let mut changed = 0;
        for name in file_names {
            let result = sqlx::query(&statement)
                .bind(updated)
                .bind(name)
                .execute(&mut *conn)
                .await?;
            if result.rows_affected() == 0 {
                warn!(table = %self.table, file = %name, "No staging row at status A to update");
            }
            changed += result.rows_affected();
        }
        Ok(changed)
    }

    async fn records(&self, status: Option<StagingStatus>) -> Result<Vec<StagingRecord>> {
        let statement = format!(
            r#"
                SELECT file_name, file_location, created_date, updated_date, status::text AS status
                FROM {}
                WHERE $1::text IS NULL OR status = $1
                ORDER BY created_date, file_name
            "#,
            self.table
        );
        let mut conn = db::unit_of_work(&self.pool, "staging_report").await?;
        let rows: Vec<StagingRow> = sqlx::query_as(&statement)
            .bind(status.map(StagingStatus::code))
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(StagingRecord::try_from).collect()
    }
}

/// In-process ledger for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStagingLedger {
    rows: Mutex<Vec<StagingRecord>>,
}

impl MemoryStagingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<StagingRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StagingRecord>> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StagingLedger for MemoryStagingLedger {
    async fn unfinished(&self, file_names: &[String]) -> Result<Vec<String>> {
        let wanted: BTreeSet<&str> = file_names.iter().map(String::as_str).collect();
        let found: BTreeSet<String> = self
            .lock()
            .iter()
            .filter(|row| row.status == StagingStatus::Active)
            .filter(|row| wanted.contains(row.file_name.as_str()))
            .map(|row| row.file_name.clone())
            .collect();
        Ok(found.into_iter().collect())
    }

    async fn insert_active(&self, entries: &[StagingEntry], created: NaiveDateTime) -> Result<()> {
        let mut rows = self.lock();
        for entry in entries {
            rows.push(StagingRecord {
                file_name: entry.file_name.clone(),
                file_location: entry.file_location.clone(),
                created_date: created,
                updated_date: None,
                status: StagingStatus::Active,
            });
        }
        Ok(())
    }

    async fn mark_ingested(&self, file_names: &[String], updated: NaiveDateTime) -> Result<u64> {
        let mut changed = 0;
        for row in self.lock().iter_mut() {
            if row.status == StagingStatus::Active && file_names.contains(&row.file_name) {
                row.status = StagingStatus::Ingested;
                row.updated_date = Some(updated);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn records(&self, status: Option<StagingStatus>) -> Result<Vec<StagingRecord>> {
        Ok(self
            .lock()
            .iter()
            .filter(|row| status.map_or(true, |wanted| row.status == wanted))
            .cloned()
            .collect())
    }
}

/// Outcome of the pre-flight look at leftovers from an earlier run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "files", rename_all = "snake_case")]
pub enum PriorRunStatus {
    /// Nothing left in the download directory.
    Clean,
    /// Leftover CSV files exist but none of them is still at `A`.
    LeftoversOnly(Vec<String>),
    /// Leftover CSV files whose ledger rows are still at `A`.
    Unfinished(Vec<String>),
}

/// Compare leftover CSV files in `download_dir` against the ledger.
///
/// Only logs; an unfinished run is neither resumed nor treated as fatal.
pub async fn check_prior_run(
    ledger: &dyn StagingLedger,
    download_dir: &Path,
) -> Result<PriorRunStatus> {
    let leftovers: Vec<String> = workspace::list_files(download_dir)?
        .iter()
        .filter(|path| workspace::is_csv(path))
        .map(|path| workspace::file_name(path))
        .collect();

    if leftovers.is_empty() {
        info!("Last run was successful");
        return Ok(PriorRunStatus::Clean);
    }

    let unfinished = ledger.unfinished(&leftovers).await?;
    if unfinished.is_empty() {
        info!(files = ?leftovers, "Leftover files found but none are pending in the staging ledger");
        Ok(PriorRunStatus::LeftoversOnly(leftovers))
    } else {
        warn!(
            files = ?unfinished,
            "Your last run failed; these files are still at status A in the staging ledger"
        );
        Ok(PriorRunStatus::Unfinished(unfinished))
    }
}
