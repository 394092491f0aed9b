//! Moves schema-invalid files out of the processing path, locally and in the bucket.

use std::path::{Path, PathBuf};

use salesmart_bucket::BucketStore;
use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::gateway;
use crate::workspace;

#[derive(Debug, Clone, Serialize)]
pub struct QuarantinedFile {
    pub file_name: String,
    pub local_path: PathBuf,
    pub error_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuarantineReport {
    pub moved: Vec<QuarantinedFile>,
    /// Files left in place because the local error directory is missing.
    pub skipped: Vec<PathBuf>,
}

/// Relocate each error file to `error_dir` and its source object(s) to `error_prefix`.
pub async fn quarantine_files(
    store: &dyn BucketStore,
    files: &[PathBuf],
    error_dir: &Path,
    source_prefix: &str,
    error_prefix: &str,
) -> Result<QuarantineReport> {
    let mut report = QuarantineReport::default();
    if files.is_empty() {
        info!("No error files to quarantine");
        return Ok(report);
    }

    for file in files {
        let file_name = workspace::file_name(file);

        if !error_dir.is_dir() {
            error!(
                file = %file_name,
                error_dir = %error_dir.display(),
                "Error directory does not exist; file left in place"
            );
            report.skipped.push(file.clone());
            continue;
        }

        // Bucket first: a failed store move leaves the local file untouched.
        let error_keys = gateway::move_file(store, source_prefix, error_prefix, &file_name).await?;

        let local_path = match workspace::move_into(file, error_dir) {
            Ok(path) => path,
            Err(err) => {
                if let Err(rollback) =
                    gateway::move_file(store, error_prefix, source_prefix, &file_name).await
                {
                    error!(file = %file_name, error = %rollback, "Failed to restore source object");
                }
                return Err(err);
            }
        };
        info!(file = %file_name, to = %local_path.display(), "Moved local file to error directory");
        report.moved.push(QuarantinedFile {
            file_name,
            local_path,
            error_keys,
        });
    }

    Ok(report)
}
