use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Utc;
use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::workspace;

/// Hive-style directory name used for null partition values.
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Millisecond timestamp that namespaces one run's uploads.
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn part_file_name(run_id: Uuid) -> String {
    format!("part-00000-{run_id}.parquet")
}

/// Overwrite `dir` with a single Parquet part file holding `df`.
pub fn write_parquet(df: &DataFrame, dir: &Path, run_id: Uuid) -> Result<PathBuf> {
    workspace::prepare_output_dir(dir)?;
    let path = dir.join(part_file_name(run_id));
    write_file(df, &path)?;
    info!(path = %path.display(), rows = df.height(), "Wrote parquet output");
    Ok(path)
}

/// Overwrite `dir` with one part file per distinct combination of `keys`,
/// laid out as `key=value/...`. Key columns are dropped from the file body.
pub fn write_partitioned(
    df: &DataFrame,
    dir: &Path,
    keys: &[&str],
    run_id: Uuid,
) -> Result<Vec<PathBuf>> {
    workspace::prepare_output_dir(dir)?;

    let mut written = Vec::new();
    for partition in df.partition_by_stable(keys.iter().copied(), true)? {
        let mut target = dir.to_path_buf();
        let mut body = partition.clone();
        for key in keys {
            let value = partition_value(&partition, key)?;
            target.push(format!("{key}={value}"));
            body = body.drop(key)?;
        }

        std::fs::create_dir_all(&target)?;
        let path = target.join(part_file_name(run_id));
        write_file(&body, &path)?;
        debug!(path = %path.display(), rows = body.height(), "Wrote partition");
        written.push(path);
    }

    info!(dir = %dir.display(), partitions = written.len(), rows = df.height(), "Wrote partitioned output");
    Ok(written)
}

fn partition_value(partition: &DataFrame, key: &str) -> Result<String> {
    let value = partition.column(key)?.get(0)?;
    Ok(match value {
        AnyValue::Null => NULL_PARTITION.to_string(),
        AnyValue::String(text) => text.to_string(),
        AnyValue::StringOwned(text) => text.to_string(),
        other => other.to_string(),
    })
}

fn write_file(df: &DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut clone = df.clone();
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .with_statistics(StatisticsOptions::default())
        .finish(&mut clone)?;
    Ok(())
}
