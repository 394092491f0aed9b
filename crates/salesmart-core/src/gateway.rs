//! Driver-side operations against the bucket: listing source files, downloads,
//! prefix-to-prefix moves, and directory uploads.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use salesmart_bucket::{join_key, key_file_name, BucketStore};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";
const OCTET_STREAM: &str = "application/octet-stream";

/// Object keys under `prefix`, sorted, without folder placeholder keys.
pub async fn list_source_files(store: &dyn BucketStore, prefix: &str) -> Result<Vec<String>> {
    let prefix = join_key(prefix, "");
    let mut keys: Vec<String> = store
        .list_objects(&prefix)
        .await?
        .into_iter()
        .filter(|key| !key.ends_with('/'))
        .collect();
    keys.sort();
    info!(bucket = store.bucket(), prefix = %prefix, count = keys.len(), "Listed source files");
    Ok(keys)
}

/// Fetch every key into `download_dir` under its final path segment.
pub async fn download_files(
    store: &dyn BucketStore,
    keys: &[String],
    download_dir: &Path,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(download_dir).await?;

    let mut downloaded = Vec::with_capacity(keys.len());
    for key in keys {
        let name = key_file_name(key);
        if name.is_empty() {
            continue;
        }
        let bytes = store.get_object(key).await?;
        let target = download_dir.join(name);
        tokio::fs::write(&target, &bytes).await?;
        debug!(key = %key, path = %target.display(), size = bytes.len(), "Downloaded object");
        downloaded.push(target);
    }

    info!(count = downloaded.len(), dir = %download_dir.display(), "Downloaded source files");
    Ok(downloaded)
}

/// Move every object under `source_prefix` whose final segment equals
/// `file_name` to `dest_prefix/<file_name>`. Returns the destination keys.
pub async fn move_file(
    store: &dyn BucketStore,
    source_prefix: &str,
    dest_prefix: &str,
    file_name: &str,
) -> Result<Vec<String>> {
    let destination = join_key(dest_prefix, file_name);
    let mut moved = Vec::new();

    for key in store.list_objects(&join_key(source_prefix, "")).await? {
        if key_file_name(&key) != file_name {
            continue;
        }
        store.move_object(&key, &destination).await?;
        info!(from = %key, to = %destination, "Moved object");
        moved.push(destination.clone());
    }

    Ok(moved)
}

/// Upload every file below `local_dir` to `dest_prefix`, preserving relative paths.
pub async fn upload_directory(
    store: &dyn BucketStore,
    local_dir: &Path,
    dest_prefix: &str,
) -> Result<Vec<String>> {
    let mut uploaded = Vec::new();

    for path in walk_files(local_dir)? {
        let relative = path.strip_prefix(local_dir).map_err(|_| {
            PipelineError::Processing(format!(
                "{} is not inside {}",
                path.display(),
                local_dir.display()
            ))
        })?;
        let relative = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let key = join_key(dest_prefix, &relative);

        let bytes = Bytes::from(tokio::fs::read(&path).await?);
        store.put_object(&key, bytes, content_type_for(&path)).await?;
        debug!(path = %path.display(), key = %key, "Uploaded file");
        uploaded.push(key);
    }

    info!(dir = %local_dir.display(), prefix = dest_prefix, count = uploaded.len(), "Uploaded directory");
    Ok(uploaded)
}

fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("**").join("*");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|err| PipelineError::Processing(format!("invalid glob pattern {pattern}: {err}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| PipelineError::Io(err.into_error()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("parquet") => PARQUET_CONTENT_TYPE,
        Some("csv") => "text/csv",
        _ => OCTET_STREAM,
    }
}
