//! Local working directories: download area, quarantine, and mart outputs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Regular files directly inside `dir`, sorted by name. A missing directory yields nothing.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by_key(|path| file_name(path));
    Ok(files)
}

pub fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Move `file` into `dir`, keeping its name. Falls back to copy + remove
/// when a plain rename crosses filesystems.
pub fn move_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    let destination = dir.join(file_name(file));
    if let Err(err) = fs::rename(file, &destination) {
        debug!(error = %err, "Rename failed; copying instead");
        fs::copy(file, &destination)?;
        fs::remove_file(file)?;
    }
    Ok(destination)
}

/// Remove everything inside `dir` but keep the directory itself.
pub fn clear_directory(dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Empty directory ready for an overwrite-mode write.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    clear_directory(dir)
}
