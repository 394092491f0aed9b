//! Header-only schema check that splits incoming files into correct and error sets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::workspace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileVerdict {
    Correct,
    /// Not a `.csv` file.
    NotCsv,
    /// Mandatory columns absent from the header, in mandatory order.
    MissingColumns(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    pub path: PathBuf,
    pub file_name: String,
    pub verdict: FileVerdict,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaPartition {
    pub correct: Vec<PathBuf>,
    pub error: Vec<PathBuf>,
    pub checks: Vec<FileCheck>,
}

impl SchemaPartition {
    pub fn correct_names(&self) -> Vec<String> {
        self.correct.iter().map(|path| workspace::file_name(path)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SchemaValidator {
    mandatory: Vec<String>,
}

impl SchemaValidator {
    pub fn new(mandatory: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mandatory: mandatory.into_iter().map(Into::into).collect(),
        }
    }

    /// Mandatory columns absent from `header`, in mandatory order. Names match exactly.
    pub fn missing_columns<S: AsRef<str>>(&self, header: &[S]) -> Vec<String> {
        let present: HashSet<&str> = header.iter().map(|column| column.as_ref()).collect();
        self.mandatory
            .iter()
            .filter(|column| !present.contains(column.as_str()))
            .cloned()
            .collect()
    }

    pub fn check_file(&self, path: &Path) -> Result<FileCheck> {
        let file_name = workspace::file_name(path);
        let verdict = if !workspace::is_csv(path) {
            FileVerdict::NotCsv
        } else {
            let header = read_header(path)?;
            let missing = self.missing_columns(&header);
            if missing.is_empty() {
                FileVerdict::Correct
            } else {
                FileVerdict::MissingColumns(missing)
            }
        };

        Ok(FileCheck {
            path: path.to_path_buf(),
            file_name,
            verdict,
        })
    }

    /// Sort `paths` by file name and classify each one. Empty input is fatal.
    pub fn partition(&self, paths: &[PathBuf]) -> Result<SchemaPartition> {
        if paths.is_empty() {
            return Err(PipelineError::NoInput("no data to process".into()));
        }

        let mut sorted = paths.to_vec();
        sorted.sort_by_key(|path| workspace::file_name(path));

        let mut partition = SchemaPartition::default();
        for path in sorted {
            let check = self.check_file(&path)?;
            match &check.verdict {
                FileVerdict::Correct => {
                    info!(file = %check.file_name, "No missing columns");
                    partition.correct.push(path);
                }
                FileVerdict::NotCsv => {
                    warn!(file = %check.file_name, "Not a CSV file");
                    partition.error.push(path);
                }
                FileVerdict::MissingColumns(missing) => {
                    warn!(file = %check.file_name, missing = ?missing, "Missing mandatory columns");
                    partition.error.push(path);
                }
            }
            partition.checks.push(check);
        }

        info!(
            correct = partition.correct.len(),
            error = partition.error.len(),
            "Schema validation finished"
        );
        Ok(partition)
    }
}

/// First record of a CSV file, names untouched. An empty file has an empty header.
pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let header = reader.headers()?;
    Ok(header.iter().map(str::to_string).collect())
}
