//! Normalizes correct sales files onto one record schema.
//!
//! Every file is read schema-on-read (all columns as text). Columns outside the
//! normalized record collapse into `additional_column`, the mandatory ones are cast
//! to their normalized types, and the per-file frames are unioned in file order.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::workspace;

pub const ADDITIONAL_COLUMN: &str = "additional_column";
const EXTRA_SEPARATOR: &str = ", ";
const SALES_DATE_FORMAT: &str = "%Y-%m-%d";

/// Normalized sales record columns, in output order.
pub const SALES_COLUMNS: [&str; 9] = [
    "customer_id",
    "store_id",
    "product_name",
    "sales_date",
    "sales_person_id",
    "price",
    "quantity",
    "total_cost",
    ADDITIONAL_COLUMN,
];

/// Record columns read straight from the file; `additional_column` is derived.
pub fn record_columns() -> &'static [&'static str] {
    &SALES_COLUMNS[..SALES_COLUMNS.len() - 1]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnReconciler;

impl ColumnReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Header columns outside the normalized record, in header order.
    pub fn extra_columns<S: AsRef<str>>(&self, header: &[S]) -> Vec<String> {
        header
            .iter()
            .map(|column| column.as_ref())
            .filter(|column| !record_columns().contains(column))
            .map(str::to_string)
            .collect()
    }

    /// One file as a lazy frame over the normalized schema.
    pub fn normalize_file(&self, path: &Path) -> Result<LazyFrame> {
        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let header: Vec<String> = raw
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let extras = self.extra_columns(&header);
        debug!(file = %workspace::file_name(path), extras = ?extras, rows = raw.height(), "Read sales file");

        let additional = if extras.is_empty() {
            lit(NULL).cast(DataType::String)
        } else {
            let parts: Vec<Expr> = extras.iter().map(|name| col(name.as_str())).collect();
            concat_str(parts, EXTRA_SEPARATOR, true)
        };

        let lf = raw.lazy().select([
            col("customer_id").cast(DataType::Int32),
            col("store_id").cast(DataType::Int32),
            col("product_name"),
            col("sales_date").str().to_date(StrptimeOptions {
                format: Some(SALES_DATE_FORMAT.into()),
                strict: false,
                ..Default::default()
            }),
            col("sales_person_id").cast(DataType::Int32),
            col("price").cast(DataType::Float64),
            col("quantity").cast(DataType::Int32),
            col("total_cost").cast(DataType::Float64),
            additional.alias(ADDITIONAL_COLUMN),
        ]);
        Ok(lf)
    }

    /// Union of every file, in file-name order.
    pub fn normalize(&self, paths: &[PathBuf]) -> Result<DataFrame> {
        if paths.is_empty() {
            return Err(PipelineError::NoInput("no correct files to normalize".into()));
        }

        let mut sorted = paths.to_vec();
        sorted.sort_by_key(|path| workspace::file_name(path));

        let frames = sorted
            .iter()
            .map(|path| self.normalize_file(path))
            .collect::<Result<Vec<_>>>()?;

        let df = concat(&frames, UnionArgs::default())?.collect()?;
        info!(files = sorted.len(), rows = df.height(), "Normalized sales records");
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extras_keep_header_order() {
        let header = ["payment_mode", "customer_id", "coupon", "store_id"];
        assert_eq!(ColumnReconciler::new().extra_columns(&header), vec!["payment_mode", "coupon"]);
    }

    #[test]
    fn record_columns_exclude_additional_column() {
        assert_eq!(record_columns().len(), 8);
        assert!(!record_columns().contains(&ADDITIONAL_COLUMN));
    }
}
