//! Deterministic sample sales files for local runs.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::DEFAULT_MANDATORY_COLUMNS;
use crate::error::{PipelineError, Result};

const CUSTOMER_IDS: std::ops::RangeInclusive<u64> = 1..=20;
const DATE_SPAN_DAYS: u64 = 163;
const PAYMENT_MODES: [&str; 3] = ["cash", "UPI", "card"];

/// Store id and the sales people working there.
const STORES: [(i32, [i32; 4]); 3] = [
    (121, [1, 2, 3, 4]),
    (122, [5, 6, 7, 8]),
    (123, [9, 10, 11, 12]),
];

const PRODUCTS: [(&str, f64); 15] = [
    ("quaker oats", 212.0),
    ("sugar", 50.0),
    ("maida", 20.0),
    ("besan", 52.0),
    ("refined oil", 110.0),
    ("clinic plus", 1.5),
    ("dantkanti", 100.0),
    ("nutrella", 40.0),
    ("tata salt", 20.0),
    ("red label tea", 200.0),
    ("surf excel", 80.0),
    ("dove soap", 50.0),
    ("dove shampoo", 200.0),
    ("amul butter", 48.0),
    ("amul cheese", 100.0),
];

#[derive(Debug, Clone)]
pub struct SampleOptions {
    pub rows_per_file: usize,
    pub files: usize,
    /// Append a `payment_mode` column outside the mandatory set.
    pub extra_column: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            rows_per_file: 100,
            files: 1,
            extra_column: false,
        }
    }
}

/// Write `sales_data_<n>.csv` files into `out_dir`. Same options, same bytes.
pub fn generate(out_dir: &Path, options: &SampleOptions) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .ok_or_else(|| PipelineError::Processing("invalid sample start date".into()))?;

    let mut header: Vec<&str> = DEFAULT_MANDATORY_COLUMNS.to_vec();
    if options.extra_column {
        header.push("payment_mode");
    }

    let mut written = Vec::with_capacity(options.files);
    for file_idx in 0..options.files {
        let path = out_dir.join(format!("sales_data_{}.csv", file_idx + 1));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(&header)?;

        for row_idx in 0..options.rows_per_file {
            let mut draw = Draw::new(file_idx, row_idx);
            let customer_id = CUSTOMER_IDS.start() + draw.below(CUSTOMER_IDS.count() as u64);
            let (store_id, team) = STORES[draw.below(STORES.len() as u64) as usize];
            let sales_person_id = team[draw.below(team.len() as u64) as usize];
            let (product, price) = PRODUCTS[draw.below(PRODUCTS.len() as u64) as usize];
            let sales_date = start + Duration::days(draw.below(DATE_SPAN_DAYS) as i64);
            let quantity = 1 + draw.below(10);
            let total_cost = price * quantity as f64;

            let mut record = vec![
                customer_id.to_string(),
                store_id.to_string(),
                product.to_string(),
                sales_date.format("%Y-%m-%d").to_string(),
                sales_person_id.to_string(),
                price.to_string(),
                quantity.to_string(),
                total_cost.to_string(),
            ];
            if options.extra_column {
                record.push(PAYMENT_MODES[draw.below(PAYMENT_MODES.len() as u64) as usize].to_string());
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        written.push(path);
    }

    info!(files = written.len(), rows_per_file = options.rows_per_file, dir = %out_dir.display(), "Generated sample sales files");
    Ok(written)
}

/// Stream of pseudo-random numbers seeded by file and row position.
struct Draw {
    digest: [u8; 32],
    offset: usize,
}

impl Draw {
    fn new(file_idx: usize, row_idx: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"salesmart-sample");
        hasher.update((file_idx as u64).to_le_bytes());
        hasher.update((row_idx as u64).to_le_bytes());
        Self {
            digest: hasher.finalize().into(),
            offset: 0,
        }
    }

    fn below(&mut self, bound: u64) -> u64 {
        if self.offset + 4 > self.digest.len() {
            let mut hasher = Sha256::new();
            hasher.update(self.digest);
            self.digest = hasher.finalize().into();
            self.offset = 0;
        }
        let mut chunk = [0u8; 4];
        chunk.copy_from_slice(&self.digest[self.offset..self.offset + 4]);
        self.offset += 4;
        u64::from(u32::from_le_bytes(chunk)) % bound.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let options = SampleOptions {
            rows_per_file: 25,
            files: 2,
            extra_column: true,
        };

        let a = generate(first.path(), &options).unwrap();
        let b = generate(second.path(), &options).unwrap();

        assert_eq!(a.len(), 2);
        for (left, right) in a.iter().zip(&b) {
            assert_eq!(std::fs::read(left).unwrap(), std::fs::read(right).unwrap());
        }
        let text = std::fs::read_to_string(&a[0]).unwrap();
        assert!(text.lines().next().unwrap().ends_with(",payment_mode"));
        assert_eq!(text.lines().count(), 26);
    }
}
