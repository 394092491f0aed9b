//! Customer and sales-team data marts computed from the enriched sales frame.

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::{IncentiveConfig, IncentiveScope};
use crate::error::{PipelineError, Result};

pub const MONTH_FORMAT: &str = "%Y-%m";

/// Columns of the customer mart Parquet projection.
pub const CUSTOMER_PROJECTION: [&str; 8] = [
    "customer_id",
    "first_name",
    "last_name",
    "address",
    "pincode",
    "phone_number",
    "sales_date",
    "total_cost",
];

/// Columns of the sales mart Parquet projection, before `sales_month`.
pub const SALES_PROJECTION: [&str; 11] = [
    "store_id",
    "sales_person_id",
    "sales_person_first_name",
    "sales_person_last_name",
    "store_manager_name",
    "manager_id",
    "is_manager",
    "sales_person_address",
    "sales_person_pincode",
    "sales_date",
    "total_cost",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerMartRow {
    pub customer_id: i32,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub sales_date_month: String,
    pub total_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesTeamMartRow {
    pub store_id: i32,
    pub sales_person_id: i32,
    pub full_name: Option<String>,
    pub sales_month: String,
    pub total_sales: f64,
    pub incentive: f64,
}

pub fn customer_projection(enriched: &DataFrame) -> Result<DataFrame> {
    let exprs: Vec<Expr> = CUSTOMER_PROJECTION.iter().map(|name| col(*name)).collect();
    Ok(enriched.clone().lazy().select(exprs).collect()?)
}

/// Sales projection plus `sales_month` (`YYYY-MM` of `sales_date`).
pub fn sales_projection(enriched: &DataFrame) -> Result<DataFrame> {
    let mut exprs: Vec<Expr> = SALES_PROJECTION.iter().map(|name| col(*name)).collect();
    exprs.push(col("sales_date").dt().strftime(MONTH_FORMAT).alias("sales_month"));
    Ok(enriched.clone().lazy().select(exprs).collect()?)
}

/// Monthly purchase totals per customer, sorted by customer and month.
pub fn customer_mart(projection: &DataFrame) -> Result<Vec<CustomerMartRow>> {
    let df = projection
        .clone()
        .lazy()
        .with_column(col("sales_date").dt().strftime(MONTH_FORMAT).alias("sales_date_month"))
        .filter(col("sales_date_month").is_not_null())
        .group_by([col("customer_id"), col("sales_date_month")])
        .agg([
            col("first_name").first(),
            col("last_name").first(),
            col("address").first(),
            col("phone_number").first(),
            col("total_cost").sum().alias("total_sales"),
        ])
        .sort(
            ["customer_id", "sales_date_month"],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let customer_ids = int_column(&df, "customer_id")?;
    let months = str_column(&df, "sales_date_month")?;
    let first_names = str_column(&df, "first_name")?;
    let last_names = str_column(&df, "last_name")?;
    let addresses = str_column(&df, "address")?;
    let phones = str_column(&df, "phone_number")?;
    let totals = float_column(&df, "total_sales")?;

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(customer_id), Some(month)) = (customer_ids[idx], months[idx].clone()) else {
            continue;
        };
        rows.push(CustomerMartRow {
            customer_id,
            full_name: full_name(first_names[idx].as_deref(), last_names[idx].as_deref()),
            address: addresses[idx].clone(),
            phone_number: phones[idx].clone(),
            sales_date_month: month,
            total_sales: totals[idx].unwrap_or(0.0),
        });
    }

    info!(rows = rows.len(), "Computed customer mart");
    Ok(rows)
}

/// Monthly totals per (store, sales person) with the incentive applied.
pub fn sales_team_mart(
    projection: &DataFrame,
    incentive: &IncentiveConfig,
) -> Result<Vec<SalesTeamMartRow>> {
    let df = projection
        .clone()
        .lazy()
        .filter(col("sales_month").is_not_null())
        .group_by([col("store_id"), col("sales_person_id"), col("sales_month")])
        .agg([
            col("sales_person_first_name").first(),
            col("sales_person_last_name").first(),
            col("total_cost").sum().alias("total_sales"),
        ])
        .sort(
            ["store_id", "sales_person_id", "sales_month"],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let store_ids = int_column(&df, "store_id")?;
    let person_ids = int_column(&df, "sales_person_id")?;
    let months = str_column(&df, "sales_month")?;
    let first_names = str_column(&df, "sales_person_first_name")?;
    let last_names = str_column(&df, "sales_person_last_name")?;
    let totals = float_column(&df, "total_sales")?;

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(store_id), Some(sales_person_id), Some(month)) =
            (store_ids[idx], person_ids[idx], months[idx].clone())
        else {
            continue;
        };
        rows.push(SalesTeamMartRow {
            store_id,
            sales_person_id,
            full_name: full_name(first_names[idx].as_deref(), last_names[idx].as_deref()),
            sales_month: month,
            total_sales: totals[idx].unwrap_or(0.0),
            incentive: 0.0,
        });
    }

    assign_incentives(&mut rows, incentive);
    info!(
        rows = rows.len(),
        winners = rows.iter().filter(|row| row.incentive > 0.0).count(),
        "Computed sales team mart"
    );
    Ok(rows)
}

/// Give the single top performer of each scope group `round(total * rate, 2)`;
/// everyone else gets 0. Ties go to the lowest sales person id, then store id.
pub fn assign_incentives(rows: &mut [SalesTeamMartRow], incentive: &IncentiveConfig) {
    let mut winners: BTreeMap<(Option<i32>, String), usize> = BTreeMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let group = match incentive.scope {
            IncentiveScope::PerStore => (Some(row.store_id), row.sales_month.clone()),
            IncentiveScope::Global => (None, row.sales_month.clone()),
        };
        winners
            .entry(group)
            .and_modify(|best| {
                if outranks(row, &rows[*best]) {
                    *best = idx;
                }
            })
            .or_insert(idx);
    }

    for row in rows.iter_mut() {
        row.incentive = 0.0;
    }
    for idx in winners.into_values() {
        rows[idx].incentive = round_cents(rows[idx].total_sales * incentive.rate);
    }
}

fn outranks(candidate: &SalesTeamMartRow, best: &SalesTeamMartRow) -> bool {
    candidate
        .total_sales
        .total_cmp(&best.total_sales)
        .then_with(|| best.sales_person_id.cmp(&candidate.sales_person_id))
        .then_with(|| best.store_id.cmp(&candidate.store_id))
        .is_gt()
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn full_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    match (first, last) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i32>>> {
    let series = df.column(name)?.as_materialized_series().cast(&DataType::Int32)?;
    Ok(series.i32()?.into_iter().collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?;
    let values = column.as_materialized_series().str().map_err(|err| {
        PipelineError::Processing(format!("column '{name}' is not text: {err}"))
    })?;
    Ok(values.into_iter().map(|value| value.map(str::to_string)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(store_id: i32, sales_person_id: i32, total_sales: f64) -> SalesTeamMartRow {
        SalesTeamMartRow {
            store_id,
            sales_person_id,
            full_name: None,
            sales_month: "2024-03".into(),
            total_sales,
            incentive: 0.0,
        }
    }

    #[test]
    fn rounding_to_cents() {
        assert_eq!(round_cents(12.345_6), 12.35);
        assert_eq!(round_cents(0.004), 0.0);
    }

    #[test]
    fn full_name_handles_missing_parts() {
        assert_eq!(full_name(Some("Asha"), Some("Rao")).as_deref(), Some("Asha Rao"));
        assert_eq!(full_name(None, Some("Rao")).as_deref(), Some("Rao"));
        assert_eq!(full_name(None, None), None);
    }

    #[test]
    fn global_scope_picks_one_winner_per_month() {
        let mut rows = vec![row(121, 1, 3000.0), row(122, 5, 4000.0), row(123, 9, 1000.0)];
        let config = IncentiveConfig {
            scope: IncentiveScope::Global,
            rate: 0.01,
        };
        assign_incentives(&mut rows, &config);
        let incentives: Vec<f64> = rows.iter().map(|r| r.incentive).collect();
        assert_eq!(incentives, vec![0.0, 40.0, 0.0]);
    }
}
