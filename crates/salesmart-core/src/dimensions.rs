//! Dimension tables and the joins that enrich normalized sales records.

use std::collections::HashSet;

use polars::prelude::*;
use sqlx::FromRow;
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CustomerRow {
    pub customer_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StoreRow {
    pub id: i32,
    pub address: Option<String>,
    pub store_pincode: Option<String>,
    pub store_manager_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SalesPersonRow {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub manager_id: Option<i32>,
    pub is_manager: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProductRow {
    pub name: Option<String>,
    pub current_price: Option<f64>,
}

/// Everything the joiner needs, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct DimensionTables {
    pub customers: Vec<CustomerRow>,
    pub stores: Vec<StoreRow>,
    pub sales_team: Vec<SalesPersonRow>,
    /// Empty means no product enrichment.
    pub products: Vec<ProductRow>,
}

impl DimensionTables {
    pub fn customer_frame(&self) -> Result<DataFrame> {
        let rows = &self.customers;
        let df = df!(
            "customer_id" => rows.iter().map(|r| r.customer_id).collect::<Vec<_>>(),
            "first_name" => rows.iter().map(|r| r.first_name.clone()).collect::<Vec<_>>(),
            "last_name" => rows.iter().map(|r| r.last_name.clone()).collect::<Vec<_>>(),
            "address" => rows.iter().map(|r| r.address.clone()).collect::<Vec<_>>(),
            "pincode" => rows.iter().map(|r| r.pincode.clone()).collect::<Vec<_>>(),
            "phone_number" => rows.iter().map(|r| r.phone_number.clone()).collect::<Vec<_>>(),
        )?;
        Ok(df)
    }

    /// Keyed by `store_id` so the join key lines up with the sales column.
    pub fn store_frame(&self) -> Result<DataFrame> {
        let rows = &self.stores;
        let df = df!(
            "store_id" => rows.iter().map(|r| r.id).collect::<Vec<_>>(),
            "store_address" => rows.iter().map(|r| r.address.clone()).collect::<Vec<_>>(),
            "store_pincode" => rows.iter().map(|r| r.store_pincode.clone()).collect::<Vec<_>>(),
            "store_manager_name" => rows.iter().map(|r| r.store_manager_name.clone()).collect::<Vec<_>>(),
        )?;
        Ok(df)
    }

    pub fn sales_team_frame(&self) -> Result<DataFrame> {
        let rows = &self.sales_team;
        let df = df!(
            "sales_person_id" => rows.iter().map(|r| r.id).collect::<Vec<_>>(),
            "sales_person_first_name" => rows.iter().map(|r| r.first_name.clone()).collect::<Vec<_>>(),
            "sales_person_last_name" => rows.iter().map(|r| r.last_name.clone()).collect::<Vec<_>>(),
            "manager_id" => rows.iter().map(|r| r.manager_id).collect::<Vec<_>>(),
            "is_manager" => rows.iter().map(|r| r.is_manager.clone()).collect::<Vec<_>>(),
            "sales_person_address" => rows.iter().map(|r| r.address.clone()).collect::<Vec<_>>(),
            "sales_person_pincode" => rows.iter().map(|r| r.pincode.clone()).collect::<Vec<_>>(),
        )?;
        Ok(df)
    }

    /// First row per product name; a left join must not fan out.
    pub fn product_frame(&self) -> Result<DataFrame> {
        let mut seen = HashSet::new();
        let (names, prices): (Vec<String>, Vec<Option<f64>>) = self
            .products
            .iter()
            .filter_map(|row| row.name.clone().map(|name| (name, row.current_price)))
            .filter(|(name, _)| seen.insert(name.clone()))
            .unzip();

        let df = df!(
            "product_name" => names,
            "product_current_price" => prices,
        )?;
        Ok(df)
    }
}

/// Inner joins on customer, store and sales person; orphans drop out.
/// When products are present, a left join adds `product_current_price`.
pub fn enrich(sales: DataFrame, dims: &DimensionTables) -> Result<DataFrame> {
    let input_rows = sales.height();
    let inner = || JoinArgs::new(JoinType::Inner);

    let mut lf = sales
        .lazy()
        .join(
            dims.customer_frame()?.lazy(),
            [col("customer_id")],
            [col("customer_id")],
            inner(),
        )
        .join(
            dims.store_frame()?.lazy(),
            [col("store_id")],
            [col("store_id")],
            inner(),
        )
        .join(
            dims.sales_team_frame()?.lazy(),
            [col("sales_person_id")],
            [col("sales_person_id")],
            inner(),
        );

    if !dims.products.is_empty() {
        lf = lf.join(
            dims.product_frame()?.lazy(),
            [col("product_name")],
            [col("product_name")],
            JoinArgs::new(JoinType::Left),
        );
    }

    let enriched = lf.collect()?;
    info!(
        input_rows,
        enriched_rows = enriched.height(),
        dropped = input_rows.saturating_sub(enriched.height()),
        "Joined sales records with dimension tables"
    );
    Ok(enriched)
}
