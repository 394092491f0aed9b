//! Relational side of the pipeline: dimension reads and additive mart writes.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::Connection;
use tracing::info;

use crate::config::TableNames;
use crate::db::{self, DbPool};
use crate::dimensions::{CustomerRow, DimensionTables, ProductRow, SalesPersonRow, StoreRow};
use crate::error::Result;
use crate::marts::{CustomerMartRow, SalesTeamMartRow};

#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn load_dimensions(&self) -> Result<DimensionTables>;

    /// Append rows in one transaction. Returns the number inserted.
    async fn write_customer_mart(&self, rows: &[CustomerMartRow]) -> Result<u64>;

    /// Append rows in one transaction. Returns the number inserted.
    async fn write_sales_team_mart(&self, rows: &[SalesTeamMartRow]) -> Result<u64>;
}

/// Table names are validated identifiers (see `AppConfig::validate`).
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: DbPool,
    tables: TableNames,
}

impl PgWarehouse {
    pub fn new(pool: DbPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn load_dimensions(&self) -> Result<DimensionTables> {
        let mut conn = db::unit_of_work(&self.pool, "dimension_load").await?;

        let customers: Vec<CustomerRow> = sqlx::query_as(&format!(
            "SELECT customer_id, first_name, last_name, address, pincode, phone_number FROM {} ORDER BY customer_id",
            self.tables.customer
        ))
        .fetch_all(&mut *conn)
        .await?;

        let stores: Vec<StoreRow> = sqlx::query_as(&format!(
            "SELECT id, address, store_pincode, store_manager_name FROM {} ORDER BY id",
            self.tables.store
        ))
        .fetch_all(&mut *conn)
        .await?;

        let sales_team: Vec<SalesPersonRow> = sqlx::query_as(&format!(
            r#"
                SELECT id, first_name, last_name, manager_id, is_manager::text AS is_manager, address, pincode
                FROM {}
                ORDER BY id
            "#,
            self.tables.sales_team
        ))
        .fetch_all(&mut *conn)
        .await?;

        let products: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT name, current_price FROM {} ORDER BY id",
            self.tables.product
        ))
        .fetch_all(&mut *conn)
        .await?;

        info!(
            customers = customers.len(),
            stores = stores.len(),
            sales_team = sales_team.len(),
            products = products.len(),
            "Loaded dimension tables"
        );

        Ok(DimensionTables {
            customers,
            stores,
            sales_team,
            products,
        })
    }

    async fn write_customer_mart(&self, rows: &[CustomerMartRow]) -> Result<u64> {
        let statement = format!(
            r#"
                INSERT INTO {} (customer_id, full_name, address, phone_number, sales_date_month, total_sales)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            self.tables.customer_mart
        );

        let mut conn = db::unit_of_work(&self.pool, "customer_mart_write").await?;
        let mut tx = conn.begin().await?;
        for row in rows {
            sqlx::query(&statement)
                .bind(row.customer_id)
                .bind(&row.full_name)
                .bind(&row.address)
                .bind(&row.phone_number)
                .bind(&row.sales_date_month)
                .bind(row.total_sales)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(table = %self.tables.customer_mart, rows = rows.len(), "Wrote customer mart rows");
        Ok(rows.len() as u64)
    }

    async fn write_sales_team_mart(&self, rows: &[SalesTeamMartRow]) -> Result<u64> {
        let statement = format!(
            r#"
                INSERT INTO {} (store_id, sales_person_id, full_name, sales_month, total_sales, incentive)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            self.tables.sales_team_mart
        );

        let mut conn = db::unit_of_work(&self.pool, "sales_team_mart_write").await?;
        let mut tx = conn.begin().await?;
        for row in rows {
            sqlx::query(&statement)
                .bind(row.store_id)
                .bind(row.sales_person_id)
                .bind(&row.full_name)
                .bind(&row.sales_month)
                .bind(row.total_sales)
                .bind(row.incentive)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(table = %self.tables.sales_team_mart, rows = rows.len(), "Wrote sales team mart rows");
        Ok(rows.len() as u64)
    }
}

/// Fixed dimensions and captured mart rows, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    dimensions: DimensionTables,
    customer_mart: Mutex<Vec<CustomerMartRow>>,
    sales_team_mart: Mutex<Vec<SalesTeamMartRow>>,
}

impl MemoryWarehouse {
    pub fn new(dimensions: DimensionTables) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    pub fn customer_mart_rows(&self) -> Vec<CustomerMartRow> {
        self.customer_mart
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn sales_team_mart_rows(&self) -> Vec<SalesTeamMartRow> {
        self.sales_team_mart
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn load_dimensions(&self) -> Result<DimensionTables> {
        Ok(self.dimensions.clone())
    }

    async fn write_customer_mart(&self, rows: &[CustomerMartRow]) -> Result<u64> {
        self.customer_mart
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn write_sales_team_mart(&self, rows: &[SalesTeamMartRow]) -> Result<u64> {
        self.sales_team_mart
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}
