use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::debug;

use crate::error::Result;

pub type DbPool = Pool<Postgres>;
pub type DbConnection = PoolConnection<Postgres>;

/// Establish a new Postgres connection pool for the driver.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations embedded at compile-time.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Check out one connection for a single unit of work (staging check, insert
/// batch, update batch, mart write). It returns to the pool when dropped, so
/// no phase holds a connection past its own scope.
pub async fn unit_of_work(pool: &DbPool, phase: &'static str) -> Result<DbConnection> {
    let conn = pool.acquire().await?;
    debug!(phase, "Acquired database connection");
    Ok(conn)
}
