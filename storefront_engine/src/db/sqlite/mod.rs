//! SQLite backend for the storefront engine.
//!
//! The functions in [`products`], [`orders`] and [`payments`] take a bare connection and are not atomic on their own.
//! [`SqliteDatabase`] composes them inside transactions. Every write transaction starts with a write statement, so
//! SQLite takes the write lock up front instead of upgrading a read lock half way through.
mod sqlite_impl;

pub mod orders;
pub mod payments;
pub mod products;

use log::trace;
pub use sqlite_impl::SqliteDatabase;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    trace!("🗃️ Opening SQLite pool at {url} with up to {max_connections} connections");
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
