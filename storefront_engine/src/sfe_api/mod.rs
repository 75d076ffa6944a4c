//! # Storefront engine public API
//!
//! The API is modular, so that clients can pick the pieces they need.
//!
//! * [`order_flow_api`] turns carts into orders and moves orders through their lifecycle, returning stock when an order
//!   is cancelled.
//! * [`payment_flow_api`] creates payments at the gateway and applies the gateway's status notifications to payments
//!   and their orders.
//! * [`reports_api`] answers read-only questions: order lookups, counts and revenue.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements the traits it needs.
//!
//! ```rust,ignore
//! use storefront_engine::{ReportsApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/storefront.db", 5).await?;
//! let reports = ReportsApi::new(db);
//! let pending = reports.pending_order_count().await?;
//! ```
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_flow_api;
pub mod reports_api;
