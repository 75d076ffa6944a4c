//! Storefront Engine
//!
//! The storefront engine takes a shopping cart through checkout, stock reservation, payment at an external gateway and
//! fulfilment. It is storage-agnostic at the API level and ships with a SQLite backend.
//!
//! The library is divided into these sections:
//! 1. Database management ([`traits`] and the private `db` module). Backends implement the traits in [`traits`]; the
//!    data types they exchange live in [`db_types`] and are public. You should never need to talk to the database
//!    directly. Use the public API instead.
//! 2. The public API. [`OrderFlowApi`] turns carts into orders and moves orders through their lifecycle,
//!    [`PaymentFlowApi`] creates gateway payments and reconciles orders with payment notifications, and [`ReportsApi`]
//!    answers read-only questions about orders and revenue.
//! 3. Supporting pieces: the in-memory [`cart`], the stock rules in [`inventory`], the payment-to-order rules in
//!    [`reconciliation`] and the [`gateway`] client.
//!
//! The engine emits events when orders and payments change. See [`events`] for how to hook into them.
mod db;
mod sfe_api;

pub mod cart;
pub mod config;
pub mod db_types;
pub mod events;
pub mod gateway;
pub mod inventory;
pub mod locks;
pub mod reconciliation;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use sfe_api::{
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_flow_api::{PaymentFlowApi, WebhookAck},
    reports_api::ReportsApi,
};
pub use traits::{
    CatalogManagement,
    FulfillmentDatabase,
    FulfillmentError,
    OrderManagement,
    OrderStatusUpdate,
    PaymentManagement,
    PaymentStatusChange,
};
