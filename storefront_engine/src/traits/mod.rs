//! #  Storage backends
//!
//! This module defines the contracts that a database *backend* must fulfil to drive the storefront engine.
//!
//! ## Aggregates
//! Orders are always stored and loaded together with their lines, and payments are keyed both by the order they pay
//! for and by the identifier the payment gateway assigned to them. Backends never hand out partially loaded
//! aggregates.
//!
//! ## Traits
//! * [`CatalogManagement`] creates products and edits their catalog details. It cannot touch stock levels.
//! * [`OrderManagement`] places orders (reserving stock in the same transaction), cancels them (returning stock) and
//!   moves them through their lifecycle.
//! * [`PaymentManagement`] records gateway payments and applies status notifications, including the reconciliation of
//!   the paid order.
//! * [`FulfillmentDatabase`] ties the three together.
mod catalog_management;
mod data_objects;
mod fulfillment_database;
mod order_management;
mod payment_management;

pub use catalog_management::CatalogManagement;
pub use data_objects::{OrderStatusUpdate, PaymentStatusChange};
pub use fulfillment_database::{FulfillmentDatabase, FulfillmentError};
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
