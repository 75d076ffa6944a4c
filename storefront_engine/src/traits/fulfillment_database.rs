use thiserror::Error;

use crate::{
    cart::CartError,
    gateway::GatewayError,
    db_types::{GatewayPaymentId, OrderId, OrderStatusType, PaymentStatus, ProductId},
    traits::{CatalogManagement, OrderManagement, PaymentManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the storefront engine.
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase: Clone + CatalogManagement + OrderManagement + PaymentManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection(s).
    async fn close(&mut self) -> Result<(), FulfillmentError>;
}

#[derive(Debug, Clone, Error)]
pub enum FulfillmentError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Cannot place an order from an empty cart")]
    EmptyCart,
    #[error("Invalid quantity {quantity} for product {product_id}. Must be positive and keep totals in range")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },
    #[error("Insufficient stock for product {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: ProductId, requested: i64, available: i64 },
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} has already been cancelled")]
    AlreadyCancelled(OrderId),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Order {order_id} is {status} and cannot be deleted until it is cancelled or fulfilled")]
    OrderStillActive { order_id: OrderId, status: OrderStatusType },
    #[error("Order {order_id} is {status}. Only pending orders can be paid for")]
    OrderNotPayable { order_id: OrderId, status: OrderStatusType },
    #[error("A payment already exists for order {0}")]
    PaymentAlreadyExists(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(GatewayPaymentId),
    #[error("Payment {payment_id} cannot move from {from} to {to}")]
    InvalidPaymentTransition { payment_id: GatewayPaymentId, from: PaymentStatus, to: PaymentStatus },
    #[error("The payment gateway is unavailable. {0}")]
    GatewayUnavailable(String),
    #[error("Malformed webhook notification. {0}")]
    MalformedWebhook(String),
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<CartError> for FulfillmentError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::InvalidQuantity { product_id, quantity } => Self::InvalidQuantity { product_id, quantity },
        }
    }
}

impl From<GatewayError> for FulfillmentError {
    fn from(e: GatewayError) -> Self {
        Self::GatewayUnavailable(e.to_string())
    }
}
