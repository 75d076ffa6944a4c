//! The external payment gateway
//!
//! [`PaymentGateway`] is the seam between the engine and the gateway's REST API. [`HttpPaymentGateway`] talks to a
//! YooKassa-compatible API over HTTPS; tests substitute their own implementations.
mod api;
mod data_objects;
mod error;
mod webhook;

pub use api::HttpPaymentGateway;
pub use data_objects::{
    Confirmation,
    ConfirmationRequest,
    GatewayAmount,
    GatewayPayment,
    NewGatewayPayment,
    payment_description,
    PaymentMetadata,
};
pub use error::GatewayError;
pub use webhook::{parse_notification, PaymentNotification, WebhookNotification};

use crate::db_types::GatewayPaymentId;

#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Creates a payment at the gateway. The request's idempotency key makes retries of the same request safe.
    async fn create_payment(&self, request: &NewGatewayPayment) -> Result<GatewayPayment, GatewayError>;

    /// Fetches the gateway's current view of a payment.
    async fn fetch_payment(&self, payment_id: &GatewayPaymentId) -> Result<GatewayPayment, GatewayError>;
}
