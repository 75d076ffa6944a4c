use crate::{
    db_types::{GatewayPaymentId, NewPayment, OrderId, Payment, PaymentStatus},
    traits::{FulfillmentError, PaymentStatusChange},
};

#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Records a payment created at the gateway with status `Pending`. There can only be one payment per order; a
    /// second insert fails with `PaymentAlreadyExists`.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, FulfillmentError>;

    async fn fetch_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, FulfillmentError>;

    async fn fetch_payment_by_gateway_id(&self, id: &GatewayPaymentId) -> Result<Option<Payment>, FulfillmentError>;

    async fn payment_exists_for_order(&self, order_id: OrderId) -> Result<bool, FulfillmentError>;

    /// Moves the payment to `status` and applies the reconciliation rules to its order, in a single atomic
    /// transaction.
    ///
    /// * If the payment is already in `status`, nothing changes and [`PaymentStatusChange::Unchanged`] is returned.
    /// * If the move is not allowed by the payment state machine, `InvalidPaymentTransition` is returned and nothing
    ///   changes.
    /// * If no payment has the given id, `PaymentNotFound` is returned.
    async fn update_payment_status(
        &self,
        id: &GatewayPaymentId,
        status: PaymentStatus,
    ) -> Result<PaymentStatusChange, FulfillmentError>;
}
