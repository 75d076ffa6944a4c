//! Reconciliation rules
//!
//! How a change in payment status carries over to the order being paid for. Only a successful payment has an effect:
//! it moves a pending order into processing. A cancelled payment leaves the order alone. The order stays pending until
//! it is cancelled explicitly; an order never gets a second payment.
use crate::db_types::{OrderStatusType, PaymentStatus};

/// An order transition that only applies if the order is currently in `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTransition {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
}

/// The order transition triggered by a payment moving into `status`, if any.
pub fn order_transition_for(status: PaymentStatus) -> Option<OrderTransition> {
    match status {
        PaymentStatus::Succeeded => {
            Some(OrderTransition { from: OrderStatusType::Pending, to: OrderStatusType::Processing })
        },
        PaymentStatus::Pending | PaymentStatus::WaitingForCapture | PaymentStatus::Canceled => None,
    }
}
