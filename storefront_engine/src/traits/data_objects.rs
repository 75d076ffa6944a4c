use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Payment, PaymentStatus};

/// The result of an order status change. `previous` equals `order.status` when the call was a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub previous: OrderStatusType,
    pub order: Order,
}

impl OrderStatusUpdate {
    pub fn new(previous: OrderStatusType, order: Order) -> Self {
        Self { previous, order }
    }

    pub fn is_changed(&self) -> bool {
        self.previous != self.order.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatusChange {
    /// The new status was stored. `reconciled_order` holds the order if the reconciliation rules moved it.
    Applied { previous: PaymentStatus, payment: Payment, reconciled_order: Option<Order> },
    /// The payment was already in the requested status (e.g. a duplicate webhook delivery).
    Unchanged(Payment),
}

impl PaymentStatusChange {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Applied { payment, .. } => payment,
            Self::Unchanged(payment) => payment,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn reconciled_order(&self) -> Option<&Order> {
        match self {
            Self::Applied { reconciled_order, .. } => reconciled_order.as_ref(),
            Self::Unchanged(_) => None,
        }
    }
}
