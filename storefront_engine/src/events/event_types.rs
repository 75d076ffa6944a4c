use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Payment, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published once per cancellation, after the order's stock has been returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    /// The status the order was in before it was cancelled
    pub previous_status: OrderStatusType,
}

impl OrderCancelledEvent {
    pub fn new(order: Order, previous_status: OrderStatusType) -> Self {
        Self { order, previous_status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub previous_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, previous_status: OrderStatusType) -> Self {
        Self { order, previous_status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCreatedEvent {
    pub payment: Payment,
}

impl PaymentCreatedEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

/// Published only when a status change is applied. Duplicate notifications do not produce events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusChangedEvent {
    pub payment: Payment,
    pub previous_status: PaymentStatus,
}

impl PaymentStatusChangedEvent {
    pub fn new(payment: Payment, previous_status: PaymentStatus) -> Self {
        Self { payment, previous_status }
    }
}

/// A payment update moved its order, e.g. a successful payment put a pending order into processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReconciledEvent {
    pub order: Order,
    pub payment: Payment,
}

impl OrderReconciledEvent {
    pub fn new(order: Order, payment: Payment) -> Self {
        Self { order, payment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderCancelled(OrderCancelledEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    PaymentCreated(PaymentCreatedEvent),
    PaymentStatusChanged(PaymentStatusChangedEvent),
    OrderReconciled(OrderReconciledEvent),
}
