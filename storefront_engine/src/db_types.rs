use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
pub use storefront_common::Money;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        ProductId        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ProductId(pub i64);

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl ProductId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub i64);

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('#');
        s.parse::<i64>().map(Self).map_err(|e| ConversionError(format!("Invalid order id '{s}': {e}")))
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------    GatewayPaymentId     -------------------------------------------------------
/// The identifier the external payment gateway assigned to a payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct GatewayPaymentId(pub String);

impl From<String> for GatewayPaymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GatewayPaymentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for GatewayPaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

impl GatewayPaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Money, stock_quantity: i64) -> Self {
        Self { name: name.into(), description: None, price, stock_quantity }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Catalog edits. Stock is deliberately absent: it only changes through reservations and releases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
}

impl ProductUpdate {
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.price.is_none()
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been placed and stock reserved, but no payment has been confirmed.
    Pending,
    /// Payment has been confirmed and the order is being prepared.
    Processing,
    /// The order has been fulfilled without shipping.
    Completed,
    /// The order has left the warehouse.
    Shipped,
    /// The order reached the customer.
    Delivered,
    /// The order was cancelled and its stock returned.
    Cancelled,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 6] = [
        OrderStatusType::Pending,
        OrderStatusType::Processing,
        OrderStatusType::Completed,
        OrderStatusType::Shipped,
        OrderStatusType::Delivered,
        OrderStatusType::Cancelled,
    ];

    /// Statuses from which the pipeline itself never moves an order.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Delivered | Self::Cancelled)
    }

    /// Whether the order still holds reserved stock that a cancellation would return.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Shipped)
    }

    /// The regular lifecycle transitions. Administrative status updates may force others, except out of `Cancelled`.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, Processing) |
                (Pending, Cancelled) |
                (Processing, Completed) |
                (Processing, Shipped) |
                (Processing, Cancelled) |
                (Shipped, Delivered) |
                (Shipped, Cancelled)
        )
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------   CustomerDetails     ---------------------------------------------------------
/// Contact details captured at checkout. They are copied into the order and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub address: String,
}

impl CustomerDetails {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(name: S1, email: S2, address: S3) -> Self {
        Self { name: name.into(), email: email.into(), address: address.into() }
    }
}

//--------------------------------------        OrderLine      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// The product name when the order was placed
    pub product_name: String,
    pub quantity: i64,
    /// The unit price when the order was placed. Later catalog price changes do not affect it.
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: String,
    pub ordered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: OrderStatusType,
    /// Fixed when the order is created. It is never recomputed from the lines.
    pub total_amount: Money,
    pub currency: String,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// The total number of units across all lines. Stored orders had their item count and total checked for overflow
    /// when they were placed.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    pub fn customer(&self) -> CustomerDetails {
        CustomerDetails::new(&self.customer_name, &self.customer_email, &self.customer_address)
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// An order that has not been persisted yet. Prices are not part of it: they are read from the catalog while the
/// stock for each line is reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer: CustomerDetails,
    pub currency: String,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer: CustomerDetails, currency: S) -> Self {
        Self { customer, currency: currency.into(), lines: Vec::new() }
    }

    pub fn with_line(mut self, product_id: ProductId, quantity: i64) -> Self {
        self.lines.push(NewOrderLine { product_id, quantity });
        self
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Created at the gateway; the customer has not paid yet.
    Pending,
    /// Authorised by the customer, waiting for the merchant to capture the funds.
    WaitingForCapture,
    /// Funds captured.
    Succeeded,
    /// Cancelled or declined.
    Canceled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled)
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        Self::predecessors(next).contains(self)
    }

    /// The statuses a payment may be in for a move to `status` to be legal.
    pub fn predecessors(status: PaymentStatus) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match status {
            Pending => &[],
            WaitingForCapture => &[Pending],
            Succeeded | Canceled => &[Pending, WaitingForCapture],
        }
    }

    /// The status name as the gateway API spells it.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::WaitingForCapture => "waiting_for_capture",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::WaitingForCapture => write!(f, "WaitingForCapture"),
            PaymentStatus::Succeeded => write!(f, "Succeeded"),
            PaymentStatus::Canceled => write!(f, "Canceled"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    /// Accepts both the gateway spelling (`waiting_for_capture`) and the stored one (`WaitingForCapture`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "");
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "waitingforcapture" => Ok(Self::WaitingForCapture),
            "succeeded" => Ok(Self::Succeeded),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: OrderId,
    pub gateway_payment_id: GatewayPaymentId,
    pub status: PaymentStatus,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    /// Where the customer is redirected to complete the payment
    pub confirmation_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub gateway_payment_id: GatewayPaymentId,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub confirmation_url: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_status_transitions() {
        use OrderStatusType::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(OrderStatusType::ALL.iter().filter(|s| s.is_terminal()).all(|s| !s.is_cancellable()));
    }

    #[test]
    fn order_status_round_trips_through_strings() {
        for status in OrderStatusType::ALL {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert_eq!(OrderStatusType::from("nonsense".to_string()), OrderStatusType::Pending);
    }

    #[test]
    fn payment_status_state_machine() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(WaitingForCapture));
        assert!(Pending.can_transition_to(Succeeded));
        assert!(WaitingForCapture.can_transition_to(Canceled));
        assert!(!Canceled.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(WaitingForCapture));
        assert!(!Succeeded.can_transition_to(Succeeded));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn payment_status_parses_gateway_spelling() {
        assert_eq!("waiting_for_capture".parse::<PaymentStatus>().unwrap(), PaymentStatus::WaitingForCapture);
        assert_eq!("SUCCEEDED".parse::<PaymentStatus>().unwrap(), PaymentStatus::Succeeded);
        assert_eq!("WaitingForCapture".parse::<PaymentStatus>().unwrap(), PaymentStatus::WaitingForCapture);
        assert!("refunded".parse::<PaymentStatus>().is_err());
        assert_eq!(PaymentStatus::Canceled.as_gateway_str(), "canceled");
    }

    #[test]
    fn order_totals() {
        let line = |id: i64, qty: i64, price: i64| OrderLine {
            id,
            order_id: OrderId(1),
            product_id: ProductId(id),
            product_name: format!("Product {id}"),
            quantity: qty,
            unit_price: Money::from_major(price),
        };
        let order = Order {
            id: OrderId(1),
            customer_name: "Ivan".into(),
            customer_email: "ivan@example.com".into(),
            customer_address: "Moscow".into(),
            ordered_at: Utc::now(),
            updated_at: Utc::now(),
            status: OrderStatusType::Pending,
            total_amount: Money::from_major(25),
            currency: "RUB".into(),
            lines: vec![line(1, 2, 10), line(2, 1, 5)],
        };
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.lines_total(), order.total_amount);
    }
}
