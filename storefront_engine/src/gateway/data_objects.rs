use serde::{Deserialize, Serialize};

use crate::db_types::{GatewayPaymentId, Money, OrderId, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayAmount {
    /// Decimal string with exactly two fraction digits, e.g. "25.00"
    pub value: String,
    pub currency: String,
}

impl GatewayAmount {
    pub fn new<S: Into<String>>(amount: Money, currency: S) -> Self {
        Self { value: amount.to_decimal_string(), currency: currency.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub return_url: String,
}

impl ConfirmationRequest {
    pub fn redirect<S: Into<String>>(return_url: S) -> Self {
        Self { kind: "redirect".to_string(), return_url: return_url.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub order_id: String,
}

/// The body of a payment creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGatewayPayment {
    pub amount: GatewayAmount,
    pub confirmation: ConfirmationRequest,
    pub capture: bool,
    pub description: String,
    pub metadata: PaymentMetadata,
    /// Sent as the `Idempotence-Key` header rather than in the body
    #[serde(skip)]
    pub idempotency_key: String,
}

impl NewGatewayPayment {
    pub fn order_id(&self) -> &str {
        &self.metadata.order_id
    }
}

pub fn payment_description(order_id: OrderId) -> String {
    format!("Payment for order #{}", order_id.value())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub confirmation_url: Option<String>,
}

/// A payment as the gateway reports it, both in API responses and inside webhook notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<GatewayAmount>,
    #[serde(default)]
    pub confirmation: Option<Confirmation>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl GatewayPayment {
    pub fn payment_id(&self) -> GatewayPaymentId {
        GatewayPaymentId(self.id.clone())
    }

    pub fn confirmation_url(&self) -> Option<&str> {
        self.confirmation.as_ref().and_then(|c| c.confirmation_url.as_deref()).filter(|url| !url.is_empty())
    }

    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.status.parse().ok()
    }
}
