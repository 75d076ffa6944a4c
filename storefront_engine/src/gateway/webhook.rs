use log::*;
use serde::Deserialize;

use crate::{
    db_types::{GatewayPaymentId, PaymentStatus},
    gateway::GatewayPayment,
    traits::FulfillmentError,
};

/// The envelope the gateway posts to the notification url, e.g.
///
/// ```json
/// { "type": "notification", "event": "payment.succeeded", "object": { "id": "...", "status": "succeeded" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    pub object: GatewayPayment,
}

/// The part of a notification the engine acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub payment_id: GatewayPaymentId,
    pub status: PaymentStatus,
    pub event: Option<String>,
}

/// Parses a notification body. Anything that is not valid JSON in the expected shape, or that carries a status the
/// engine does not know, is a `MalformedWebhook`.
pub fn parse_notification(body: &[u8]) -> Result<PaymentNotification, FulfillmentError> {
    let notification = serde_json::from_slice::<WebhookNotification>(body)
        .map_err(|e| FulfillmentError::MalformedWebhook(format!("Could not parse notification. {e}")))?;
    trace!("💳️ Webhook notification received: {:?} {:?}", notification.kind, notification.event);
    if notification.object.id.trim().is_empty() {
        return Err(FulfillmentError::MalformedWebhook("Notification has an empty payment id".into()));
    }
    let status = notification.object.payment_status().ok_or_else(|| {
        FulfillmentError::MalformedWebhook(format!("Unknown payment status '{}'", notification.object.status))
    })?;
    Ok(PaymentNotification { payment_id: notification.object.payment_id(), status, event: notification.event })
}
