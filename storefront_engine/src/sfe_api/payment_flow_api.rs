use std::{fmt::Debug, future::Future, sync::Arc};

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::GatewayConfig,
    db_types::{GatewayPaymentId, NewPayment, Order, OrderId, OrderStatusType, Payment, PaymentStatus},
    events::{EventProducers, OrderReconciledEvent, PaymentCreatedEvent, PaymentStatusChangedEvent},
    gateway::{
        parse_notification,
        payment_description,
        ConfirmationRequest,
        GatewayAmount,
        GatewayError,
        NewGatewayPayment,
        PaymentGateway,
        PaymentMetadata,
    },
    locks::KeyedLocks,
    traits::{FulfillmentError, OrderManagement, PaymentManagement, PaymentStatusChange},
};

/// How a webhook delivery was dealt with. Every variant is acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookAck {
    /// The notification moved the payment to a new status.
    Applied(Payment),
    /// The payment already had the notified status. Nothing changed.
    Duplicate(Payment),
    /// The notification could not be used (unparseable, unknown status or out of order) and was dropped.
    Ignored(String),
}

/// `PaymentFlowApi` creates payments at the external gateway and applies the gateway's status notifications to
/// payments and, through the reconciliation rules, to their orders.
#[derive(Clone)]
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: G,
    config: GatewayConfig,
    producers: EventProducers,
    order_locks: Arc<KeyedLocks<OrderId>>,
    payment_locks: Arc<KeyedLocks<GatewayPaymentId>>,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi ({})", self.config.api_url)
    }
}

impl<B, G> PaymentFlowApi<B, G> {
    pub fn new(db: B, gateway: G, config: GatewayConfig, producers: EventProducers) -> Self {
        Self {
            db,
            gateway,
            config,
            producers,
            order_locks: Arc::new(KeyedLocks::new()),
            payment_locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: OrderManagement + PaymentManagement,
    G: PaymentGateway,
{
    /// Creates a payment for a pending order at the gateway and records it as `Pending`.
    ///
    /// The returned payment carries the confirmation url that the customer must be sent to. If the gateway fails,
    /// times out or sends back an unusable response, `GatewayUnavailable` is returned and no payment is recorded. The
    /// caller may simply try again; every attempt carries a fresh idempotency key.
    pub async fn create_payment(&self, order_id: OrderId) -> Result<Payment, FulfillmentError> {
        let _guard = self.order_locks.lock(&order_id).await;
        let order = self.db.fetch_order(order_id).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if self.db.payment_exists_for_order(order_id).await? {
            debug!("💳️ Order {order_id} already has a payment");
            return Err(FulfillmentError::PaymentAlreadyExists(order_id));
        }
        if order.status != OrderStatusType::Pending {
            debug!("💳️ Order {order_id} is {} and cannot be paid for", order.status);
            return Err(FulfillmentError::OrderNotPayable { order_id, status: order.status });
        }
        let request = self.new_gateway_payment(&order);
        trace!("💳️ Requesting a gateway payment for order {order_id} with key {}", request.idempotency_key);
        let response = self.call_gateway("create payment", self.gateway.create_payment(&request)).await?;
        if response.id.trim().is_empty() {
            warn!("💳️ The gateway accepted the payment for order {order_id} but did not return a payment id");
            return Err(GatewayError::IncompleteResponse("a payment id".into()).into());
        }
        let confirmation_url = response.confirmation_url().map(String::from).ok_or_else(|| {
            warn!("💳️ Gateway payment [{}] for order {order_id} has no confirmation url", response.id);
            FulfillmentError::from(GatewayError::IncompleteResponse("a confirmation url".into()))
        })?;
        let new_payment = NewPayment {
            order_id,
            gateway_payment_id: response.payment_id(),
            amount: order.total_amount,
            currency: order.currency.clone(),
            description: request.description,
            confirmation_url: Some(confirmation_url),
        };
        let payment = self.db.insert_payment(new_payment).await?;
        info!("💳️ Payment {} created for order {order_id} ({} {})", payment.gateway_payment_id, payment.amount, payment.currency);
        self.call_payment_created_hook(&payment).await;
        Ok(payment)
    }

    /// Moves a payment to a new status and reconciles its order.
    ///
    /// Updates for the same payment are applied one at a time. Repeating a status the payment already has is reported
    /// as [`PaymentStatusChange::Unchanged`] and publishes no events.
    pub async fn update_status(
        &self,
        payment_id: &GatewayPaymentId,
        status: PaymentStatus,
    ) -> Result<PaymentStatusChange, FulfillmentError> {
        let _guard = self.payment_locks.lock(payment_id).await;
        let change = self.db.update_payment_status(payment_id, status).await?;
        if let PaymentStatusChange::Applied { previous, payment, reconciled_order } = &change {
            info!("💳️ Payment {payment_id} moved from {previous} to {status}");
            self.call_payment_status_changed_hook(payment, *previous).await;
            if let Some(order) = reconciled_order {
                info!("💳️📦️ Order {} is now {} after payment {payment_id}", order.id, order.status);
                self.call_order_reconciled_hook(order, payment).await;
            }
        } else {
            debug!("💳️ Payment {payment_id} is already {status}. Duplicate update ignored");
        }
        Ok(change)
    }

    /// Applies a notification posted by the gateway.
    ///
    /// Malformed and out-of-order notifications are logged and acknowledged, since redelivering them would never
    /// succeed. An unknown payment id or a storage failure is returned as an error so that the gateway retries.
    pub async fn handle_webhook(&self, body: &[u8]) -> Result<WebhookAck, FulfillmentError> {
        let notification = match parse_notification(body) {
            Ok(n) => n,
            Err(FulfillmentError::MalformedWebhook(reason)) => {
                warn!("💳️ Dropping malformed webhook notification. {reason}");
                return Ok(WebhookAck::Ignored(reason));
            },
            Err(e) => return Err(e),
        };
        match self.update_status(&notification.payment_id, notification.status).await {
            Ok(PaymentStatusChange::Applied { payment, .. }) => Ok(WebhookAck::Applied(payment)),
            Ok(PaymentStatusChange::Unchanged(payment)) => Ok(WebhookAck::Duplicate(payment)),
            Err(e @ FulfillmentError::InvalidPaymentTransition { .. }) => {
                warn!("💳️ Dropping out-of-order webhook notification. {e}");
                Ok(WebhookAck::Ignored(e.to_string()))
            },
            Err(e) => {
                error!("💳️ Could not apply webhook notification for {}. {e}", notification.payment_id);
                Err(e)
            },
        }
    }

    /// Asks the gateway for the current status of the payment and applies it.
    pub async fn refresh_status(&self, payment_id: &GatewayPaymentId) -> Result<PaymentStatusChange, FulfillmentError> {
        if self.db.fetch_payment_by_gateway_id(payment_id).await?.is_none() {
            return Err(FulfillmentError::PaymentNotFound(payment_id.clone()));
        }
        let remote = self.call_gateway("fetch payment", self.gateway.fetch_payment(payment_id)).await?;
        let status = remote.payment_status().ok_or_else(|| {
            warn!("💳️ The gateway reported an unknown status, '{}', for payment {payment_id}", remote.status);
            FulfillmentError::from(GatewayError::IncompleteResponse(format!("a known status (got {})", remote.status)))
        })?;
        trace!("💳️ The gateway reports payment {payment_id} as {status}");
        self.update_status(payment_id, status).await
    }

    pub async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, FulfillmentError> {
        self.db.fetch_payment_for_order(order_id).await
    }

    /// True if the order's payment has succeeded.
    pub async fn is_payment_completed(&self, order_id: OrderId) -> Result<bool, FulfillmentError> {
        let payment = self.payment_for_order(order_id).await?;
        Ok(payment.is_some_and(|p| p.status == PaymentStatus::Succeeded))
    }

    /// True if the order's payment is still waiting on the customer or on capture.
    pub async fn is_payment_pending(&self, order_id: OrderId) -> Result<bool, FulfillmentError> {
        let payment = self.payment_for_order(order_id).await?;
        Ok(payment.is_some_and(|p| matches!(p.status, PaymentStatus::Pending | PaymentStatus::WaitingForCapture)))
    }

    fn new_gateway_payment(&self, order: &Order) -> NewGatewayPayment {
        NewGatewayPayment {
            amount: GatewayAmount::new(order.total_amount, order.currency.as_str()),
            confirmation: ConfirmationRequest::redirect(self.config.return_url()),
            capture: self.config.capture,
            description: payment_description(order.id),
            metadata: PaymentMetadata { order_id: order.id.value().to_string() },
            idempotency_key: uuid::Uuid::new_v4().to_string(),
        }
    }

    async fn call_gateway<T, F>(&self, action: &str, call: F) -> Result<T, FulfillmentError>
    where F: Future<Output = Result<T, GatewayError>> {
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("💳️ Gateway call to {action} failed. {e}");
                Err(e.into())
            },
            Err(_) => {
                error!("💳️ Gateway call to {action} timed out after {}ms", self.config.timeout.as_millis());
                Err(FulfillmentError::GatewayUnavailable(format!(
                    "{action} timed out after {}ms",
                    self.config.timeout.as_millis()
                )))
            },
        }
    }

    async fn call_payment_created_hook(&self, payment: &Payment) {
        for emitter in &self.producers.payment_created_producer {
            debug!("💳️ Notifying payment created hook subscribers");
            emitter.publish_event(PaymentCreatedEvent::new(payment.clone())).await;
        }
    }

    async fn call_payment_status_changed_hook(&self, payment: &Payment, previous: PaymentStatus) {
        for emitter in &self.producers.payment_status_changed_producer {
            debug!("💳️ Notifying payment status changed hook subscribers");
            emitter.publish_event(PaymentStatusChangedEvent::new(payment.clone(), previous)).await;
        }
    }

    async fn call_order_reconciled_hook(&self, order: &Order, payment: &Payment) {
        for emitter in &self.producers.order_reconciled_producer {
            debug!("💳️📦️ Notifying order reconciled hook subscribers");
            emitter.publish_event(OrderReconciledEvent::new(order.clone(), payment.clone())).await;
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use mockall::mock;

    use super::*;
    use crate::{
        db_types::{CustomerDetails, Money, NewOrder, NewProduct},
        gateway::{Confirmation, GatewayPayment},
        test_utils::prepare_env::{prepare_test_env, random_db_path},
        traits::CatalogManagement,
        SqliteDatabase,
    };

    mock! {
        pub Gateway {}
        impl PaymentGateway for Gateway {
            async fn create_payment(&self, request: &NewGatewayPayment) -> Result<GatewayPayment, GatewayError>;
            async fn fetch_payment(&self, payment_id: &GatewayPaymentId) -> Result<GatewayPayment, GatewayError>;
        }
    }

    struct SlowGateway;

    impl PaymentGateway for SlowGateway {
        async fn create_payment(&self, _request: &NewGatewayPayment) -> Result<GatewayPayment, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(GatewayError::RestResponseError("too late".into()))
        }

        async fn fetch_payment(&self, _payment_id: &GatewayPaymentId) -> Result<GatewayPayment, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(GatewayError::RestResponseError("too late".into()))
        }
    }

    fn gateway_payment(id: &str, status: &str, url: Option<&str>) -> GatewayPayment {
        GatewayPayment {
            id: id.to_string(),
            status: status.to_string(),
            amount: None,
            confirmation: url.map(|u| Confirmation { kind: Some("redirect".into()), confirmation_url: Some(u.into()) }),
            description: None,
            metadata: None,
        }
    }

    async fn db_with_order() -> (SqliteDatabase, Order) {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let product = db.insert_product(NewProduct::new("Tea pot", Money::from_major(25), 3)).await.unwrap();
        let order = db
            .insert_order(
                NewOrder::new(CustomerDetails::new("Ivan", "ivan@example.com", "Moscow"), "RUB").with_line(product.id, 1),
            )
            .await
            .unwrap();
        (db, order)
    }

    #[tokio::test]
    async fn create_payment_sends_the_order_to_the_gateway() {
        let (db, order) = db_with_order().await;
        let mut gateway = MockGateway::new();
        gateway
            .expect_create_payment()
            .withf(|req| {
                req.amount.value == "25.00" &&
                    req.amount.currency == "RUB" &&
                    req.metadata.order_id == "1" &&
                    req.description == "Payment for order #1" &&
                    req.confirmation.return_url == "http://localhost:8080/payment/success" &&
                    uuid::Uuid::parse_str(&req.idempotency_key).is_ok()
            })
            .times(1)
            .returning(|_| Ok(gateway_payment("pay-1", "pending", Some("https://gateway.test/confirm/pay-1"))));
        let api = PaymentFlowApi::new(db, gateway, GatewayConfig::default(), EventProducers::default());
        let payment = api.create_payment(order.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, Money::from_major(25));
        assert_eq!(payment.confirmation_url.as_deref(), Some("https://gateway.test/confirm/pay-1"));
        assert!(api.is_payment_pending(order.id).await.unwrap());
        assert!(!api.is_payment_completed(order.id).await.unwrap());
    }

    #[tokio::test]
    async fn incomplete_gateway_responses_are_not_recorded() {
        let (db, order) = db_with_order().await;
        let mut gateway = MockGateway::new();
        gateway.expect_create_payment().times(1).returning(|_| Ok(gateway_payment("pay-2", "pending", None)));
        let api = PaymentFlowApi::new(db, gateway, GatewayConfig::default(), EventProducers::default());
        let err = api.create_payment(order.id).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::GatewayUnavailable(_)));
        assert!(api.payment_for_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gateway_errors_are_unavailable() {
        let (db, order) = db_with_order().await;
        let mut gateway = MockGateway::new();
        gateway
            .expect_create_payment()
            .times(1)
            .returning(|_| Err(GatewayError::QueryError { status: 500, message: "internal error".into() }));
        let api = PaymentFlowApi::new(db, gateway, GatewayConfig::default(), EventProducers::default());
        let err = api.create_payment(order.id).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::GatewayUnavailable(m) if m.contains("500")));
        assert!(api.payment_for_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn slow_gateways_time_out() {
        let (db, order) = db_with_order().await;
        let config = GatewayConfig { timeout: Duration::from_millis(50), ..Default::default() };
        let api = PaymentFlowApi::new(db, SlowGateway, config, EventProducers::default());
        let err = api.create_payment(order.id).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::GatewayUnavailable(m) if m.contains("timed out")));
        assert!(api.payment_for_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_status_applies_the_gateway_status() {
        let (db, order) = db_with_order().await;
        let mut gateway = MockGateway::new();
        gateway
            .expect_create_payment()
            .returning(|_| Ok(gateway_payment("pay-3", "pending", Some("https://gateway.test/confirm/pay-3"))));
        gateway
            .expect_fetch_payment()
            .withf(|id| id.as_str() == "pay-3")
            .times(2)
            .returning(|_| Ok(gateway_payment("pay-3", "succeeded", None)));
        let api = PaymentFlowApi::new(db, gateway, GatewayConfig::default(), EventProducers::default());
        let payment = api.create_payment(order.id).await.unwrap();
        let change = api.refresh_status(&payment.gateway_payment_id).await.unwrap();
        assert!(change.is_applied());
        assert_eq!(change.reconciled_order().map(|o| o.status), Some(OrderStatusType::Processing));
        let again = api.refresh_status(&payment.gateway_payment_id).await.unwrap();
        assert!(!again.is_applied());
        assert!(api.is_payment_completed(order.id).await.unwrap());
    }

    #[tokio::test]
    async fn refresh_status_of_an_unknown_payment_does_not_call_the_gateway() {
        let (db, _) = db_with_order().await;
        let mut gateway = MockGateway::new();
        gateway.expect_fetch_payment().never();
        let api = PaymentFlowApi::new(db, gateway, GatewayConfig::default(), EventProducers::default());
        let err = api.refresh_status(&GatewayPaymentId::from("nope")).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::PaymentNotFound(_)));
    }
}
