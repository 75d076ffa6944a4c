use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::*;

use crate::{
    db_types::{GatewayPaymentId, PaymentStatus},
    gateway::{Confirmation, GatewayAmount, GatewayError, GatewayPayment, NewGatewayPayment, PaymentGateway},
};

#[derive(Debug, Default)]
struct StubState {
    requests: Vec<NewGatewayPayment>,
    payments: HashMap<String, GatewayPayment>,
    failing: bool,
}

/// An in-memory payment gateway.
///
/// Payment ids are `stub-payment-1`, `stub-payment-2`, ... in creation order, and every payment gets the confirmation
/// url `https://gateway.test/confirm/<id>`. Clones share state, so a test can keep a handle to inspect requests after
/// giving the gateway to an API.
#[derive(Debug, Clone, Default)]
pub struct StubGateway {
    state: Arc<Mutex<StubState>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// While failing, every call returns a 503 error.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Changes the status the gateway reports for a payment it created.
    pub fn set_status(&self, id: &GatewayPaymentId, status: PaymentStatus) {
        if let Some(payment) = self.lock().payments.get_mut(id.as_str()) {
            payment.status = status.as_gateway_str().to_string();
        }
    }

    /// Every payment creation request received, in order. Failed calls are included.
    pub fn requests(&self) -> Vec<NewGatewayPayment> {
        self.lock().requests.clone()
    }

    pub fn payment_count(&self) -> usize {
        self.lock().payments.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PaymentGateway for StubGateway {
    async fn create_payment(&self, request: &NewGatewayPayment) -> Result<GatewayPayment, GatewayError> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        if state.failing {
            return Err(GatewayError::QueryError { status: 503, message: "Service unavailable".into() });
        }
        let id = format!("stub-payment-{}", state.payments.len() + 1);
        let payment = GatewayPayment {
            id: id.clone(),
            status: PaymentStatus::Pending.as_gateway_str().to_string(),
            amount: Some(GatewayAmount { value: request.amount.value.clone(), currency: request.amount.currency.clone() }),
            confirmation: Some(Confirmation {
                kind: Some("redirect".into()),
                confirmation_url: Some(format!("https://gateway.test/confirm/{id}")),
            }),
            description: Some(request.description.clone()),
            metadata: serde_json::to_value(&request.metadata).ok(),
        };
        state.payments.insert(id, payment.clone());
        trace!("🚀️ Stub gateway created payment [{}]", payment.id);
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: &GatewayPaymentId) -> Result<GatewayPayment, GatewayError> {
        let state = self.lock();
        if state.failing {
            return Err(GatewayError::QueryError { status: 503, message: "Service unavailable".into() });
        }
        state
            .payments
            .get(payment_id.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::QueryError { status: 404, message: format!("No payment {payment_id}") })
    }
}
