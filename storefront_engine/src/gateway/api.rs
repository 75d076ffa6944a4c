use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use storefront_common::helpers::join_url;

use crate::{
    config::GatewayConfig,
    db_types::GatewayPaymentId,
    gateway::{GatewayError, GatewayPayment, NewGatewayPayment, PaymentGateway},
};

const IDEMPOTENCE_KEY_HEADER: &str = "Idempotence-Key";

/// REST client for a YooKassa-compatible payment gateway.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        let credentials = format!("{}:{}", config.shop_id, config.secret_key.reveal());
        let mut auth = HeaderValue::from_str(&format!("Basic {}", base64::encode(credentials)))
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.config.api_url, path)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        idempotency_key: Option<&str>,
        body: Option<&B>,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(key) = idempotency_key {
            req = req.header(IDEMPOTENCE_KEY_HEADER, key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| GatewayError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayError::RestResponseError(e.to_string()))?;
            Err(GatewayError::QueryError { status, message })
        }
    }
}

impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment(&self, request: &NewGatewayPayment) -> Result<GatewayPayment, GatewayError> {
        debug!("💳️ Creating gateway payment for order #{} ({})", request.order_id(), request.amount.value);
        let payment = self
            .rest_query::<GatewayPayment, NewGatewayPayment>(
                Method::POST,
                "/payments",
                Some(&request.idempotency_key),
                Some(request),
            )
            .await?;
        info!("💳️ Gateway payment [{}] created for order #{}", payment.id, request.order_id());
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: &GatewayPaymentId) -> Result<GatewayPayment, GatewayError> {
        let path = format!("/payments/{}", payment_id.as_str());
        debug!("💳️ Fetching gateway payment {payment_id}");
        self.rest_query::<GatewayPayment, ()>(Method::GET, &path, None, None).await
    }
}
