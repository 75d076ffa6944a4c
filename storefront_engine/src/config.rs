use std::{env, time::Duration};

use log::*;
use storefront_common::{
    helpers::{join_url, parse_boolean_flag},
    Secret,
    DEFAULT_CURRENCY_CODE,
};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_GATEWAY_URL: &str = "https://api.yookassa.ru/v3";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);
/// Path on the storefront the gateway sends the customer back to
pub const PAYMENT_RETURN_PATH: &str = "/payment/success";

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Currency code used for new orders
    pub currency: String,
    pub gateway: GatewayConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("SFE_DATABASE_URL").unwrap_or_else(|_| {
            info!("🪛️ SFE_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = env::var("SFE_DB_MAX_CONNECTIONS")
            .map(|s| {
                s.parse::<u32>().ok().filter(|n| *n > 0).unwrap_or_else(|| {
                    error!(
                        "🪛️ {s} is not a valid value for SFE_DB_MAX_CONNECTIONS. Using the default, \
                         {DEFAULT_MAX_CONNECTIONS}, instead."
                    );
                    DEFAULT_MAX_CONNECTIONS
                })
            })
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let currency = env::var("SFE_CURRENCY").map(|s| s.trim().to_ascii_uppercase()).unwrap_or_else(|_| {
            info!("🪛️ SFE_CURRENCY is not set. Using the default, {DEFAULT_CURRENCY_CODE}.");
            DEFAULT_CURRENCY_CODE.to_string()
        });
        let gateway = GatewayConfig::from_env_or_default();
        Self { database_url, max_connections, currency, gateway }
    }
}

/// Connection details for the external payment gateway.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub api_url: String,
    pub shop_id: String,
    pub secret_key: Secret<String>,
    /// Public address of the storefront. The customer is sent back to `<base_url>/payment/success`.
    pub base_url: String,
    /// Upper bound for every call to the gateway
    pub timeout: Duration,
    /// Whether payments are captured automatically once the customer authorises them
    pub capture: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GATEWAY_URL.to_string(),
            shop_id: "test_shop_id".to_string(),
            secret_key: Secret::new("test_secret_key".to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_GATEWAY_TIMEOUT,
            capture: true,
        }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let api_url = env::var("SFE_GATEWAY_URL").unwrap_or_else(|_| {
            info!("🪛️ SFE_GATEWAY_URL is not set. Using the default, {DEFAULT_GATEWAY_URL}.");
            defaults.api_url.clone()
        });
        let shop_id = env::var("SFE_GATEWAY_SHOP_ID").unwrap_or_else(|_| {
            warn!("🪛️ SFE_GATEWAY_SHOP_ID is not set. Using a (probably useless) default.");
            defaults.shop_id.clone()
        });
        let secret_key = env::var("SFE_GATEWAY_SECRET_KEY").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ SFE_GATEWAY_SECRET_KEY is not set. Using a (probably useless) default.");
            defaults.secret_key.clone()
        });
        let base_url = env::var("SFE_BASE_URL").unwrap_or_else(|_| {
            info!("🪛️ SFE_BASE_URL is not set. Using the default, {DEFAULT_BASE_URL}.");
            defaults.base_url.clone()
        });
        let timeout = env::var("SFE_GATEWAY_TIMEOUT")
            .map(|s| {
                s.parse::<u64>().ok().filter(|secs| *secs > 0).map(Duration::from_secs).unwrap_or_else(|| {
                    error!(
                        "🪛️ {s} is not a valid timeout in seconds for SFE_GATEWAY_TIMEOUT. Using the default, {}s, \
                         instead.",
                        DEFAULT_GATEWAY_TIMEOUT.as_secs()
                    );
                    DEFAULT_GATEWAY_TIMEOUT
                })
            })
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT);
        let capture = parse_boolean_flag(env::var("SFE_GATEWAY_CAPTURE").ok(), defaults.capture);
        Self { api_url, shop_id, secret_key, base_url, timeout, capture }
    }

    pub fn return_url(&self) -> String {
        join_url(&self.base_url, PAYMENT_RETURN_PATH)
    }
}
