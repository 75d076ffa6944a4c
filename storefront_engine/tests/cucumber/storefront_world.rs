use std::collections::HashMap;

use cucumber::World;
use log::*;
use storefront_engine::{
    cart::Cart,
    config::GatewayConfig,
    db_types::{Order, Product},
    events::EventProducers,
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        StubGateway,
    },
    FulfillmentError,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct StorefrontWorld {
    pub system: Option<StorefrontSystem>,
    /// Catalog products by name
    pub products: HashMap<String, Product>,
    /// Carts by customer name
    pub carts: HashMap<String, Cart>,
    /// The latest order placed by each customer
    pub orders: HashMap<String, Order>,
    pub last_error: Option<FulfillmentError>,
}

#[derive(Debug)]
pub struct StorefrontSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: StubGateway,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentFlowApi<SqliteDatabase, StubGateway>,
}

impl StorefrontWorld {
    pub fn system(&self) -> &StorefrontSystem {
        self.system.as_ref().expect("Storefront not initialised")
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("No product called {name}"))
    }

    pub fn order(&self, customer: &str) -> &Order {
        self.orders.get(customer).unwrap_or_else(|| panic!("{customer} has not placed an order"))
    }
}

impl StorefrontSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("🚀️ Created database: {url}");
        let gateway = StubGateway::new();
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let payments =
            PaymentFlowApi::new(db.clone(), gateway.clone(), GatewayConfig::default(), EventProducers::default());
        Self { db_path: url, db, gateway, orders, payments }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
