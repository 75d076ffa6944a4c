use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use storefront_engine::{
    cart::Cart,
    config::GatewayConfig,
    db_types::{CustomerDetails, Money, NewProduct, OrderStatusType, PaymentStatus},
    events::{EventHandlers, EventHooks},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        StubGateway,
    },
    CatalogManagement,
    FulfillmentDatabase,
    FulfillmentError,
    OrderFlowApi,
    OrderManagement,
    PaymentFlowApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }
}

#[derive(Default, Clone)]
struct Counters {
    order_created: HookCalled,
    order_cancelled: HookCalled,
    order_status_changed: HookCalled,
    payment_created: HookCalled,
    payment_status_changed: HookCalled,
    order_reconciled: HookCalled,
}

fn hooks(counters: &Counters) -> EventHooks {
    let mut hooks = EventHooks::default();
    let c = counters.order_created.clone();
    hooks.on_order_created(move |ev| {
        info!("🪝️ Order created: {}", ev.order.id);
        let c = c.clone();
        Box::pin(async move { c.called() })
    });
    let c = counters.order_cancelled.clone();
    hooks.on_order_cancelled(move |ev| {
        info!("🪝️ Order cancelled: {} (was {})", ev.order.id, ev.previous_status);
        let c = c.clone();
        Box::pin(async move { c.called() })
    });
    let c = counters.order_status_changed.clone();
    hooks.on_order_status_changed(move |_| {
        let c = c.clone();
        Box::pin(async move { c.called() })
    });
    let c = counters.payment_created.clone();
    hooks.on_payment_created(move |_| {
        let c = c.clone();
        Box::pin(async move { c.called() })
    });
    let c = counters.payment_status_changed.clone();
    hooks.on_payment_status_changed(move |ev| {
        info!("🪝️ Payment {} is {}", ev.payment.gateway_payment_id, ev.payment.status);
        let c = c.clone();
        Box::pin(async move { c.called() })
    });
    let c = counters.order_reconciled.clone();
    hooks.on_order_reconciled(move |_| {
        let c = c.clone();
        Box::pin(async move { c.called() })
    });
    hooks
}

/// Starts every handler on its own task. The tasks finish once all producers are dropped and every event is handled.
fn spawn_handlers(handlers: EventHandlers) -> Vec<JoinHandle<()>> {
    let EventHandlers {
        on_order_created,
        on_order_cancelled,
        on_order_status_changed,
        on_payment_created,
        on_payment_status_changed,
        on_order_reconciled,
    } = handlers;
    let mut tasks = Vec::new();
    tasks.extend(on_order_created.map(|h| tokio::spawn(h.start_handler())));
    tasks.extend(on_order_cancelled.map(|h| tokio::spawn(h.start_handler())));
    tasks.extend(on_order_status_changed.map(|h| tokio::spawn(h.start_handler())));
    tasks.extend(on_payment_created.map(|h| tokio::spawn(h.start_handler())));
    tasks.extend(on_payment_status_changed.map(|h| tokio::spawn(h.start_handler())));
    tasks.extend(on_order_reconciled.map(|h| tokio::spawn(h.start_handler())));
    tasks
}

#[tokio::test]
async fn events_fire_once_per_applied_change() {
    let counters = Counters::default();
    let handlers = EventHandlers::new(16, hooks(&counters));
    let producers = handlers.producers();
    let tasks = spawn_handlers(handlers);

    let url = random_db_path();
    prepare_test_env(&url).await;
    let mut db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let orders = OrderFlowApi::new(db.clone(), producers.clone());
    let payments = PaymentFlowApi::new(db.clone(), StubGateway::new(), GatewayConfig::default(), producers);

    let radio = db.insert_product(NewProduct::new("Radio", Money::from_major(40), 10)).await.unwrap();
    let customer = CustomerDetails::new("Elena", "elena@example.com", "Kazan");
    let mut cart = Cart::new();
    cart.add(&radio, 1).unwrap();
    let paid = orders.create_from_cart(&mut cart, customer.clone()).await.unwrap();
    cart.add(&radio, 2).unwrap();
    let abandoned = orders.create_from_cart(&mut cart, customer).await.unwrap();

    let payment = payments.create_payment(paid.id).await.unwrap();
    let id = payment.gateway_payment_id;
    payments.update_status(&id, PaymentStatus::Succeeded).await.unwrap();
    payments.update_status(&id, PaymentStatus::Succeeded).await.unwrap();
    let body = format!(r#"{{"event": "payment.succeeded", "object": {{"id": "{}", "status": "succeeded"}}}}"#, id.as_str());
    payments.handle_webhook(body.as_bytes()).await.unwrap();

    orders.update_status(paid.id, OrderStatusType::Processing).await.unwrap();
    orders.update_status(paid.id, OrderStatusType::Shipped).await.unwrap();
    orders.cancel(abandoned.id).await.unwrap();
    let err = orders.cancel(abandoned.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::AlreadyCancelled(_)));

    drop(orders);
    drop(payments);
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(counters.order_created.count(), 2);
    assert_eq!(counters.payment_created.count(), 1);
    assert_eq!(counters.payment_status_changed.count(), 1);
    assert_eq!(counters.order_reconciled.count(), 1);
    assert_eq!(counters.order_status_changed.count(), 1);
    assert_eq!(counters.order_cancelled.count(), 1);

    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

#[tokio::test]
async fn concurrent_duplicate_webhooks_reconcile_once() {
    let counters = Counters::default();
    let handlers = EventHandlers::new(16, hooks(&counters));
    let producers = handlers.producers();
    let tasks = spawn_handlers(handlers);

    let url = random_db_path();
    prepare_test_env(&url).await;
    let mut db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let orders = OrderFlowApi::new(db.clone(), producers.clone());
    let payments = PaymentFlowApi::new(db.clone(), StubGateway::new(), GatewayConfig::default(), producers);

    let kettle = db.insert_product(NewProduct::new("Kettle", Money::from_major(30), 5)).await.unwrap();
    let mut cart = Cart::new();
    cart.add(&kettle, 1).unwrap();
    let customer = CustomerDetails::new("Vera", "vera@example.com", "Tver");
    let order = orders.create_from_cart(&mut cart, customer).await.unwrap();
    let id = payments.create_payment(order.id).await.unwrap().gateway_payment_id;
    let body = format!(r#"{{"event": "payment.succeeded", "object": {{"id": "{}", "status": "succeeded"}}}}"#, id.as_str());
    let (a, b) = tokio::join!(payments.handle_webhook(body.as_bytes()), payments.handle_webhook(body.as_bytes()));
    a.unwrap();
    b.unwrap();

    drop(orders);
    drop(payments);
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(counters.payment_status_changed.count(), 1);
    assert_eq!(counters.order_reconciled.count(), 1);
    assert_eq!(db.fetch_order(order.id).await.unwrap().unwrap().status, OrderStatusType::Processing);

    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}
