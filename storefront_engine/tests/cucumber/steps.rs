use std::str::FromStr;

use cucumber::{given, then, when};
use storefront_engine::{
    db_types::{CustomerDetails, Money, OrderStatusType, PaymentStatus},
    CatalogManagement,
    OrderManagement,
    PaymentManagement,
    WebhookAck,
};

use crate::cucumber::StorefrontWorld;

fn customer(name: &str) -> CustomerDetails {
    CustomerDetails::new(name, format!("{}@example.com", name.to_lowercase()), format!("{name}'s street 1"))
}

#[given(expr = "the cart of '{word}' holds {int} '{word}'")]
async fn add_to_cart(world: &mut StorefrontWorld, name: String, quantity: i64, product: String) {
    let product = world.product(&product).clone();
    world.carts.entry(name).or_default().add(&product, quantity).expect("Error adding to cart");
}

#[when(expr = "'{word}' checks out")]
async fn check_out(world: &mut StorefrontWorld, name: String) {
    let mut cart = world.carts.remove(&name).unwrap_or_default();
    let result = world.system().orders.create_from_cart(&mut cart, customer(&name)).await;
    world.carts.insert(name.clone(), cart);
    match result {
        Ok(order) => {
            world.orders.insert(name, order);
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "'{word}' and '{word}' check out at the same time")]
async fn check_out_together(world: &mut StorefrontWorld, first: String, second: String) {
    let mut cart1 = world.carts.remove(&first).unwrap_or_default();
    let mut cart2 = world.carts.remove(&second).unwrap_or_default();
    let api = &world.system().orders;
    let (r1, r2) =
        tokio::join!(api.create_from_cart(&mut cart1, customer(&first)), api.create_from_cart(&mut cart2, customer(&second)));
    for (name, result) in [(first.clone(), r1), (second.clone(), r2)] {
        match result {
            Ok(order) => {
                world.orders.insert(name, order);
            },
            Err(e) => world.last_error = Some(e),
        }
    }
    world.carts.insert(first, cart1);
    world.carts.insert(second, cart2);
}

#[when(expr = "the order of '{word}' is cancelled")]
async fn cancel_order(world: &mut StorefrontWorld, name: String) {
    cancel(world, name).await;
}

#[when(expr = "the order of '{word}' is cancelled again")]
async fn cancel_order_again(world: &mut StorefrontWorld, name: String) {
    cancel(world, name).await;
}

async fn cancel(world: &mut StorefrontWorld, name: String) {
    let id = world.order(&name).id;
    match world.system().orders.cancel(id).await {
        Ok(order) => {
            world.orders.insert(name, order);
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "a payment is created for the order of '{word}'")]
async fn create_payment(world: &mut StorefrontWorld, name: String) {
    let id = world.order(&name).id;
    world.system().payments.create_payment(id).await.expect("Error creating payment");
}

#[when(expr = "a payment is requested for the order of '{word}'")]
async fn request_payment(world: &mut StorefrontWorld, name: String) {
    let id = world.order(&name).id;
    if let Err(e) = world.system().payments.create_payment(id).await {
        world.last_error = Some(e);
    }
}

#[when(expr = "the gateway notifies that the payment of '{word}' is {word}")]
async fn gateway_notification(world: &mut StorefrontWorld, name: String, status: String) {
    let id = world.order(&name).id;
    let payment = world.system().db.fetch_payment_for_order(id).await.expect("Error fetching payment");
    let payment = payment.expect("No payment for order");
    let body = format!(
        r#"{{"type": "notification", "event": "payment.{status}", "object": {{"id": "{}", "status": "{status}"}}}}"#,
        payment.gateway_payment_id.as_str()
    );
    let ack = world.system().payments.handle_webhook(body.as_bytes()).await.expect("Webhook was not acknowledged");
    log::debug!("🚀️ Webhook acknowledged: {}", matches!(ack, WebhookAck::Applied(_)));
}

#[then(expr = "exactly {int} order(s) is/are placed")]
async fn order_count(world: &mut StorefrontWorld, count: i64) {
    let actual = world.system().db.count_orders(None).await.expect("Error counting orders");
    assert_eq!(actual, count);
}

#[then(expr = "'{word}' has {int} in stock")]
async fn stock_level(world: &mut StorefrontWorld, product: String, stock: i64) {
    let id = world.product(&product).id;
    let product = world.system().db.fetch_product(id).await.expect("Error fetching product").expect("No product");
    assert_eq!(product.stock_quantity, stock);
}

#[then(expr = "the order of '{word}' is {word} with a total of {word}")]
async fn order_status_and_total(world: &mut StorefrontWorld, name: String, status: String, total: String) {
    let order = world.order(&name);
    assert_eq!(order.status, OrderStatusType::from_str(&status).expect("Not an order status"));
    assert_eq!(order.total_amount, Money::from_str(&total).expect("Not a valid amount"));
}

#[then(expr = "the order of '{word}' is {word}")]
async fn order_status(world: &mut StorefrontWorld, name: String, status: String) {
    let id = world.order(&name).id;
    let order = world.system().db.fetch_order(id).await.expect("Error fetching order").expect("No order");
    assert_eq!(order.status, OrderStatusType::from_str(&status).expect("Not an order status"));
}

#[then(expr = "the payment of '{word}' is {word}")]
async fn payment_status(world: &mut StorefrontWorld, name: String, status: String) {
    let id = world.order(&name).id;
    let payment = world.system().db.fetch_payment_for_order(id).await.expect("Error fetching payment");
    let payment = payment.expect("No payment for order");
    assert_eq!(payment.status, PaymentStatus::from_str(&status).expect("Not a payment status"));
}

#[then(expr = "the order of '{word}' has no payment")]
async fn no_payment(world: &mut StorefrontWorld, name: String) {
    let id = world.order(&name).id;
    let exists = world.system().db.payment_exists_for_order(id).await.expect("Error fetching payment");
    assert!(!exists, "A payment was recorded");
}

#[then(expr = "the gateway was asked for {word} {word}")]
async fn gateway_request(world: &mut StorefrontWorld, amount: String, currency: String) {
    let requests = world.system().gateway.requests();
    let request = requests.last().expect("The gateway received no requests");
    assert_eq!(request.amount.value, amount);
    assert_eq!(request.amount.currency, currency);
}

#[then(expr = "the error is {word}")]
async fn last_error(world: &mut StorefrontWorld, kind: String) {
    let err = world.last_error.as_ref().expect("No error was recorded");
    assert!(format!("{err:?}").starts_with(&kind), "Expected {kind}, got {err:?}");
}

#[then(expr = "the checkout fails with insufficient stock of '{word}'")]
async fn insufficient_stock(world: &mut StorefrontWorld, product: String) {
    let expected = world.product(&product).id;
    match world.last_error.as_ref() {
        Some(storefront_engine::FulfillmentError::InsufficientStock { product_id, .. }) => {
            assert_eq!(*product_id, expected)
        },
        other => panic!("Expected insufficient stock, got {other:?}"),
    }
}

#[then(expr = "the cart of '{word}' still holds {int} items")]
async fn cart_items(world: &mut StorefrontWorld, name: String, count: i64) {
    let cart = world.carts.get(&name).expect("No cart");
    assert_eq!(cart.total_item_count(), count);
}
