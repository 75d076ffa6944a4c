use std::{fmt::Debug, sync::Arc};

use log::*;
use storefront_common::DEFAULT_CURRENCY_CODE;

use crate::{
    cart::Cart,
    db_types::{CustomerDetails, NewOrder, Order, OrderId, OrderStatusType, ProductId},
    events::{EventProducers, OrderCancelledEvent, OrderCreatedEvent, OrderStatusChangedEvent},
    locks::KeyedLocks,
    traits::{FulfillmentError, OrderManagement, OrderStatusUpdate},
};

/// `OrderFlowApi` is the primary API for turning carts into orders and moving orders through their lifecycle.
///
/// Every operation that touches stock holds the in-process lock of each product involved, taken in ascending product
/// order. Clones of the API share these locks.
#[derive(Clone)]
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    product_locks: Arc<KeyedLocks<ProductId>>,
    currency: String,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({})", self.currency)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, product_locks: Arc::new(KeyedLocks::new()), currency: DEFAULT_CURRENCY_CODE.to_string() }
    }

    /// Sets the currency that new orders are priced in.
    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Checks out the cart.
    ///
    /// A snapshot of the cart is taken, stock is reserved for every line and the order is stored as `Pending`, all in a
    /// single transaction. Unit prices are taken from the catalog at the moment of reservation, not from the cart.
    ///
    /// On success the cart is cleared. On failure, nothing is stored, no stock changes and the cart is left as it was.
    pub async fn create_from_cart(&self, cart: &mut Cart, customer: CustomerDetails) -> Result<Order, FulfillmentError> {
        let snapshot = cart.snapshot();
        if snapshot.is_empty() {
            debug!("🔄️📦️ Checkout for {} rejected. The cart is empty", customer.email);
            return Err(FulfillmentError::EmptyCart);
        }
        let order = self.place_order(snapshot.to_new_order(customer, self.currency.as_str())).await?;
        cart.clear();
        Ok(order)
    }

    /// Places an order that was not built from a [`Cart`]. The same reservation rules as [`Self::create_from_cart`]
    /// apply.
    pub async fn place_order(&self, order: NewOrder) -> Result<Order, FulfillmentError> {
        let product_ids = order.lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
        let _guards = self.product_locks.lock_all(&product_ids).await;
        trace!("🔄️📦️ Holding stock locks for {} products", product_ids.len());
        let order = self.db.insert_order(order).await?;
        info!(
            "🔄️📦️ Order {} placed for {}. {} items, total {} {}",
            order.id,
            order.customer_email,
            order.item_count(),
            order.total_amount,
            order.currency
        );
        self.call_order_created_hook(&order).await;
        Ok(order)
    }

    /// Cancels the order and returns all of its reserved stock.
    ///
    /// Cancelling an order twice fails with `AlreadyCancelled` and returns nothing a second time.
    pub async fn cancel(&self, id: OrderId) -> Result<Order, FulfillmentError> {
        let order = self.db.fetch_order(id).await?.ok_or(FulfillmentError::OrderNotFound(id))?;
        let product_ids = order.lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
        let _guards = self.product_locks.lock_all(&product_ids).await;
        let update = self.db.cancel_order(id).await?;
        info!("🔄️❌️ Order {id} cancelled from {}. {} items returned to stock", update.previous, update.order.item_count());
        self.call_order_cancelled_hook(&update).await;
        Ok(update.order)
    }

    /// Sets the order status. A move to `Cancelled` goes through [`Self::cancel`], so that stock is returned.
    pub async fn update_status(&self, id: OrderId, status: OrderStatusType) -> Result<Order, FulfillmentError> {
        if status == OrderStatusType::Cancelled {
            return self.cancel(id).await;
        }
        let update = self.db.update_order_status(id, status).await?;
        if update.is_changed() {
            debug!("🔄️📦️ Order {id} moved from {} to {status}", update.previous);
            self.call_order_status_changed_hook(&update).await;
        } else {
            trace!("🔄️📦️ Order {id} is already {status}");
        }
        Ok(update.order)
    }

    /// Removes an order that has reached a terminal status.
    pub async fn delete_order(&self, id: OrderId) -> Result<(), FulfillmentError> {
        self.db.delete_order(id).await?;
        info!("🔄️🗑️ Order {id} deleted");
        Ok(())
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            debug!("🔄️📦️ Notifying order created hook subscribers");
            emitter.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    async fn call_order_cancelled_hook(&self, update: &OrderStatusUpdate) {
        for emitter in &self.producers.order_cancelled_producer {
            debug!("🔄️❌️ Notifying order cancelled hook subscribers");
            emitter.publish_event(OrderCancelledEvent::new(update.order.clone(), update.previous)).await;
        }
    }

    async fn call_order_status_changed_hook(&self, update: &OrderStatusUpdate) {
        for emitter in &self.producers.order_status_changed_producer {
            debug!("🔄️📦️ Notifying order status changed hook subscribers");
            emitter.publish_event(OrderStatusChangedEvent::new(update.order.clone(), update.previous)).await;
        }
    }
}
