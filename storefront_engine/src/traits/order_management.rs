use chrono::{DateTime, Utc};

use crate::{
    db_types::{Money, NewOrder, Order, OrderId, OrderStatusType},
    sfe_api::order_objects::OrderQueryFilter,
    traits::{FulfillmentError, OrderStatusUpdate},
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Takes a new order, and in a single atomic transaction,
    /// * reserves stock for every line, failing with `InsufficientStock` or `ProductNotFound` if any line cannot be
    ///   reserved,
    /// * captures each product's current name and unit price into the order lines,
    /// * stores the order as `Pending` with its total set to the sum of the line totals.
    ///
    /// If any step fails, nothing is written and no stock level changes.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, FulfillmentError>;

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, FulfillmentError>;

    /// Fetches orders according to the criteria in the filter.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, FulfillmentError>;

    /// Counts all orders, or only those with the given status.
    async fn count_orders(&self, status: Option<OrderStatusType>) -> Result<i64, FulfillmentError>;

    /// The sum of the totals of all orders in any of `statuses`, optionally only those placed at or after `since`.
    async fn sum_order_totals(
        &self,
        statuses: &[OrderStatusType],
        since: Option<DateTime<Utc>>,
    ) -> Result<Money, FulfillmentError>;

    /// Cancels the order and returns every reserved unit to stock, in a single atomic transaction.
    ///
    /// Fails with `AlreadyCancelled` if the order was already cancelled, in which case no stock is returned, and with
    /// `InvalidTransition` if the order has been completed or delivered.
    async fn cancel_order(&self, id: OrderId) -> Result<OrderStatusUpdate, FulfillmentError>;

    /// Overwrites the order status. Orders cannot leave `Cancelled`. A move to `Cancelled` is performed by
    /// [`Self::cancel_order`] so that stock is returned. Setting the status the order already has is a no-op.
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatusType,
    ) -> Result<OrderStatusUpdate, FulfillmentError>;

    /// Removes the order along with its lines and payment. Only orders in a terminal status can be deleted.
    async fn delete_order(&self, id: OrderId) -> Result<(), FulfillmentError>;
}
