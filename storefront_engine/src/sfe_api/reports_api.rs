//! Read-only queries over orders and payments.
use std::fmt::Debug;

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};
use log::*;

use crate::{
    db_types::{Money, Order, OrderId, OrderStatusType, Payment},
    order_objects::OrderQueryFilter,
    traits::{FulfillmentError, OrderManagement, PaymentManagement},
};

/// Orders in these statuses have been paid for and not cancelled, so they count towards revenue.
pub const REVENUE_STATUSES: [OrderStatusType; 4] = [
    OrderStatusType::Processing,
    OrderStatusType::Shipped,
    OrderStatusType::Completed,
    OrderStatusType::Delivered,
];

pub struct ReportsApi<B> {
    db: B,
}

impl<B: Debug> Debug for ReportsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReportsApi ({:?})", self.db)
    }
}

impl<B> ReportsApi<B>
where B: OrderManagement + PaymentManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, FulfillmentError> {
        self.db.fetch_order(id).await
    }

    pub async fn payment_for_order(&self, id: OrderId) -> Result<Option<Payment>, FulfillmentError> {
        self.db.fetch_payment_for_order(id).await
    }

    /// Every order, newest first.
    pub async fn all_orders(&self) -> Result<Vec<Order>, FulfillmentError> {
        self.db.search_orders(OrderQueryFilter::default().newest_first()).await
    }

    /// The customer's orders, newest first. Emails are compared case-insensitively.
    pub async fn orders_for_email(&self, email: &str) -> Result<Vec<Order>, FulfillmentError> {
        self.db.search_orders(OrderQueryFilter::default().with_customer_email(email).newest_first()).await
    }

    pub async fn orders_by_status(&self, status: OrderStatusType) -> Result<Vec<Order>, FulfillmentError> {
        self.db.search_orders(OrderQueryFilter::default().with_status(status).newest_first()).await
    }

    /// Orders placed at or after `since` and before `until`, oldest first.
    pub async fn orders_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Order>, FulfillmentError> {
        self.db.search_orders(OrderQueryFilter::default().since(since).until(until)).await
    }

    /// Orders placed since midnight UTC.
    pub async fn today_orders(&self) -> Result<Vec<Order>, FulfillmentError> {
        let since = start_of_day(Utc::now());
        self.db.search_orders(OrderQueryFilter::default().since(since).newest_first()).await
    }

    /// The `count` most recent orders.
    pub async fn recent_orders(&self, count: i64) -> Result<Vec<Order>, FulfillmentError> {
        self.db.search_orders(OrderQueryFilter::default().newest_first().with_limit(count.max(0))).await
    }

    /// Orders whose id equals `term`, or whose customer name, email or address contains it, ignoring case.
    pub async fn search_orders(&self, term: &str) -> Result<Vec<Order>, FulfillmentError> {
        if term.trim().is_empty() {
            return self.all_orders().await;
        }
        trace!("📦️ Searching orders for '{term}'");
        self.db.search_orders(OrderQueryFilter::default().with_search_term(term).newest_first()).await
    }

    pub async fn order_count(&self) -> Result<i64, FulfillmentError> {
        self.db.count_orders(None).await
    }

    pub async fn order_count_by_status(&self, status: OrderStatusType) -> Result<i64, FulfillmentError> {
        self.db.count_orders(Some(status)).await
    }

    pub async fn pending_order_count(&self) -> Result<i64, FulfillmentError> {
        self.order_count_by_status(OrderStatusType::Pending).await
    }

    /// The sum of all paid, uncancelled orders.
    pub async fn total_revenue(&self) -> Result<Money, FulfillmentError> {
        self.db.sum_order_totals(&REVENUE_STATUSES, None).await
    }

    /// Revenue from orders placed since the first day of the current month (UTC).
    pub async fn monthly_revenue(&self) -> Result<Money, FulfillmentError> {
        let since = start_of_month(Utc::now());
        self.db.sum_order_totals(&REVENUE_STATUSES, Some(since)).await
    }

    pub async fn total_items_in_order(&self, id: OrderId) -> Result<i64, FulfillmentError> {
        let order = self.db.fetch_order(id).await?.ok_or(FulfillmentError::OrderNotFound(id))?;
        Ok(order.item_count())
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}
