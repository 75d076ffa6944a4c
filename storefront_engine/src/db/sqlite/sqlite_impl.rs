//! `SqliteDatabase` is a concrete implementation of a storefront engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{new_pool, orders, payments, products};
use crate::{
    config::EngineConfig,
    db_types::{
        GatewayPaymentId,
        Money,
        NewOrder,
        NewPayment,
        NewProduct,
        Order,
        OrderId,
        OrderStatusType,
        Payment,
        PaymentStatus,
        Product,
        ProductId,
        ProductUpdate,
    },
    reconciliation,
    sfe_api::order_objects::OrderQueryFilter,
    traits::{
        CatalogManagement,
        FulfillmentDatabase,
        FulfillmentError,
        OrderManagement,
        OrderStatusUpdate,
        PaymentManagement,
        PaymentStatusChange,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), FulfillmentError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(id, &mut conn).await
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_products(&mut conn).await
    }

    async fn update_product_details(&self, id: ProductId, update: ProductUpdate) -> Result<Product, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        if update.is_empty() {
            return products::fetch_product(id, &mut conn).await?.ok_or(FulfillmentError::ProductNotFound(id));
        }
        products::update_product_details(id, update, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    /// Stores the order and reserves its stock in one transaction. The transaction is dropped, and so rolled back, if
    /// any line cannot be reserved.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB for {}", order.id, order.customer_email);
        Ok(order)
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(id, &mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        trace!("🗃️ Searching orders. {query}");
        orders::search_orders(query, &mut conn).await
    }

    async fn count_orders(&self, status: Option<OrderStatusType>) -> Result<i64, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        orders::count_orders(status, &mut conn).await
    }

    async fn sum_order_totals(
        &self,
        statuses: &[OrderStatusType],
        since: Option<DateTime<Utc>>,
    ) -> Result<Money, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        orders::sum_order_totals(statuses, since, &mut conn).await
    }

    async fn cancel_order(&self, id: OrderId) -> Result<OrderStatusUpdate, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let update = orders::cancel_order(id, &mut tx).await?;
        tx.commit().await?;
        Ok(update)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatusType,
    ) -> Result<OrderStatusUpdate, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let update = orders::update_order_status(id, status, &mut tx).await?;
        tx.commit().await?;
        Ok(update)
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        orders::delete_order(id, &mut conn).await
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_payment(payment, &mut conn).await
    }

    async fn fetch_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_for_order(order_id, &mut conn).await
    }

    async fn fetch_payment_by_gateway_id(&self, id: &GatewayPaymentId) -> Result<Option<Payment>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_gateway_id(id, &mut conn).await
    }

    async fn payment_exists_for_order(&self, order_id: OrderId) -> Result<bool, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        payments::payment_exists_for_order(order_id, &mut conn).await
    }

    /// In a single atomic transaction,
    /// * moves the payment to `status` if the payment state machine allows it,
    /// * applies the reconciliation rule for `status` (if any) to the payment's order.
    ///
    /// Repeating a status the payment already has changes nothing.
    async fn update_payment_status(
        &self,
        id: &GatewayPaymentId,
        status: PaymentStatus,
    ) -> Result<PaymentStatusChange, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        if let Some((previous, payment)) = payments::transition_status(id, status, &mut tx).await? {
            let reconciled_order = match reconciliation::order_transition_for(status) {
                Some(rule) => {
                    orders::compare_and_set_status(payment.order_id, &[rule.from], rule.to, &mut tx)
                        .await?
                        .map(|(_, order)| order)
                },
                None => None,
            };
            tx.commit().await?;
            match &reconciled_order {
                Some(order) => debug!("🗃️ Payment {id} is {status}. Order {} is now {}", order.id, order.status),
                None => debug!("🗃️ Payment {id} is {status}. Order {} is unchanged", payment.order_id),
            }
            return Ok(PaymentStatusChange::Applied { previous, payment, reconciled_order });
        }
        let current = payments::fetch_payment_by_gateway_id(id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::PaymentNotFound(id.clone()))?;
        if current.status == status {
            trace!("🗃️ Payment {id} is already {status}. Nothing to do");
            Ok(PaymentStatusChange::Unchanged(current))
        } else {
            Err(FulfillmentError::InvalidPaymentTransition { payment_id: id.clone(), from: current.status, to: status })
        }
    }
}

impl SqliteDatabase {
    /// Creates a new database API object from the engine configuration.
    pub async fn new(config: &EngineConfig) -> Result<Self, sqlx::Error> {
        SqliteDatabase::new_with_url(config.database_url.as_str(), config.max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
