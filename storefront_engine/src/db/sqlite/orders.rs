use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use super::products;
use crate::{
    db_types::{Money, NewOrder, Order, OrderId, OrderLine, OrderStatusType},
    inventory,
    sfe_api::order_objects::OrderQueryFilter,
    traits::{FulfillmentError, OrderStatusUpdate},
};

/// An `orders` row, without its lines.
#[derive(Debug, Clone, FromRow)]
struct OrderRecord {
    id: OrderId,
    customer_name: String,
    customer_email: String,
    customer_address: String,
    ordered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status: OrderStatusType,
    total_amount: Money,
    currency: String,
}

impl OrderRecord {
    fn with_lines(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_address: self.customer_address,
            ordered_at: self.ordered_at,
            updated_at: self.updated_at,
            status: self.status,
            total_amount: self.total_amount,
            currency: self.currency,
            lines,
        }
    }
}

/// Inserts a new order, reserving stock for each line as it goes. This is not atomic. Embed this call inside a
/// transaction and pass `&mut *tx` as the connection, so that a failed reservation rolls back the whole order.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, FulfillmentError> {
    if order.lines.is_empty() {
        return Err(FulfillmentError::EmptyCart);
    }
    let mut item_count = 0i64;
    for line in &order.lines {
        inventory::validate_quantity(line.product_id, line.quantity)?;
        item_count = item_count
            .checked_add(line.quantity)
            .ok_or(FulfillmentError::InvalidQuantity { product_id: line.product_id, quantity: line.quantity })?;
    }
    let now = Utc::now();
    let id = sqlx::query_scalar::<_, OrderId>(
        r#"
            INSERT INTO orders (
                customer_name,
                customer_email,
                customer_address,
                status,
                total_amount,
                currency,
                ordered_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, 0, $5, $6, $6)
            RETURNING id;
        "#,
    )
    .bind(&order.customer.name)
    .bind(&order.customer.email)
    .bind(&order.customer.address)
    .bind(OrderStatusType::Pending)
    .bind(&order.currency)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    let mut total = Money::default();
    for line in &order.lines {
        let product = products::reserve_stock(line.product_id, line.quantity, conn).await?;
        sqlx::query(
            r#"
                INSERT INTO order_lines (order_id, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(id)
        .bind(product.id)
        .bind(&product.name)
        .bind(line.quantity)
        .bind(product.price)
        .execute(&mut *conn)
        .await?;
        total = product
            .price
            .checked_mul(line.quantity)
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or(FulfillmentError::InvalidQuantity { product_id: line.product_id, quantity: line.quantity })?;
    }
    sqlx::query("UPDATE orders SET total_amount = $1 WHERE id = $2").bind(total).bind(id).execute(&mut *conn).await?;
    debug!("🗃️ Order {id} stored with {} lines, {item_count} units and a total of {total}", order.lines.len());
    fetch_order(id, conn)
        .await?
        .ok_or_else(|| FulfillmentError::DatabaseError(format!("Order {id} could not be read back after insert")))
}

async fn fetch_order_record(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<OrderRecord>, FulfillmentError> {
    let record = sqlx::query_as::<_, OrderRecord>(
        r#"
            SELECT id, customer_name, customer_email, customer_address, ordered_at, updated_at, status, total_amount,
                   currency
            FROM orders
            WHERE id = $1;
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

pub async fn fetch_order(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, FulfillmentError> {
    match fetch_order_record(id, conn).await? {
        Some(record) => {
            let lines = fetch_lines(id, conn).await?;
            Ok(Some(record.with_lines(lines)))
        },
        None => Ok(None),
    }
}

pub async fn fetch_lines(id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderLine>, FulfillmentError> {
    let lines = sqlx::query_as::<_, OrderLine>(
        r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price
            FROM order_lines
            WHERE order_id = $1
            ORDER BY id;
        "#,
    )
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

async fn fetch_lines_for_orders(
    ids: &[OrderId],
    conn: &mut SqliteConnection,
) -> Result<HashMap<OrderId, Vec<OrderLine>>, FulfillmentError> {
    let mut result = HashMap::<OrderId, Vec<OrderLine>>::with_capacity(ids.len());
    if ids.is_empty() {
        return Ok(result);
    }
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, order_id, product_id, product_name, quantity, unit_price FROM order_lines WHERE order_id IN (",
    );
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(") ORDER BY id");
    let lines = builder.build_query_as::<OrderLine>().fetch_all(conn).await?;
    for line in lines {
        result.entry(line.order_id).or_default().push(line);
    }
    Ok(result)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
pub async fn search_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, FulfillmentError> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
    SELECT id, customer_name, customer_email, customer_address, ordered_at, updated_at, status, total_amount, currency
    FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(email) = query.customer_email {
        where_clause.push("lower(customer_email) = ");
        where_clause.push_bind_unseparated(email.trim().to_lowercase());
    }
    if let Some(term) = query.search_term {
        let term = term.trim().to_lowercase();
        let pattern = format!("%{term}%");
        where_clause.push("(CAST(id AS TEXT) = ");
        where_clause.push_bind_unseparated(term.trim_start_matches('#').to_string());
        where_clause.push_unseparated(" OR lower(customer_name) LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR lower(customer_email) LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR lower(customer_address) LIKE ");
        where_clause.push_bind_unseparated(pattern);
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("ordered_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("ordered_at < ");
        where_clause.push_bind_unseparated(until);
    }
    if let Some(statuses) = query.status {
        if statuses.is_empty() {
            where_clause.push("0 = 1");
        } else {
            where_clause.push("status IN (");
            for (i, status) in statuses.into_iter().enumerate() {
                if i > 0 {
                    where_clause.push_unseparated(", ");
                }
                where_clause.push_bind_unseparated(status);
            }
            where_clause.push_unseparated(")");
        }
    }
    if query.newest_first {
        builder.push(" ORDER BY ordered_at DESC, id DESC");
    } else {
        builder.push(" ORDER BY ordered_at ASC, id ASC");
    }
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let records = builder.build_query_as::<OrderRecord>().fetch_all(&mut *conn).await?;
    let ids = records.iter().map(|r| r.id).collect::<Vec<_>>();
    let mut lines = fetch_lines_for_orders(&ids, conn).await?;
    let orders = records
        .into_iter()
        .map(|r| {
            let order_lines = lines.remove(&r.id).unwrap_or_default();
            r.with_lines(order_lines)
        })
        .collect::<Vec<Order>>();
    trace!("🗃️ Result of search_orders: {} orders", orders.len());
    Ok(orders)
}

pub async fn count_orders(
    status: Option<OrderStatusType>,
    conn: &mut SqliteConnection,
) -> Result<i64, FulfillmentError> {
    let count = match status {
        Some(status) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE status = $1")
                .bind(status)
                .fetch_one(conn)
                .await?
        },
        None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders").fetch_one(conn).await?,
    };
    Ok(count)
}

pub async fn sum_order_totals(
    statuses: &[OrderStatusType],
    since: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Money, FulfillmentError> {
    if statuses.is_empty() {
        return Ok(Money::default());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COALESCE(SUM(total_amount), 0) FROM orders WHERE status IN (");
    let mut list = builder.separated(", ");
    for status in statuses {
        list.push_bind(*status);
    }
    list.push_unseparated(")");
    if let Some(since) = since {
        builder.push(" AND ordered_at >= ");
        builder.push_bind(since);
    }
    let total = builder.build_query_scalar::<i64>().fetch_one(conn).await?;
    Ok(Money::from(total))
}

/// Moves the order to `to`, provided it is currently in one of the `from` statuses. Every attempt is a conditional
/// update, so the first statement of the calling transaction is always a write.
///
/// Returns the status the order was in together with the updated order, or `None` if the order does not exist or is
/// in none of the `from` statuses.
pub async fn compare_and_set_status(
    id: OrderId,
    from: &[OrderStatusType],
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<(OrderStatusType, Order)>, FulfillmentError> {
    for &previous in from.iter().filter(|s| **s != to) {
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
                UPDATE orders SET status = $1, updated_at = $2
                WHERE id = $3 AND status = $4
                RETURNING id, customer_name, customer_email, customer_address, ordered_at, updated_at, status,
                          total_amount, currency;
            "#,
        )
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(previous)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(record) = record {
            trace!("🗃️ Order {id} moved from {previous} to {to}");
            let lines = fetch_lines(id, conn).await?;
            return Ok(Some((previous, record.with_lines(lines))));
        }
    }
    Ok(None)
}

/// Cancels the order and returns its stock. Not atomic on its own; run it inside a transaction.
pub async fn cancel_order(id: OrderId, conn: &mut SqliteConnection) -> Result<OrderStatusUpdate, FulfillmentError> {
    let cancellable = OrderStatusType::ALL.into_iter().filter(OrderStatusType::is_cancellable).collect::<Vec<_>>();
    match compare_and_set_status(id, &cancellable, OrderStatusType::Cancelled, conn).await? {
        Some((previous, order)) => {
            for line in &order.lines {
                products::release_stock(line.product_id, line.quantity, conn).await?;
            }
            debug!("🗃️ Order {id} cancelled. {} units returned to stock", order.item_count());
            Ok(OrderStatusUpdate::new(previous, order))
        },
        None => match fetch_order_record(id, conn).await? {
            None => Err(FulfillmentError::OrderNotFound(id)),
            Some(record) if record.status == OrderStatusType::Cancelled => Err(FulfillmentError::AlreadyCancelled(id)),
            Some(record) => Err(FulfillmentError::InvalidTransition {
                order_id: id,
                from: record.status,
                to: OrderStatusType::Cancelled,
            }),
        },
    }
}

/// Overwrites the order status with anything but `Cancelled`, which has to go through [`cancel_order`].
pub async fn update_order_status(
    id: OrderId,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<OrderStatusUpdate, FulfillmentError> {
    if status == OrderStatusType::Cancelled {
        return cancel_order(id, conn).await;
    }
    let from = OrderStatusType::ALL
        .into_iter()
        .filter(|s| *s != OrderStatusType::Cancelled && *s != status)
        .collect::<Vec<_>>();
    if let Some((previous, order)) = compare_and_set_status(id, &from, status, conn).await? {
        return Ok(OrderStatusUpdate::new(previous, order));
    }
    match fetch_order(id, conn).await? {
        None => Err(FulfillmentError::OrderNotFound(id)),
        Some(order) if order.status == status => {
            trace!("🗃️ Order {id} is already {status}. Nothing to do");
            Ok(OrderStatusUpdate::new(status, order))
        },
        Some(order) => Err(FulfillmentError::InvalidTransition { order_id: id, from: order.status, to: status }),
    }
}

pub async fn delete_order(id: OrderId, conn: &mut SqliteConnection) -> Result<(), FulfillmentError> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND status IN ($2, $3, $4)")
        .bind(id)
        .bind(OrderStatusType::Cancelled)
        .bind(OrderStatusType::Completed)
        .bind(OrderStatusType::Delivered)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() > 0 {
        debug!("🗃️ Order {id} deleted");
        return Ok(());
    }
    match fetch_order_record(id, conn).await? {
        None => Err(FulfillmentError::OrderNotFound(id)),
        Some(record) => Err(FulfillmentError::OrderStillActive { order_id: id, status: record.status }),
    }
}
