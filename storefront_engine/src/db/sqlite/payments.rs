use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{GatewayPaymentId, NewPayment, OrderId, Payment, PaymentStatus},
    traits::FulfillmentError,
};

/// Stores a new `Pending` payment. Fails with `PaymentAlreadyExists` if the order already has one.
pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, FulfillmentError> {
    let order_id = payment.order_id;
    let now = Utc::now();
    let result = sqlx::query_as::<_, Payment>(
        r#"
            INSERT INTO payments (
                order_id,
                gateway_payment_id,
                status,
                amount,
                currency,
                description,
                confirmation_url,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING id, order_id, gateway_payment_id, status, amount, currency, description, confirmation_url,
                      created_at, updated_at;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.gateway_payment_id)
    .bind(PaymentStatus::Pending)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.description)
    .bind(payment.confirmation_url)
    .bind(now)
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(payment) => {
            debug!("🗃️ Payment {} for order {order_id} stored", payment.gateway_payment_id);
            Ok(payment)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            if payment_exists_for_order(order_id, conn).await? {
                Err(FulfillmentError::PaymentAlreadyExists(order_id))
            } else {
                Err(FulfillmentError::DatabaseError(e.to_string()))
            }
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, FulfillmentError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
            SELECT id, order_id, gateway_payment_id, status, amount, currency, description, confirmation_url,
                   created_at, updated_at
            FROM payments
            WHERE order_id = $1;
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment_by_gateway_id(
    id: &GatewayPaymentId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, FulfillmentError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
            SELECT id, order_id, gateway_payment_id, status, amount, currency, description, confirmation_url,
                   created_at, updated_at
            FROM payments
            WHERE gateway_payment_id = $1;
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn payment_exists_for_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<bool, FulfillmentError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(conn)
        .await?;
    Ok(exists > 0)
}

/// Moves the payment into `status` if the payment state machine allows it from the status the payment is in. Each
/// candidate predecessor is tried as a conditional update, which makes this a compare-and-set.
///
/// Returns the previous status and the updated payment, or `None` if nothing was changed.
pub async fn transition_status(
    id: &GatewayPaymentId,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<(PaymentStatus, Payment)>, FulfillmentError> {
    for &previous in PaymentStatus::predecessors(status) {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
                UPDATE payments SET status = $1, updated_at = $2
                WHERE gateway_payment_id = $3 AND status = $4
                RETURNING id, order_id, gateway_payment_id, status, amount, currency, description, confirmation_url,
                          created_at, updated_at;
            "#,
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .bind(previous)
        .fetch_optional(&mut *conn)
        .await?;
        if let Some(payment) = payment {
            trace!("🗃️ Payment {id} moved from {previous} to {status}");
            return Ok(Some((previous, payment)));
        }
    }
    Ok(None)
}
