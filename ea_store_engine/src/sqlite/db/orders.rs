use chrono::{Duration, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId},
    traits::StoreError,
};

// Statements with a `RETURNING` clause are read with `fetch_all`. A statement that is not stepped to completion keeps
// its write pending on the connection, and other connections in the pool will not see it.

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
pub async fn idempotent_insert(order: NewOrder, conn: &mut SqliteConnection) -> Result<(Order, bool), StoreError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// New orders are always `pending`.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_email,
                customer_phone,
                artifact_name,
                payment_method,
                amount,
                currency,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $8)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.customer_email)
    .bind(order.customer_phone)
    .bind(order.artifact_name)
    .bind(order.payment_method)
    .bind(order.amount)
    .bind(order.currency)
    .bind(order.created_at)
    .fetch_all(conn)
    .await?
    .pop()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Returns the most recent order carrying the given provider reference.
pub async fn fetch_order_by_transaction_id(
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE transaction_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn set_transaction_id(
    order_id: &OrderId,
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET transaction_id = $2, updated_at = $3
            WHERE order_id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(transaction_id)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .pop();
    Ok(order)
}

/// The `pending -> completed` compare-and-set. Only one caller can ever receive `Some` for a given order.
pub async fn mark_completed(
    order_id: &OrderId,
    transaction_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'completed',
                transaction_id = COALESCE($2, transaction_id),
                paid_at = COALESCE(paid_at, $3),
                updated_at = $3
            WHERE order_id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(transaction_id)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .pop();
    trace!("📝️ Completion CAS for [{order_id}] applied: {}", order.is_some());
    Ok(order)
}

/// The `pending -> failed` compare-and-set.
pub async fn mark_failed(
    order_id: &OrderId,
    reason: &str,
    transaction_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'failed',
                failure_reason = $2,
                transaction_id = COALESCE($3, transaction_id),
                updated_at = $4
            WHERE order_id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(reason)
    .bind(transaction_id)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .pop();
    trace!("📝️ Failure CAS for [{order_id}] applied: {}", order.is_some());
    Ok(order)
}

/// `ea_delivered` is sticky: once an entitlement is known to exist, a later failed attempt cannot clear the flag or
/// leave an error message behind.
pub async fn record_entitlement_outcome(
    order_id: &OrderId,
    error: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let delivered = error.is_none();
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                ea_delivery_error = CASE WHEN ea_delivered OR $2 THEN NULL ELSE $3 END,
                ea_delivered = (ea_delivered OR $2),
                updated_at = $4
            WHERE order_id = $1;
        "#,
    )
    .bind(order_id.as_str())
    .bind(delivered)
    .bind(error)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Takes the email lease. Returns `true` if this caller now holds it.
pub async fn claim_email_lease(
    order_id: &OrderId,
    lease: Duration,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let stale_before = now - lease;
    let result = sqlx::query(
        r#"
            UPDATE orders SET email_claimed_at = $2
            WHERE order_id = $1
              AND email_sent = FALSE
              AND (email_claimed_at IS NULL OR email_claimed_at < $3);
        "#,
    )
    .bind(order_id.as_str())
    .bind(now)
    .bind(stale_before)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Records the email outcome and releases the lease. Like `ea_delivered`, `email_sent` is never cleared.
pub async fn record_email_outcome(
    order_id: &OrderId,
    error: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let sent = error.is_none();
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                email_error = CASE WHEN email_sent OR $2 THEN NULL ELSE $3 END,
                email_sent = (email_sent OR $2),
                email_claimed_at = NULL,
                updated_at = $4
            WHERE order_id = $1;
        "#,
    )
    .bind(order_id.as_str())
    .bind(sent)
    .bind(error)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn stamp_retry(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let now = Utc::now();
    let order = sqlx::query_as("UPDATE orders SET last_retry_at = $2, updated_at = $2 WHERE order_id = $1 RETURNING *")
        .bind(order_id.as_str())
        .bind(now)
        .fetch_all(conn)
        .await?
        .pop();
    Ok(order)
}
