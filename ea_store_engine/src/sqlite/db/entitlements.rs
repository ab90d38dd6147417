use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Entitlement, NewEntitlement, OrderId};

pub async fn fetch_entitlement_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Entitlement>, sqlx::Error> {
    let entitlement = sqlx::query_as("SELECT * FROM entitlements WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(entitlement)
}

/// Inserts the entitlement for `customer_id` unless one already exists for the same id or order.
///
/// Returns `None` when the insert was a no-op. The caller should then fetch the existing record.
pub async fn insert_entitlement(
    customer_id: i64,
    entitlement: NewEntitlement,
    conn: &mut SqliteConnection,
) -> Result<Option<Entitlement>, sqlx::Error> {
    let id = entitlement.entitlement_id();
    let inserted: Option<Entitlement> = sqlx::query_as(
        r#"
            INSERT INTO entitlements (
                id,
                customer_id,
                artifact_id,
                artifact_name,
                order_id,
                purchase_date,
                version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(&id)
    .bind(customer_id)
    .bind(entitlement.artifact_id)
    .bind(entitlement.artifact_name)
    .bind(entitlement.order_id)
    .bind(entitlement.purchase_date)
    .bind(entitlement.version)
    .fetch_all(conn)
    .await?
    .pop();
    if inserted.is_some() {
        debug!("🎟️ Entitlement {id} granted to customer #{customer_id}");
    }
    Ok(inserted)
}

pub async fn fetch_entitlements_for_customer(
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Entitlement>, sqlx::Error> {
    let entitlements = sqlx::query_as(
        r#"
            SELECT entitlements.* FROM entitlements
            JOIN customers ON customers.id = entitlements.customer_id
            WHERE customers.email = $1
            ORDER BY entitlements.purchase_date ASC
        "#,
    )
    .bind(email.trim())
    .fetch_all(conn)
    .await?;
    Ok(entitlements)
}

pub async fn record_download(
    email: &str,
    entitlement_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Entitlement>, sqlx::Error> {
    let entitlement = sqlx::query_as(
        r#"
            UPDATE entitlements SET
                download_count = download_count + 1,
                last_downloaded = $3
            WHERE id = $2
              AND customer_id = (SELECT id FROM customers WHERE email = $1)
            RETURNING *;
        "#,
    )
    .bind(email.trim())
    .bind(entitlement_id)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .pop();
    Ok(entitlement)
}
