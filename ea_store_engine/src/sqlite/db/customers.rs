use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::Customer;

/// Resolves the customer for `email`, creating the record on first use. The `email` column is `COLLATE NOCASE`, so
/// `Alice@Example.com` and `alice@example.com` are the same customer.
pub async fn fetch_or_create_customer(email: &str, conn: &mut SqliteConnection) -> Result<Customer, sqlx::Error> {
    let email = email.trim();
    let result = sqlx::query("INSERT INTO customers (email, created_at) VALUES ($1, $2) ON CONFLICT (email) DO NOTHING")
        .bind(email)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() > 0 {
        debug!("🧑️ New customer record created for {email}");
    }
    let customer = sqlx::query_as("SELECT * FROM customers WHERE email = $1").bind(email).fetch_one(conn).await?;
    Ok(customer)
}

pub async fn fetch_customer_by_email(
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Customer>, sqlx::Error> {
    let customer =
        sqlx::query_as("SELECT * FROM customers WHERE email = $1").bind(email.trim()).fetch_optional(conn).await?;
    Ok(customer)
}
