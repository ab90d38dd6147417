//! `SqliteDatabase` is the concrete storage backend for the EA store engine.
//!
//! It implements [`OrderManagement`] and [`EntitlementManagement`], and therefore
//! [`crate::traits::FulfillmentDatabase`].
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

use super::db::{customers, db_url, entitlements, new_pool, orders, run_migrations};
use crate::{
    db_types::{Customer, Entitlement, NewEntitlement, NewOrder, Order, OrderId},
    traits::{EntitlementManagement, GrantResult, OrderManagement, StoreError},
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

impl SqliteDatabase {
    /// Creates a new database API object, using the `EAS_DATABASE_URL` environment variable, or the default.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Creates the database file if it does not exist yet. Returns `true` if a new database was created.
    pub async fn create_if_missing(url: &str) -> Result<bool, sqlx::Error> {
        if Sqlite::database_exists(url).await? {
            return Ok(false);
        }
        Sqlite::create_database(url).await?;
        info!("🗃️ Created Sqlite database {url}");
        Ok(true)
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        run_migrations(&self.pool).await.map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_transaction_id(transaction_id, &mut conn).await?;
        Ok(order)
    }

    async fn set_transaction_id(&self, order_id: &OrderId, transaction_id: &str) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::set_transaction_id(order_id, transaction_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_order_completed(
        &self,
        order_id: &OrderId,
        transaction_id: Option<&str>,
    ) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::mark_completed(order_id, transaction_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_order_failed(
        &self,
        order_id: &OrderId,
        reason: &str,
        transaction_id: Option<&str>,
    ) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::mark_failed(order_id, reason, transaction_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn record_entitlement_outcome(&self, order_id: &OrderId, error: Option<&str>) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        match orders::record_entitlement_outcome(order_id, error, &mut conn).await? {
            0 => Err(StoreError::OrderNotFound(order_id.clone())),
            _ => Ok(()),
        }
    }

    async fn claim_email_lease(&self, order_id: &OrderId, lease: Duration) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let claimed = orders::claim_email_lease(order_id, lease, &mut conn).await?;
        Ok(claimed)
    }

    async fn record_email_outcome(&self, order_id: &OrderId, error: Option<&str>) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        match orders::record_email_outcome(order_id, error, &mut conn).await? {
            0 => Err(StoreError::OrderNotFound(order_id.clone())),
            _ => Ok(()),
        }
    }

    async fn stamp_retry(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::stamp_retry(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }
}

impl EntitlementManagement for SqliteDatabase {
    async fn fetch_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let customer = customers::fetch_customer_by_email(email, &mut conn).await?;
        Ok(customer)
    }

    async fn grant_entitlement(&self, email: &str, entitlement: NewEntitlement) -> Result<GrantResult, StoreError> {
        let order_id = entitlement.order_id.clone();
        let mut tx = self.pool.begin().await?;
        // The customer upsert is a write, so it takes the write lock before anything is read in this transaction.
        let customer = customers::fetch_or_create_customer(email, &mut tx).await?;
        if let Some(existing) = entitlements::fetch_entitlement_for_order(&order_id, &mut tx).await? {
            tx.commit().await?;
            trace!("🎟️ Entitlement for order [{order_id}] already exists");
            return Ok(GrantResult::AlreadyGranted(existing));
        }
        let result = match entitlements::insert_entitlement(customer.id, entitlement, &mut tx).await? {
            Some(granted) => GrantResult::Granted(granted),
            None => {
                let existing = entitlements::fetch_entitlement_for_order(&order_id, &mut tx)
                    .await?
                    .ok_or_else(|| StoreError::EntitlementNotFound(order_id.to_string()))?;
                GrantResult::AlreadyGranted(existing)
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_entitlements_for_customer(&self, email: &str) -> Result<Vec<Entitlement>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let entitlements = entitlements::fetch_entitlements_for_customer(email, &mut conn).await?;
        Ok(entitlements)
    }

    async fn fetch_entitlement_for_order(&self, order_id: &OrderId) -> Result<Option<Entitlement>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let entitlement = entitlements::fetch_entitlement_for_order(order_id, &mut conn).await?;
        Ok(entitlement)
    }

    async fn record_download(&self, email: &str, entitlement_id: &str) -> Result<Option<Entitlement>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let entitlement = entitlements::record_download(email, entitlement_id, &mut tx).await?;
        tx.commit().await?;
        Ok(entitlement)
    }
}
