use std::fmt::Debug;

use log::*;

use crate::{api::errors::FulfillmentError, db_types::Entitlement, traits::EntitlementManagement};

/// Read access to a customer's entitlements, plus download bookkeeping.
pub struct EntitlementApi<B> {
    db: B,
}

impl<B> Debug for EntitlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntitlementApi")
    }
}

impl<B> EntitlementApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> EntitlementApi<B>
where B: EntitlementManagement
{
    /// All the artifacts the customer may download, oldest purchase first. Unknown customers simply have none.
    pub async fn entitlements_for_customer(&self, email: &str) -> Result<Vec<Entitlement>, FulfillmentError> {
        self.db.fetch_entitlements_for_customer(email).await.map_err(FulfillmentError::unavailable)
    }

    pub async fn record_download(&self, email: &str, entitlement_id: &str) -> Result<Entitlement, FulfillmentError> {
        let entitlement = self
            .db
            .record_download(email, entitlement_id)
            .await?
            .ok_or_else(|| FulfillmentError::EntitlementNotFound(entitlement_id.to_string()))?;
        debug!("📥️ {email} downloaded {} ({} downloads)", entitlement.artifact_name, entitlement.download_count);
        Ok(entitlement)
    }
}
