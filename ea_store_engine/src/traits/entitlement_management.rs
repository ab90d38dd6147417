use crate::{
    db_types::{Customer, Entitlement, NewEntitlement, OrderId},
    traits::{data_objects::GrantResult, StoreError},
};

/// Storage for customers and the artifacts they are entitled to download.
#[allow(async_fn_in_trait)]
pub trait EntitlementManagement {
    /// Looks up a customer by email. Matching is case-insensitive.
    async fn fetch_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;

    /// Grants the entitlement to the customer with the given email, creating the customer if necessary.
    ///
    /// The grant has set-union semantics keyed on the entitlement id. If a record already exists for the order,
    /// nothing is written and [`GrantResult::AlreadyGranted`] is returned. Customer resolution and the insert happen in
    /// a single transaction.
    async fn grant_entitlement(&self, email: &str, entitlement: NewEntitlement) -> Result<GrantResult, StoreError>;

    async fn fetch_entitlements_for_customer(&self, email: &str) -> Result<Vec<Entitlement>, StoreError>;

    async fn fetch_entitlement_for_order(&self, order_id: &OrderId) -> Result<Option<Entitlement>, StoreError>;

    /// Increments the download counter on an entitlement belonging to `email`. Returns `None` if the customer does not
    /// own an entitlement with that id.
    async fn record_download(&self, email: &str, entitlement_id: &str) -> Result<Option<Entitlement>, StoreError>;
}
