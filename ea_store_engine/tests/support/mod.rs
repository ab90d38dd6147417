#![allow(dead_code)]
use ea_store_engine::{
    db_types::{NewOrder, Order, OrderId, PaymentMethod},
    events::EventProducers,
    test_utils::{
        fakes::{test_catalog, RecordingNotifier},
        prepare_env::{prepare_test_env, random_db_path},
    },
    CheckoutApi,
    EntitlementApi,
    FulfillmentApi,
    OrderManagement,
    SqliteDatabase,
    StaticCatalog,
};
use eas_common::Money;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub type TestFulfillmentApi = FulfillmentApi<SqliteDatabase, StaticCatalog, RecordingNotifier>;

pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    /// Shared with `fulfillment`, so replacing its contents changes what the engine can grant.
    pub catalog: StaticCatalog,
    pub fulfillment: TestFulfillmentApi,
    pub checkout: CheckoutApi<SqliteDatabase>,
    pub entitlements: EntitlementApi<SqliteDatabase>,
    pub notifier: RecordingNotifier,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let notifier = RecordingNotifier::new();
        let catalog = test_catalog();
        let fulfillment = FulfillmentApi::new(db.clone(), catalog.clone(), notifier.clone(), producers.clone());
        let checkout = CheckoutApi::new(db.clone(), producers);
        let entitlements = EntitlementApi::new(db.clone());
        Self { url, db, catalog, fulfillment, checkout, entitlements, notifier }
    }

    /// Creates a pending order the same way the checkout route does.
    pub async fn pending_order(&self, email: &str, artifact: &str) -> Order {
        let order = NewOrder::new(
            OrderId::generate(),
            email.to_string(),
            artifact.to_string(),
            PaymentMethod::Paypal,
            Money::from(4999),
            "USD".to_string(),
        );
        self.checkout.create_order(order).await.expect("Error creating order")
    }

    pub async fn order(&self, order_id: &OrderId) -> Order {
        self.db.fetch_order_by_order_id(order_id).await.expect("Error fetching order").expect("Order does not exist")
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.url);
        }
    }
}
