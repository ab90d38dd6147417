use std::collections::HashMap;

use cucumber::World;
use ea_store_engine::{
    db_types::OrderId,
    events::EventProducers,
    fulfillment_objects::FulfillmentReport,
    test_utils::{
        fakes::{test_catalog, RecordingNotifier},
        prepare_env::{create_database, random_db_path, run_migrations},
    },
    CheckoutApi,
    FulfillmentApi,
    SqliteDatabase,
    StaticCatalog,
};
use log::*;

#[derive(Default, Debug, World)]
pub struct StoreWorld {
    pub system: Option<StoreSystem>,
    /// Scenario aliases ("A", "B") for generated order ids.
    pub orders: HashMap<String, OrderId>,
    pub last_report: Option<FulfillmentReport>,
}

#[derive(Debug)]
pub struct StoreSystem {
    pub db_path: String,
    pub api: FulfillmentApi<SqliteDatabase, StaticCatalog, RecordingNotifier>,
    pub checkout: CheckoutApi<SqliteDatabase>,
    pub notifier: RecordingNotifier,
}

impl StoreWorld {
    pub fn system(&self) -> &StoreSystem {
        self.system.as_ref().expect("Store system not initialised")
    }

    pub fn api(&self) -> &FulfillmentApi<SqliteDatabase, StaticCatalog, RecordingNotifier> {
        &self.system().api
    }

    pub fn order_id(&self, alias: &str) -> OrderId {
        self.orders.get(alias).cloned().unwrap_or_else(|| panic!("No order with alias {alias}"))
    }
}

impl StoreSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        run_migrations(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let notifier = RecordingNotifier::new();
        let api = FulfillmentApi::new(db.clone(), test_catalog(), notifier.clone(), EventProducers::default());
        let checkout = CheckoutApi::new(db, EventProducers::default());
        Self { db_path: url, api, checkout, notifier }
    }
}
