use cucumber::given;

use crate::cucumber::{store_world::StoreSystem, StoreWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut StoreWorld) {
    let system = StoreSystem::new().await;
    world.system = Some(system);
}
