use std::str::FromStr;

use cucumber::given;
use storefront_engine::{
    db_types::{Money, NewProduct},
    CatalogManagement,
};

use crate::cucumber::{storefront_world::StorefrontSystem, StorefrontWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut StorefrontWorld) {
    let system = StorefrontSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a product '{word}' priced at {word} with {int} in stock")]
async fn add_product(world: &mut StorefrontWorld, name: String, price: String, stock: i64) {
    let price = Money::from_str(&price).expect("Not a valid price");
    let product = world.system().db.insert_product(NewProduct::new(&name, price, stock)).await.expect("Error adding product");
    world.products.insert(name, product);
}

#[given("the gateway is down")]
async fn gateway_down(world: &mut StorefrontWorld) {
    world.system().gateway.set_failing(true);
}
