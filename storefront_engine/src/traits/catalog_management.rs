use crate::{
    db_types::{NewProduct, Product, ProductId, ProductUpdate},
    traits::FulfillmentError,
};

#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Adds a product to the catalog with its opening stock level.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, FulfillmentError>;

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, FulfillmentError>;

    /// All catalog products, ordered by id.
    async fn fetch_products(&self) -> Result<Vec<Product>, FulfillmentError>;

    /// Changes the name, description or price of a product. Stock levels are not editable through this call; they only
    /// change when orders reserve or return units.
    ///
    /// Prices already captured in existing order lines are not affected.
    async fn update_product_details(&self, id: ProductId, update: ProductUpdate) -> Result<Product, FulfillmentError>;
}
