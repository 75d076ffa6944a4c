use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewProduct, Product, ProductId, ProductUpdate},
    inventory,
    traits::FulfillmentError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, FulfillmentError> {
    if product.stock_quantity < 0 {
        return Err(FulfillmentError::DatabaseError(format!(
            "Cannot create product '{}' with negative stock {}",
            product.name, product.stock_quantity
        )));
    }
    if product.price.is_negative() {
        return Err(FulfillmentError::DatabaseError(format!(
            "Cannot create product '{}' with negative price {}",
            product.name, product.price
        )));
    }
    let now = Utc::now();
    let product = sqlx::query_as::<_, Product>(
        r#"
            INSERT INTO products (name, description, price, stock_quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, name, description, price, stock_quantity, created_at, updated_at;
        "#,
    )
    .bind(product.name)
    .bind(product.description)
    .bind(product.price)
    .bind(product.stock_quantity)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product {} '{}' created with {} units in stock", product.id, product.name, product.stock_quantity);
    Ok(product)
}

pub async fn fetch_product(id: ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, FulfillmentError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
            SELECT id, name, description, price, stock_quantity, created_at, updated_at
            FROM products
            WHERE id = $1;
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, FulfillmentError> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT id, name, description, price, stock_quantity, created_at, updated_at FROM products ORDER BY id",
    )
    .fetch_all(conn)
    .await?;
    Ok(products)
}

pub async fn update_product_details(
    id: ProductId,
    update: ProductUpdate,
    conn: &mut SqliteConnection,
) -> Result<Product, FulfillmentError> {
    if let Some(price) = update.price {
        if price.is_negative() {
            return Err(FulfillmentError::DatabaseError(format!("Cannot set a negative price {price} on {id}")));
        }
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(name) = update.name {
        builder.push(", name = ");
        builder.push_bind(name);
    }
    if let Some(description) = update.description {
        builder.push(", description = ");
        builder.push_bind(description);
    }
    if let Some(price) = update.price {
        builder.push(", price = ");
        builder.push_bind(price);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING id, name, description, price, stock_quantity, created_at, updated_at");
    trace!("🗃️ Executing query: {}", builder.sql());
    let product = builder.build_query_as::<Product>().fetch_optional(conn).await?;
    product.ok_or(FulfillmentError::ProductNotFound(id))
}

/// Takes `quantity` units of the product out of stock, returning the updated product.
///
/// The check and the decrement are a single conditional statement, so concurrent reservations can never drive the
/// stock below zero.
pub async fn reserve_stock(
    id: ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, FulfillmentError> {
    inventory::validate_quantity(id, quantity)?;
    let reserved = sqlx::query_as::<_, Product>(
        r#"
            UPDATE products SET stock_quantity = stock_quantity - $1, updated_at = $2
            WHERE id = $3 AND stock_quantity >= $1
            RETURNING id, name, description, price, stock_quantity, created_at, updated_at;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(product) = reserved {
        trace!("🗃️ Reserved {quantity} units of {id}. {} left", product.stock_quantity);
        return Ok(product);
    }
    let mut product = fetch_product(id, conn).await?.ok_or(FulfillmentError::ProductNotFound(id))?;
    inventory::reserve(&mut product, quantity)?;
    error!("🗃️ Stock for {id} was sufficient, but the reservation of {quantity} units did not apply");
    Err(FulfillmentError::DatabaseError(format!("Could not reserve {quantity} units of {id}")))
}

/// Puts `quantity` units of the product back into stock, returning the updated product.
pub async fn release_stock(
    id: ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, FulfillmentError> {
    inventory::validate_quantity(id, quantity)?;
    let product = sqlx::query_as::<_, Product>(
        r#"
            UPDATE products SET stock_quantity = stock_quantity + $1, updated_at = $2
            WHERE id = $3
            RETURNING id, name, description, price, stock_quantity, created_at, updated_at;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(FulfillmentError::ProductNotFound(id))?;
    trace!("🗃️ Released {quantity} units of {id}. {} in stock", product.stock_quantity);
    Ok(product)
}
