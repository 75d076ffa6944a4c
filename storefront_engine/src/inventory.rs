//! Inventory guard
//!
//! The only two operations that change a product's stock level. A reservation fails rather than let stock go
//! negative; a release is the compensating action for a cancelled order and always succeeds for a valid quantity.
//!
//! Database backends apply the same rules as single conditional statements so that the check and the decrement are
//! atomic. The functions here define the rules and produce the errors.
use crate::{
    db_types::{Product, ProductId},
    traits::FulfillmentError,
};

pub fn validate_quantity(product_id: ProductId, quantity: i64) -> Result<(), FulfillmentError> {
    if quantity < 1 {
        return Err(FulfillmentError::InvalidQuantity { product_id, quantity });
    }
    Ok(())
}

/// Takes `quantity` units out of stock.
pub fn reserve(product: &mut Product, quantity: i64) -> Result<(), FulfillmentError> {
    validate_quantity(product.id, quantity)?;
    if product.stock_quantity < quantity {
        return Err(FulfillmentError::InsufficientStock {
            product_id: product.id,
            requested: quantity,
            available: product.stock_quantity,
        });
    }
    product.stock_quantity -= quantity;
    Ok(())
}

/// Puts `quantity` units back into stock.
pub fn release(product: &mut Product, quantity: i64) -> Result<(), FulfillmentError> {
    validate_quantity(product.id, quantity)?;
    product.stock_quantity = product.stock_quantity.saturating_add(quantity);
    Ok(())
}
