//! Shopping carts
//!
//! A [`Cart`] is the in-memory list of products a customer intends to buy. It holds at most one line per product;
//! adding a product that is already in the cart increases that line's quantity. Carts are never persisted.
//!
//! Carts belong to a customer session. [`SessionCarts`] keeps one cart per session key and hands out a lock on it, so
//! a cart cannot change while an order is being placed from it.
use std::{collections::HashMap, fmt::Display, sync::Arc};

use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::db_types::{CustomerDetails, Money, NewOrder, Product, ProductId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Invalid quantity {quantity} for product {product_id}. Must be positive and keep totals in range")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product as it was when it was last added to the cart
    pub product: Product,
    pub quantity: i64,
}

impl CartLine {
    pub fn product_id(&self) -> ProductId {
        self.product.id
    }

    pub fn line_total(&self) -> Money {
        self.product.price * self.quantity
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` units of `product`, merging with an existing line for the same product. A quantity that would
    /// push the line or cart totals past what `Money` can hold is rejected like a non-positive one.
    pub fn add(&mut self, product: &Product, quantity: i64) -> Result<(), CartError> {
        let invalid = || CartError::InvalidQuantity { product_id: product.id, quantity };
        if quantity < 1 {
            return Err(invalid());
        }
        let merged = match self.quantity_of(product.id) {
            Some(existing) => existing.checked_add(quantity).ok_or_else(invalid)?,
            None => quantity,
        };
        if self.checked_totals(product, merged).is_none() {
            debug!("🛒️ Rejected {quantity} units of product {}. Cart totals would overflow", product.id);
            return Err(invalid());
        }
        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => {
                line.quantity = merged;
                line.product = product.clone();
                trace!("🛒️ Cart line for product {} now has {} units", product.id, line.quantity);
            },
            None => {
                self.lines.push(CartLine { product: product.clone(), quantity });
                trace!("🛒️ Added {quantity} units of product {} to cart", product.id);
            },
        }
        Ok(())
    }

    /// Sets the quantity for a product already in the cart. A quantity of zero or less removes the line. Returns
    /// `Ok(false)` if the product was not in the cart, in which case nothing changes.
    pub fn update(&mut self, product_id: ProductId, quantity: i64) -> Result<bool, CartError> {
        if quantity <= 0 {
            return Ok(self.remove(product_id).is_some());
        }
        let Some(product) = self.lines.iter().find(|l| l.product.id == product_id).map(|l| l.product.clone()) else {
            return Ok(false);
        };
        if self.checked_totals(&product, quantity).is_none() {
            return Err(CartError::InvalidQuantity { product_id, quantity });
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.product.id == product_id) {
            line.quantity = quantity;
        }
        Ok(true)
    }

    pub fn remove(&mut self, product_id: ProductId) -> Option<CartLine> {
        let pos = self.lines.iter().position(|l| l.product.id == product_id)?;
        trace!("🛒️ Removed product {product_id} from cart");
        Some(self.lines.remove(pos))
    }

    /// An independent copy of the cart contents. Later changes to the cart do not affect it.
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot { lines: self.lines.clone() }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<i64> {
        self.lines.iter().find(|l| l.product.id == product_id).map(|l| l.quantity)
    }

    pub fn total_price(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn total_item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The item count and total price the cart would have with `product` at `quantity` units, or `None` if either
    /// overflows.
    fn checked_totals(&self, product: &Product, quantity: i64) -> Option<(i64, Money)> {
        let mut others = self.lines.iter().filter(|l| l.product.id != product.id);
        let count = others.clone().try_fold(quantity, |acc, l| acc.checked_add(l.quantity))?;
        let total = others.try_fold(product.price.checked_mul(quantity)?, |acc, l| {
            acc.checked_add(l.product.price.checked_mul(l.quantity)?)
        })?;
        Some((count, total))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// A frozen copy of a cart's lines, taken at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn total_price(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn total_item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The product ids in the snapshot, sorted and without duplicates.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids = self.lines.iter().map(CartLine::product_id).collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn to_new_order<S: Into<String>>(&self, customer: CustomerDetails, currency: S) -> NewOrder {
        self.lines.iter().fold(NewOrder::new(customer, currency), |order, line| {
            order.with_line(line.product.id, line.quantity)
        })
    }
}

//--------------------------------------     SessionCarts      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One cart per customer session.
#[derive(Debug, Clone, Default)]
pub struct SessionCarts {
    carts: Arc<Mutex<HashMap<SessionKey, Arc<Mutex<Cart>>>>>,
}

impl SessionCarts {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cart for `session`, created empty on first use. Lock it for the duration of any read-modify-write,
    /// including checkout.
    pub async fn cart_for(&self, session: &SessionKey) -> Arc<Mutex<Cart>> {
        let mut carts = self.carts.lock().await;
        let cart = carts.entry(session.clone()).or_insert_with(|| {
            debug!("🛒️ New cart for session {session}");
            Arc::new(Mutex::new(Cart::new()))
        });
        Arc::clone(cart)
    }

    /// Forgets the session's cart, e.g. when the session expires.
    pub async fn drop_session(&self, session: &SessionKey) -> bool {
        let removed = self.carts.lock().await.remove(session).is_some();
        if removed {
            debug!("🛒️ Cart for session {session} discarded");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.carts.lock().await.len()
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn product(id: i64, price: i64) -> Product {
        Product {
            id: ProductId(id),
            name: format!("Product {id}"),
            description: None,
            price: Money::from_major(price),
            stock_quantity: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn adding_the_same_product_merges_lines() {
        let mut cart = Cart::new();
        let a = product(1, 10);
        cart.add(&a, 1).unwrap();
        cart.add(&a, 1).unwrap();
        cart.add(&product(2, 5), 1).unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.quantity_of(ProductId(1)), Some(2));
        assert_eq!(cart.total_price(), Money::from_major(25));
        assert_eq!(cart.total_item_count(), 3);
    }

    #[test]
    fn invalid_quantities_leave_the_cart_unchanged() {
        let mut cart = Cart::new();
        cart.add(&product(1, 10), 2).unwrap();
        let before = cart.clone();
        let err = cart.add(&product(1, 10), 0).unwrap_err();
        assert_eq!(err, CartError::InvalidQuantity { product_id: ProductId(1), quantity: 0 });
        assert!(cart.add(&product(3, 1), -4).is_err());
        assert_eq!(cart, before);
    }

    #[test]
    fn update_sets_or_removes() {
        let mut cart = Cart::new();
        cart.add(&product(1, 10), 2).unwrap();
        cart.add(&product(2, 3), 1).unwrap();
        assert!(cart.update(ProductId(1), 5).unwrap());
        assert_eq!(cart.quantity_of(ProductId(1)), Some(5));
        assert!(cart.update(ProductId(2), 0).unwrap());
        assert_eq!(cart.quantity_of(ProductId(2)), None);
        assert!(!cart.update(ProductId(9), 3).unwrap());
        assert_eq!(cart.lines().len(), 1);
        assert!(cart.remove(ProductId(1)).is_some());
        assert!(cart.is_empty());
    }

    #[test]
    fn quantities_that_overflow_the_totals_are_rejected() {
        let mut cart = Cart::new();
        let err = cart.add(&product(1, 10), i64::MAX / 2).unwrap_err();
        assert_eq!(err, CartError::InvalidQuantity { product_id: ProductId(1), quantity: i64::MAX / 2 });
        assert!(cart.is_empty());

        let free = Product { price: Money::default(), ..product(2, 0) };
        cart.add(&free, i64::MAX).unwrap();
        assert!(cart.add(&free, 1).is_err());
        assert!(cart.add(&product(3, 1), 1).is_err());
        assert_eq!(cart.total_item_count(), i64::MAX);
        assert_eq!(cart.total_price(), Money::default());

        let mut cart = Cart::new();
        cart.add(&product(4, 10), 3).unwrap();
        assert!(cart.update(ProductId(4), i64::MAX).is_err());
        assert_eq!(cart.quantity_of(ProductId(4)), Some(3));
        assert_eq!(cart.total_price(), Money::from_major(30));
    }

    #[test]
    fn snapshots_do_not_alias_the_cart() {
        let mut cart = Cart::new();
        cart.add(&product(2, 5), 1).unwrap();
        cart.add(&product(1, 10), 2).unwrap();
        let snapshot = cart.snapshot();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(snapshot.total_price(), Money::from_major(25));
        assert_eq!(snapshot.total_item_count(), 3);
        assert_eq!(snapshot.product_ids(), vec![ProductId(1), ProductId(2)]);
        let order = snapshot.to_new_order(CustomerDetails::new("Ivan", "ivan@example.com", "Moscow"), "RUB");
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[1].quantity, 2);
    }

    #[tokio::test]
    async fn carts_are_kept_per_session() {
        let carts = SessionCarts::new();
        let alice = SessionKey::from("alice");
        let bob = SessionKey::from("bob");
        carts.cart_for(&alice).await.lock().await.add(&product(1, 10), 1).unwrap();
        assert_eq!(carts.cart_for(&alice).await.lock().await.total_item_count(), 1);
        assert!(carts.cart_for(&bob).await.lock().await.is_empty());
        assert_eq!(carts.session_count().await, 2);
        assert!(carts.drop_session(&alice).await);
        assert!(!carts.drop_session(&alice).await);
        assert!(carts.cart_for(&alice).await.lock().await.is_empty());
    }
}
