//! Types shared by the storefront crates: fixed-point money, secret wrappers and small parsing helpers.
pub mod helpers;
mod money;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, DEFAULT_CURRENCY_CODE, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
