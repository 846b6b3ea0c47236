#![forbid(unsafe_code)]
//! Stampdesk domain model SSOT.
//!
//! Catalog records (categories, products, layouts, price options) and the
//! order record produced by the order wizard. Ownership of a layout or price
//! option by a product is enforced at submission time, not by the schema.

mod catalog;
mod order;

pub use catalog::{
    is_simplified_slug, Category, HasId, Layout, PriceOption, Product, DEFAULT_LAYOUT_PRICE,
    DELIVERY_FEE, SIMPLIFIED_CATEGORY_SLUGS,
};
pub use order::{NewOrder, Order, OrderStatus, ValidationError};

pub const CRATE_NAME: &str = "stampdesk-model";
