use serde::{Deserialize, Serialize};

/// Price charged for a layout when the chosen layout row cannot be resolved.
pub const DEFAULT_LAYOUT_PRICE: i64 = 750;

/// Flat courier fee added when the customer requests delivery.
pub const DELIVERY_FEE: i64 = 500;

/// Category slugs whose products skip the layout and hardware steps of the
/// wizard. The slug is a business-rule discriminant, not just a grouping.
pub const SIMPLIFIED_CATEGORY_SLUGS: [&str; 2] = ["faksimile", "ottisk"];

#[must_use]
pub fn is_simplified_slug(slug: &str) -> bool {
    SIMPLIFIED_CATEGORY_SLUGS.contains(&slug)
}

/// Records that are owned by a product and selectable by id in the wizard.
pub trait HasId {
    fn id(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub sort_order: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sort_order: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub sort_order: i64,
}

impl HasId for Layout {
    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOption {
    pub id: i64,
    pub product_id: i64,
    pub mount_type: String,
    #[serde(default)]
    pub description: String,
    pub price_normal: i64,
    #[serde(default)]
    pub sort_order: i64,
}

impl HasId for PriceOption {
    fn id(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplified_slug_membership_is_exact() {
        assert!(is_simplified_slug("faksimile"));
        assert!(is_simplified_slug("ottisk"));
        assert!(!is_simplified_slug("stamps"));
        assert!(!is_simplified_slug("Faksimile"));
        assert!(!is_simplified_slug(""));
    }
}
