use async_trait::async_trait;
use stampdesk_model::{Category, Layout, NewOrder, Order, OrderStatus, PriceOption, Product};

pub mod fake;
pub mod sqlite;

#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for StoreError {}

/// Read access to the catalog plus the single order-insertion operation the
/// wizard depends on. Layouts and price options come back ordered by
/// `(sort_order, id)`.
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    async fn category(&self, id: i64) -> Result<Option<Category>, StoreError>;
    async fn categories_active(&self) -> Result<Vec<Category>, StoreError>;
    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError>;

    async fn product(&self, id: i64) -> Result<Option<Product>, StoreError>;
    async fn products_active(&self) -> Result<Vec<Product>, StoreError>;
    async fn products_in_category(&self, category_id: i64) -> Result<Vec<Product>, StoreError>;

    async fn layouts_for_product(&self, product_id: i64) -> Result<Vec<Layout>, StoreError>;
    async fn price_options_for_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<PriceOption>, StoreError>;
    async fn layout(&self, id: i64) -> Result<Option<Layout>, StoreError>;
    async fn price_option(&self, id: i64) -> Result<Option<PriceOption>, StoreError>;

    /// Atomic single-row insert. Status is forced to `new`; returns the
    /// generated order id.
    async fn insert_order(&self, order: NewOrder) -> Result<i64, StoreError>;

    async fn order(&self, id: i64) -> Result<Option<Order>, StoreError>;
    async fn orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError>;

    /// Returns false when no order with that id exists; the row is only ever
    /// written with a value from the status enumeration.
    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<bool, StoreError>;
}
