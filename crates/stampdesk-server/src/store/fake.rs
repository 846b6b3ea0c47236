use super::{CatalogStore, StoreError};
use async_trait::async_trait;
use stampdesk_model::{Category, Layout, NewOrder, Order, OrderStatus, PriceOption, Product};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::Mutex;

/// In-memory catalog for tests. Mirrors the sqlite backend's ordering
/// contract; `fail_inserts` simulates a storage outage during submission.
pub struct FakeStore {
    pub categories: Mutex<Vec<Category>>,
    pub products: Mutex<Vec<Product>>,
    pub layouts: Mutex<Vec<Layout>>,
    pub price_options: Mutex<Vec<PriceOption>>,
    pub orders: Mutex<Vec<Order>>,
    pub next_order_id: AtomicI64,
    pub fail_inserts: AtomicBool,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self {
            categories: Mutex::new(Vec::new()),
            products: Mutex::new(Vec::new()),
            layouts: Mutex::new(Vec::new()),
            price_options: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
            next_order_id: AtomicI64::new(1),
            fail_inserts: AtomicBool::new(false),
        }
    }
}

fn unix_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

#[async_trait]
impl CatalogStore for FakeStore {
    async fn category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        Ok(self
            .categories
            .lock()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn categories_active(&self) -> Result<Vec<Category>, StoreError> {
        let mut out: Vec<Category> = self
            .categories
            .lock()
            .await
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        out.sort_by_key(|c| (c.sort_order, c.id));
        Ok(out)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        Ok(self
            .categories
            .lock()
            .await
            .iter()
            .find(|c| c.slug == slug && c.is_active)
            .cloned())
    }

    async fn product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self
            .products
            .lock()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn products_active(&self) -> Result<Vec<Product>, StoreError> {
        let mut out: Vec<Product> = self
            .products
            .lock()
            .await
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.sort_order, p.id));
        Ok(out)
    }

    async fn products_in_category(&self, category_id: i64) -> Result<Vec<Product>, StoreError> {
        let mut out: Vec<Product> = self
            .products
            .lock()
            .await
            .iter()
            .filter(|p| p.category_id == category_id && p.is_active)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.sort_order, p.id));
        Ok(out)
    }

    async fn layouts_for_product(&self, product_id: i64) -> Result<Vec<Layout>, StoreError> {
        let mut out: Vec<Layout> = self
            .layouts
            .lock()
            .await
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect();
        out.sort_by_key(|l| (l.sort_order, l.id));
        Ok(out)
    }

    async fn price_options_for_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<PriceOption>, StoreError> {
        let mut out: Vec<PriceOption> = self
            .price_options
            .lock()
            .await
            .iter()
            .filter(|p| p.product_id == product_id)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.sort_order, p.id));
        Ok(out)
    }

    async fn layout(&self, id: i64) -> Result<Option<Layout>, StoreError> {
        Ok(self
            .layouts
            .lock()
            .await
            .iter()
            .find(|l| l.id == id)
            .cloned())
    }

    async fn price_option(&self, id: i64) -> Result<Option<PriceOption>, StoreError> {
        Ok(self
            .price_options
            .lock()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<i64, StoreError> {
        if self.fail_inserts.load(Ordering::Relaxed) {
            return Err(StoreError("order storage unavailable".to_string()));
        }
        let id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
        self.orders.lock().await.push(Order {
            id,
            product_id: order.product_id,
            layout_id: order.layout_id,
            price_option_id: order.price_option_id,
            total_price: order.total_price,
            name: order.name,
            phone: order.phone,
            email: order.email,
            order_type: order.order_type,
            mount_type: order.mount_type,
            message: order.message,
            file_path: order.file_path,
            file_path_step3: order.file_path_step3,
            params_json: order.params_json,
            status: OrderStatus::New,
            created_at: unix_seconds(),
            needs_delivery: order.needs_delivery,
            delivery_datetime: order.delivery_datetime,
            delivery_address: order.delivery_address,
        });
        Ok(id)
    }

    async fn order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.lock().await.iter().find(|o| o.id == id).cloned())
    }

    async fn orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let mut out: Vec<Order> = self
            .orders
            .lock()
            .await
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        out.sort_by_key(|o| (std::cmp::Reverse(o.created_at), std::cmp::Reverse(o.id)));
        Ok(out)
    }

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<bool, StoreError> {
        let mut orders = self.orders.lock().await;
        match orders.iter_mut().find(|o| o.id == id) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
