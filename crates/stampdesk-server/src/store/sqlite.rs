use super::{CatalogStore, StoreError};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use stampdesk_model::{Category, Layout, NewOrder, Order, OrderStatus, PriceOption, Product};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    icon TEXT NOT NULL DEFAULT '',
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    category_id INTEGER NOT NULL REFERENCES categories(id),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS layouts (
    id INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL REFERENCES products(id),
    name TEXT NOT NULL,
    price INTEGER NOT NULL DEFAULT 750,
    sort_order INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS price_options (
    id INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL REFERENCES products(id),
    mount_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    price_normal INTEGER NOT NULL DEFAULT 0,
    sort_order INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY,
    product_id INTEGER,
    layout_id INTEGER,
    price_option_id INTEGER,
    total_price INTEGER,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    email TEXT NOT NULL DEFAULT '',
    order_type TEXT NOT NULL DEFAULT '',
    mount_type TEXT NOT NULL DEFAULT '',
    message TEXT NOT NULL DEFAULT '',
    file_path TEXT NOT NULL DEFAULT '',
    file_path_step3 TEXT NOT NULL DEFAULT '',
    params_json TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'new',
    created_at INTEGER NOT NULL,
    needs_delivery INTEGER NOT NULL DEFAULT 0,
    delivery_datetime TEXT NOT NULL DEFAULT '',
    delivery_address TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
";

fn unix_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        description: row.get("description")?,
        icon: row.get("icon")?,
        sort_order: row.get("sort_order")?,
        is_active: row.get("is_active")?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get("id")?,
        category_id: row.get("category_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        sort_order: row.get("sort_order")?,
        is_active: row.get("is_active")?,
    })
}

fn layout_from_row(row: &Row<'_>) -> rusqlite::Result<Layout> {
    Ok(Layout {
        id: row.get("id")?,
        product_id: row.get("product_id")?,
        name: row.get("name")?,
        price: row.get("price")?,
        sort_order: row.get("sort_order")?,
    })
}

fn price_option_from_row(row: &Row<'_>) -> rusqlite::Result<PriceOption> {
    Ok(PriceOption {
        id: row.get("id")?,
        product_id: row.get("product_id")?,
        mount_type: row.get("mount_type")?,
        description: row.get("description")?,
        price_normal: row.get("price_normal")?,
        sort_order: row.get("sort_order")?,
    })
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let status_raw: String = row.get("status")?;
    let status = OrderStatus::parse(&status_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Order {
        id: row.get("id")?,
        product_id: row.get("product_id")?,
        layout_id: row.get("layout_id")?,
        price_option_id: row.get("price_option_id")?,
        total_price: row.get("total_price")?,
        name: row.get("name")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        order_type: row.get("order_type")?,
        mount_type: row.get("mount_type")?,
        message: row.get("message")?,
        file_path: row.get("file_path")?,
        file_path_step3: row.get("file_path_step3")?,
        params_json: row.get("params_json")?,
        status,
        created_at: row.get("created_at")?,
        needs_delivery: row.get("needs_delivery")?,
        delivery_datetime: row.get("delivery_datetime")?,
        delivery_address: row.get("delivery_address")?,
    })
}

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| StoreError(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            let guard = conn
                .lock()
                .map_err(|_| StoreError("connection mutex poisoned".to_string()))?;
            f(&guard).map_err(|e| StoreError(e.to_string()))
        })
        .await
        .map_err(|e| StoreError(e.to_string()))?
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM categories WHERE id = ?1",
                params![id],
                category_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
    }

    async fn categories_active(&self) -> Result<Vec<Category>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM categories WHERE is_active = 1 ORDER BY sort_order, id",
            )?;
            let rows = stmt.query_map([], category_from_row)?;
            rows.collect()
        })
        .await
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM categories WHERE slug = ?1 AND is_active = 1",
                params![slug],
                category_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
    }

    async fn product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM products WHERE id = ?1",
                params![id],
                product_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
    }

    async fn products_active(&self) -> Result<Vec<Product>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM products WHERE is_active = 1 ORDER BY sort_order, id")?;
            let rows = stmt.query_map([], product_from_row)?;
            rows.collect()
        })
        .await
    }

    async fn products_in_category(&self, category_id: i64) -> Result<Vec<Product>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM products WHERE category_id = ?1 AND is_active = 1
                 ORDER BY sort_order, id",
            )?;
            let rows = stmt.query_map(params![category_id], product_from_row)?;
            rows.collect()
        })
        .await
    }

    async fn layouts_for_product(&self, product_id: i64) -> Result<Vec<Layout>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM layouts WHERE product_id = ?1 ORDER BY sort_order, id",
            )?;
            let rows = stmt.query_map(params![product_id], layout_from_row)?;
            rows.collect()
        })
        .await
    }

    async fn price_options_for_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<PriceOption>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM price_options WHERE product_id = ?1 ORDER BY sort_order, id",
            )?;
            let rows = stmt.query_map(params![product_id], price_option_from_row)?;
            rows.collect()
        })
        .await
    }

    async fn layout(&self, id: i64) -> Result<Option<Layout>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM layouts WHERE id = ?1",
                params![id],
                layout_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
    }

    async fn price_option(&self, id: i64) -> Result<Option<PriceOption>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM price_options WHERE id = ?1",
                params![id],
                price_option_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<i64, StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO orders (
                    product_id, layout_id, price_option_id, total_price,
                    name, phone, email, order_type, mount_type, message,
                    file_path, file_path_step3, params_json, status, created_at,
                    needs_delivery, delivery_datetime, delivery_address
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,'new',?14,?15,?16,?17)",
                params![
                    order.product_id,
                    order.layout_id,
                    order.price_option_id,
                    order.total_price,
                    order.name,
                    order.phone,
                    order.email,
                    order.order_type,
                    order.mount_type,
                    order.message,
                    order.file_path,
                    order.file_path_step3,
                    order.params_json,
                    unix_seconds(),
                    order.needs_delivery,
                    order.delivery_datetime,
                    order.delivery_address,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM orders WHERE id = ?1",
                params![id],
                order_from_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
        .await
    }

    async fn orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        self.with_conn(move |conn| match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM orders WHERE status = ?1 ORDER BY created_at DESC, id DESC",
                )?;
                let rows = stmt.query_map(params![status.as_str()], order_from_row)?;
                rows.collect()
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT * FROM orders ORDER BY created_at DESC, id DESC")?;
                let rows = stmt.query_map([], order_from_row)?;
                rows.collect()
            }
        })
        .await
    }

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE orders SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &SqliteStore) {
        store
            .conn
            .lock()
            .expect("lock")
            .execute_batch(
                "INSERT INTO categories (id, name, slug) VALUES (1, 'Stamps', 'stamps');
                 INSERT INTO products (id, category_id, name) VALUES (10, 1, 'Round stamp');
                 INSERT INTO layouts (id, product_id, name, price, sort_order)
                     VALUES (2, 10, 'B', 900, 1), (1, 10, 'A', 750, 0);
                 INSERT INTO price_options (id, product_id, mount_type, price_normal, sort_order)
                     VALUES (5, 10, 'automatic', 800, 0);",
            )
            .expect("seed");
    }

    #[tokio::test]
    async fn layouts_come_back_in_sort_order() {
        let store = SqliteStore::open_in_memory().expect("open");
        seed(&store);
        let layouts = store.layouts_for_product(10).await.expect("layouts");
        assert_eq!(
            layouts.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn insert_order_forces_new_status_and_returns_id() {
        let store = SqliteStore::open_in_memory().expect("open");
        seed(&store);
        let id = store
            .insert_order(NewOrder {
                product_id: Some(10),
                layout_id: Some(1),
                total_price: Some(750),
                name: "Ivan".to_string(),
                phone: "12345".to_string(),
                ..NewOrder::default()
            })
            .await
            .expect("insert");
        let order = store.order(id).await.expect("fetch").expect("present");
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.total_price, Some(750));
        assert!(order.created_at > 0);
    }

    #[tokio::test]
    async fn status_update_reports_missing_rows() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert!(!store
            .update_order_status(42, OrderStatus::Done)
            .await
            .expect("update"));
    }

    #[tokio::test]
    async fn orders_filter_by_status() {
        let store = SqliteStore::open_in_memory().expect("open");
        seed(&store);
        let first = store
            .insert_order(NewOrder {
                name: "A".to_string(),
                phone: "1".to_string(),
                ..NewOrder::default()
            })
            .await
            .expect("insert");
        store
            .insert_order(NewOrder {
                name: "B".to_string(),
                phone: "2".to_string(),
                ..NewOrder::default()
            })
            .await
            .expect("insert");
        store
            .update_order_status(first, OrderStatus::Done)
            .await
            .expect("update");
        let done = store.orders(Some(OrderStatus::Done)).await.expect("list");
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, first);
        assert_eq!(store.orders(None).await.expect("list").len(), 2);
    }
}
