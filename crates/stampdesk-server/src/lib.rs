//! Order-intake and catalog service for a custom stamps and seals shop.
//!
//! The public surface is a catalog browse API, a per-product three-step
//! order wizard, a one-shot order form and a small admin order surface.
//! Catalog and order data sit behind [`CatalogStore`]; uploads behind
//! [`UploadStore`]; notification channels behind `OrderSender`.

#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub mod config;
mod http;
mod middleware;
pub mod notify;
mod rate_limiter;
mod sanitize;
pub mod session;
pub mod store;
pub mod uploads;
mod wizard;

pub use config::{validate_startup_config, AppConfig, MailConfig, TelegramConfig};
pub use store::{fake::FakeStore, sqlite::SqliteStore, CatalogStore, StoreError};
pub use uploads::{LocalFsUploads, UploadStore};

use http::handlers;
use notify::{email::EmailSender, telegram::TelegramSender, OrderSender};
use rate_limiter::RateLimiter;
use session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<dyn CatalogStore>,
    pub(crate) uploads: Arc<dyn UploadStore>,
    pub(crate) config: Arc<AppConfig>,
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) senders: Arc<Vec<Arc<dyn OrderSender>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self::with_config(store, AppConfig::default())
    }

    /// Notification senders are derived from the config: a channel with no
    /// credentials configured simply does not exist.
    pub fn with_config(store: Arc<dyn CatalogStore>, config: AppConfig) -> Self {
        let uploads = Arc::new(LocalFsUploads::new(config.upload.clone()));
        let mut senders: Vec<Arc<dyn OrderSender>> = Vec::new();
        if let Some(mail) = config.mail.clone() {
            senders.push(Arc::new(EmailSender::new(mail, config.upload.dir.clone())));
        }
        if let Some(telegram) = config.telegram.clone() {
            senders.push(Arc::new(TelegramSender::new(
                telegram,
                config.upload.dir.clone(),
            )));
        }
        let sessions = Arc::new(SessionStore::new(config.session_idle_ttl));
        Self {
            store,
            uploads,
            config: Arc::new(config),
            sessions,
            limiter: Arc::new(RateLimiter::default()),
            senders: Arc::new(senders),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.max_body_bytes;
    Router::new()
        .route("/healthz", get(handlers::healthz_handler))
        .route("/catalog", get(handlers::catalog_handler))
        .route("/catalog/:slug", get(handlers::catalog_category_handler))
        .route("/order", post(handlers::order_submit))
        .route("/order/success", get(handlers::order_success_handler))
        .route(
            "/order/product/:product_id",
            get(handlers::wizard_view).post(handlers::wizard_submit),
        )
        .route("/admin/orders", get(handlers::admin_orders_handler))
        .route("/admin/orders/:id", get(handlers::admin_order_detail))
        .route(
            "/admin/orders/:id/status",
            post(handlers::admin_order_status),
        )
        .layer(axum::middleware::from_fn(
            middleware::security_headers::apply,
        ))
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}
