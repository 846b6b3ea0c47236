//! Best-effort order notifications.
//!
//! Senders run synchronously after the order row commits. Each failure is
//! caught and logged with the order id; no failure reaches the submitter.

use async_trait::async_trait;
use stampdesk_model::Order;
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod email;
pub mod telegram;

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for NotifyError {}

/// A persisted order plus the resolved display names its references point
/// at. Name lookups are best-effort; a missing record renders as absent.
#[derive(Debug, Clone)]
pub struct OrderNotification {
    pub order: Order,
    pub product_name: Option<String>,
    pub layout_name: Option<String>,
    pub mount_type: Option<String>,
}

impl OrderNotification {
    pub(crate) fn stored_files(&self) -> Vec<&str> {
        [&self.order.file_path, &self.order.file_path_step3]
            .into_iter()
            .filter(|f| !f.is_empty())
            .map(String::as_str)
            .collect()
    }

    pub(crate) fn params(&self) -> Vec<(String, String)> {
        let Ok(map) =
            serde_json::from_str::<std::collections::BTreeMap<String, String>>(
                &self.order.params_json,
            )
        else {
            return Vec::new();
        };
        map.into_iter().filter(|(_, v)| !v.is_empty()).collect()
    }
}

#[async_trait]
pub trait OrderSender: Send + Sync + 'static {
    fn channel(&self) -> &'static str;
    async fn send(&self, notification: &OrderNotification) -> Result<(), NotifyError>;
}

/// Loads a freshly persisted order, resolves the display names it
/// references and runs every configured sender. A lookup failure here only
/// degrades the notification, never the order.
pub(crate) async fn dispatch_for_order(state: &crate::AppState, order_id: i64) {
    let order = match state.store.order(order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(order_id, "order vanished before notification");
            return;
        }
        Err(e) => {
            warn!(order_id, "order lookup for notification failed: {e}");
            return;
        }
    };
    let product_name = match order.product_id {
        Some(id) => state.store.product(id).await.ok().flatten().map(|p| p.name),
        None => None,
    };
    let layout_name = match order.layout_id {
        Some(id) => state.store.layout(id).await.ok().flatten().map(|l| l.name),
        None => None,
    };
    let mount_type = match order.price_option_id {
        Some(id) => state
            .store
            .price_option(id)
            .await
            .ok()
            .flatten()
            .map(|p| p.mount_type),
        None => None,
    };
    let notification = OrderNotification {
        order,
        product_name,
        layout_name,
        mount_type,
    };
    dispatch(&state.senders, &notification).await;
}

pub async fn dispatch(senders: &[Arc<dyn OrderSender>], notification: &OrderNotification) {
    for sender in senders {
        match sender.send(notification).await {
            Ok(()) => {
                info!(
                    channel = sender.channel(),
                    order_id = notification.order.id,
                    "order notification sent"
                );
            }
            Err(e) => {
                error!(
                    channel = sender.channel(),
                    order_id = notification.order.id,
                    "order notification failed: {e}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampdesk_model::OrderStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn notification(params_json: &str) -> OrderNotification {
        OrderNotification {
            order: Order {
                id: 1,
                product_id: None,
                layout_id: None,
                price_option_id: None,
                total_price: None,
                name: "Ivan".to_string(),
                phone: "12345".to_string(),
                email: String::new(),
                order_type: String::new(),
                mount_type: String::new(),
                message: String::new(),
                file_path: String::new(),
                file_path_step3: String::new(),
                params_json: params_json.to_string(),
                status: OrderStatus::New,
                created_at: 0,
                needs_delivery: false,
                delivery_datetime: String::new(),
                delivery_address: String::new(),
            },
            product_name: None,
            layout_name: None,
            mount_type: None,
        }
    }

    struct FailingSender;
    struct CountingSender(AtomicU32);

    #[async_trait]
    impl OrderSender for FailingSender {
        fn channel(&self) -> &'static str {
            "failing"
        }
        async fn send(&self, _n: &OrderNotification) -> Result<(), NotifyError> {
            Err(NotifyError("unreachable".to_string()))
        }
    }

    #[async_trait]
    impl OrderSender for CountingSender {
        fn channel(&self) -> &'static str {
            "counting"
        }
        async fn send(&self, _n: &OrderNotification) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_failing_sender_does_not_stop_the_next() {
        let counting = Arc::new(CountingSender(AtomicU32::new(0)));
        let senders: Vec<Arc<dyn OrderSender>> =
            vec![Arc::new(FailingSender), Arc::clone(&counting) as Arc<dyn OrderSender>];
        dispatch(&senders, &notification("")).await;
        assert_eq!(counting.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn params_decode_is_lenient() {
        assert!(notification("not json").params().is_empty());
        assert!(notification("").params().is_empty());
        let n = notification(r#"{"city":"Tyumen","empty":""}"#);
        assert_eq!(n.params(), vec![("city".to_string(), "Tyumen".to_string())]);
    }
}
