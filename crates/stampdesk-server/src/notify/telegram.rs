use super::{NotifyError, OrderNotification, OrderSender};
use crate::config::TelegramConfig;
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use tracing::warn;

const MARKDOWN_V2_SPECIALS: &str = r"\_*[]()~`>#+-=|{}.!";

fn esc(value: &str) -> String {
    if value.is_empty() {
        return "—".to_string();
    }
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if MARKDOWN_V2_SPECIALS.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn order_text(notification: &OrderNotification) -> String {
    let order = &notification.order;
    let product = notification
        .product_name
        .clone()
        .unwrap_or_else(|| order.order_type.clone());
    let mount = notification
        .mount_type
        .clone()
        .unwrap_or_else(|| order.mount_type.clone());
    let total = order
        .total_price
        .map(|t| format!("{t} rub."))
        .unwrap_or_default();

    let mut lines = vec![
        format!("*New order \\#{}*", order.id),
        String::new(),
        format!("*Name:* {}", esc(&order.name)),
        format!("*Phone:* {}", esc(&order.phone)),
    ];
    if !order.email.is_empty() {
        lines.push(format!("*Email:* {}", esc(&order.email)));
    }
    lines.push(format!("*Product:* {}", esc(&product)));
    lines.push(format!(
        "*Layout:* {}",
        esc(notification.layout_name.as_deref().unwrap_or_default())
    ));
    lines.push(format!("*Mounting:* {}", esc(&mount)));
    lines.push(format!("*Total:* {}", esc(&total)));
    if !order.message.is_empty() {
        lines.push(format!("*Message:* {}", esc(&order.message)));
    }
    if order.needs_delivery {
        lines.push("*Delivery:* yes \\(\\+500 rub\\.\\)".to_string());
        if !order.delivery_datetime.is_empty() {
            lines.push(format!("*Delivery date:* {}", esc(&order.delivery_datetime)));
        }
        if !order.delivery_address.is_empty() {
            lines.push(format!("*Address:* {}", esc(&order.delivery_address)));
        }
    }
    let params = notification.params();
    if !params.is_empty() {
        lines.push("*Parameters:*".to_string());
        for (key, value) in params {
            lines.push(format!("    {}: {}", esc(&key), esc(&value)));
        }
    }
    lines.join("\n")
}

pub struct TelegramSender {
    config: TelegramConfig,
    upload_root: PathBuf,
    client: reqwest::Client,
}

impl TelegramSender {
    pub fn new(config: TelegramConfig, upload_root: PathBuf) -> Self {
        Self {
            config,
            upload_root,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base, self.config.bot_token
        )
    }

    async fn send_documents(&self, notification: &OrderNotification) {
        let order_id = notification.order.id;
        for stored in notification.stored_files() {
            let path = self.upload_root.join(stored);
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(order_id, file = stored, "telegram attachment unreadable: {e}");
                    continue;
                }
            };
            let form = reqwest::multipart::Form::new()
                .text("chat_id", self.config.chat_id.clone())
                .text("caption", format!("File for order #{order_id}"))
                .part(
                    "document",
                    reqwest::multipart::Part::bytes(bytes).file_name(stored.to_string()),
                );
            let result = self
                .client
                .post(self.api_url("sendDocument"))
                .multipart(form)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    warn!(
                        order_id,
                        file = stored,
                        status = resp.status().as_u16(),
                        "telegram document send rejected"
                    );
                }
                Err(e) => {
                    warn!(order_id, file = stored, "telegram document send failed: {e}");
                }
            }
        }
    }
}

#[async_trait]
impl OrderSender for TelegramSender {
    fn channel(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, notification: &OrderNotification) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&json!({
                "chat_id": self.config.chat_id,
                "text": order_text(notification),
                "parse_mode": "MarkdownV2",
            }))
            .send()
            .await
            .map_err(|e| NotifyError(format!("telegram api unreachable: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError(format!(
                "telegram api error: {status} {body}"
            )));
        }
        self.send_documents(notification).await;
        Ok(())
    }
}
