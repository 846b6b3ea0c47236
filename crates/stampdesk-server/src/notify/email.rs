use super::{NotifyError, OrderNotification, OrderSender};
use crate::config::MailConfig;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::PathBuf;
use tracing::warn;

fn esc(value: &str) -> String {
    if value.is_empty() {
        return "&mdash;".to_string();
    }
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_row(label: &str, value: &str) -> String {
    format!(
        "<tr><td style=\"padding:8px;font-weight:bold;border-bottom:1px solid #e5e7eb;\">{label}</td>\
         <td style=\"padding:8px;border-bottom:1px solid #e5e7eb;\">{value}</td></tr>"
    )
}

fn order_html(notification: &OrderNotification) -> String {
    let order = &notification.order;
    let mut rows = String::new();
    rows.push_str(&html_row("Name", &esc(&order.name)));
    rows.push_str(&html_row("Phone", &esc(&order.phone)));
    rows.push_str(&html_row("Email", &esc(&order.email)));
    let product = notification
        .product_name
        .clone()
        .unwrap_or_else(|| order.order_type.clone());
    rows.push_str(&html_row("Product", &esc(&product)));
    rows.push_str(&html_row(
        "Layout",
        &esc(notification.layout_name.as_deref().unwrap_or_default()),
    ));
    let mount = notification
        .mount_type
        .clone()
        .unwrap_or_else(|| order.mount_type.clone());
    rows.push_str(&html_row("Mounting", &esc(&mount)));
    let total = order
        .total_price
        .map(|t| format!("{t} rub."))
        .unwrap_or_default();
    rows.push_str(&html_row("Total", &esc(&total)));
    rows.push_str(&html_row("Message", &esc(&order.message)));
    if order.needs_delivery {
        rows.push_str(&html_row("Delivery", "Yes (+500 rub.)"));
        rows.push_str(&html_row(
            "Delivery date",
            &esc(&order.delivery_datetime),
        ));
        rows.push_str(&html_row("Delivery address", &esc(&order.delivery_address)));
    }
    let params = notification.params();
    if !params.is_empty() {
        let joined = params
            .iter()
            .map(|(k, v)| format!("{}: {}", esc(k), esc(v)))
            .collect::<Vec<_>>()
            .join(", ");
        rows.push_str(&html_row("Parameters", &joined));
    }
    format!(
        "<html><body style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto;\">\
         <div style=\"background:#2563EB;color:white;padding:20px;text-align:center;\">\
         <h1 style=\"margin:0;\">New order #{}</h1></div>\
         <div style=\"padding:20px;background:#f9fafb;\">\
         <table style=\"width:100%;border-collapse:collapse;\">{rows}</table></div>\
         </body></html>",
        order.id
    )
}

pub struct EmailSender {
    config: MailConfig,
    upload_root: PathBuf,
}

impl EmailSender {
    pub fn new(config: MailConfig, upload_root: PathBuf) -> Self {
        Self {
            config,
            upload_root,
        }
    }
}

#[async_trait]
impl OrderSender for EmailSender {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn send(&self, notification: &OrderNotification) -> Result<(), NotifyError> {
        if self.config.password.is_empty() {
            return Err(NotifyError("mail password is not configured".to_string()));
        }
        let order = &notification.order;
        let from = self
            .config
            .username
            .parse()
            .map_err(|e| NotifyError(format!("invalid sender address: {e}")))?;
        let to = self
            .config
            .recipient
            .parse()
            .map_err(|e| NotifyError(format!("invalid recipient address: {e}")))?;

        let html = order_html(notification);
        let plain = format!(
            "New order #{}\nName: {}\nPhone: {}\nTotal: {}",
            order.id,
            order.name,
            order.phone,
            order
                .total_price
                .map(|t| t.to_string())
                .unwrap_or_default()
        );
        let mut body = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(plain, html));

        let octet_stream = ContentType::parse("application/octet-stream")
            .map_err(|e| NotifyError(format!("attachment content type: {e}")))?;
        for stored in notification.stored_files() {
            let path = self.upload_root.join(stored);
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    body = body.singlepart(
                        Attachment::new(stored.to_string()).body(bytes, octet_stream.clone()),
                    );
                }
                Err(e) => {
                    warn!(order_id = order.id, file = stored, "could not attach file: {e}");
                }
            }
        }

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(format!("New order #{}", order.id))
            .multipart(body)
            .map_err(|e| NotifyError(format!("could not build message: {e}")))?;

        let builder = if self.config.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
        }
        .map_err(|e| NotifyError(format!("smtp transport: {e}")))?;
        let transport = builder
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError(format!("smtp send: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampdesk_model::{Order, OrderStatus};

    fn notification() -> OrderNotification {
        OrderNotification {
            order: Order {
                id: 7,
                product_id: Some(10),
                layout_id: Some(1),
                price_option_id: Some(5),
                total_price: Some(2050),
                name: "Ivan <script>".to_string(),
                phone: "12345".to_string(),
                email: String::new(),
                order_type: String::new(),
                mount_type: String::new(),
                message: "test".to_string(),
                file_path: String::new(),
                file_path_step3: String::new(),
                params_json: r#"{"city":"Tyumen"}"#.to_string(),
                status: OrderStatus::New,
                created_at: 0,
                needs_delivery: true,
                delivery_datetime: "tomorrow".to_string(),
                delivery_address: "Lenina 1".to_string(),
            },
            product_name: Some("Round stamp".to_string()),
            layout_name: Some("Classic".to_string()),
            mount_type: Some("automatic".to_string()),
        }
    }

    #[test]
    fn html_escapes_user_input_and_includes_totals() {
        let html = order_html(&notification());
        assert!(html.contains("New order #7"));
        assert!(html.contains("Ivan &lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("2050 rub."));
        assert!(html.contains("Yes (+500 rub.)"));
        assert!(html.contains("city: Tyumen"));
    }

    #[test]
    fn empty_fields_render_as_dash() {
        let mut n = notification();
        n.order.email = String::new();
        let html = order_html(&n);
        assert!(html.contains("&mdash;"));
    }
}
