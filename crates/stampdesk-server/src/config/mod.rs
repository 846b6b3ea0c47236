use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Hard caps applied to free-text fields before persistence. Values over a
/// cap are silently clamped, never rejected.
#[derive(Debug, Clone)]
pub struct FieldLimits {
    pub name: usize,
    pub phone: usize,
    pub email: usize,
    pub message: usize,
    pub address: usize,
    pub delivery_datetime: usize,
    pub param_value: usize,
    pub step1_message: usize,
    pub params_json: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            name: 200,
            phone: 50,
            email: 200,
            message: 5000,
            address: 1000,
            delivery_datetime: 200,
            param_value: 500,
            step1_message: 2000,
            params_json: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub allowed_extensions: HashSet<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "pdf"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Fixed-window request budgets per client address. The window covers the
/// public intake routes only; the admin surface is not limited.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_order: u32,
    pub max_order_product: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_order: 10,
            max_order_product: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub use_ssl: bool,
    pub username: String,
    pub password: String,
    pub recipient: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://api.telegram.org";
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub max_body_bytes: usize,
    pub limits: FieldLimits,
    pub upload: UploadConfig,
    pub rate_limit: RateLimitConfig,
    pub session_idle_ttl: Duration,
    pub mail: Option<MailConfig>,
    pub telegram: Option<TelegramConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 5 * 1024 * 1024,
            limits: FieldLimits::default(),
            upload: UploadConfig::default(),
            rate_limit: RateLimitConfig::default(),
            session_idle_ttl: Duration::from_secs(3600),
            mail: None,
            telegram: None,
        }
    }
}

pub fn validate_startup_config(config: &AppConfig) -> Result<(), String> {
    if config.max_body_bytes == 0 {
        return Err("max_body_bytes must be > 0".to_string());
    }
    let limits = &config.limits;
    if limits.name == 0 || limits.phone == 0 || limits.message == 0 || limits.param_value == 0 {
        return Err("field limits must be > 0".to_string());
    }
    if limits.params_json == 0 {
        return Err("params_json limit must be > 0".to_string());
    }
    if config.upload.allowed_extensions.is_empty() {
        return Err("upload allow-list must not be empty".to_string());
    }
    if config
        .upload
        .allowed_extensions
        .iter()
        .any(|e| e.is_empty() || e.chars().any(|c| c.is_ascii_uppercase() || c == '.'))
    {
        return Err("upload extensions must be lowercase and dot-free".to_string());
    }
    if config.rate_limit.window.is_zero() {
        return Err("rate limit window must be > 0".to_string());
    }
    if config.rate_limit.max_order == 0 || config.rate_limit.max_order_product == 0 {
        return Err("rate limit budgets must be > 0".to_string());
    }
    if config.session_idle_ttl.is_zero() {
        return Err("session idle ttl must be > 0".to_string());
    }
    if let Some(mail) = &config.mail {
        if mail.server.is_empty() || mail.username.is_empty() || mail.recipient.is_empty() {
            return Err("mail config requires server, username and recipient".to_string());
        }
    }
    if let Some(telegram) = &config.telegram {
        if telegram.bot_token.is_empty() || telegram.chat_id.is_empty() {
            return Err("telegram config requires bot_token and chat_id".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_startup_validation() {
        validate_startup_config(&AppConfig::default()).expect("default config valid");
    }

    #[test]
    fn startup_validation_rejects_empty_upload_allow_list() {
        let mut config = AppConfig::default();
        config.upload.allowed_extensions.clear();
        let err = validate_startup_config(&config).expect_err("empty allow-list");
        assert!(err.contains("allow-list"));
    }

    #[test]
    fn startup_validation_rejects_uppercase_extensions() {
        let mut config = AppConfig::default();
        config.upload.allowed_extensions.insert("PDF".to_string());
        let err = validate_startup_config(&config).expect_err("uppercase extension");
        assert!(err.contains("lowercase"));
    }

    #[test]
    fn startup_validation_requires_mail_recipient() {
        let config = AppConfig {
            mail: Some(MailConfig {
                server: "smtp.example.com".to_string(),
                port: 465,
                use_ssl: true,
                username: "orders@example.com".to_string(),
                password: "secret".to_string(),
                recipient: String::new(),
            }),
            ..AppConfig::default()
        };
        let err = validate_startup_config(&config).expect_err("missing recipient");
        assert!(err.contains("recipient"));
    }
}
