#![forbid(unsafe_code)]

use stampdesk_server::config::{RateLimitConfig, UploadConfig};
use stampdesk_server::{
    build_router, validate_startup_config, AppConfig, AppState, MailConfig, SqliteStore,
    TelegramConfig,
};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("STAMPDESK_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn mail_config_from_env() -> Option<MailConfig> {
    let username = env::var("MAIL_USERNAME").ok()?;
    Some(MailConfig {
        server: env::var("MAIL_SERVER").unwrap_or_else(|_| "smtp.yandex.ru".to_string()),
        port: env_u16("MAIL_PORT", 465),
        use_ssl: env_bool("MAIL_USE_SSL", true),
        recipient: env::var("MAIL_RECIPIENT").unwrap_or_else(|_| username.clone()),
        password: env::var("MAIL_PASSWORD").unwrap_or_default(),
        username,
    })
}

fn telegram_config_from_env() -> Option<TelegramConfig> {
    let bot_token = env::var("TELEGRAM_BOT_TOKEN").ok()?;
    let chat_id = env::var("TELEGRAM_CHAT_ID").ok()?;
    Some(TelegramConfig {
        bot_token,
        chat_id,
        api_base: env::var("TELEGRAM_API_BASE")
            .unwrap_or_else(|_| TelegramConfig::DEFAULT_API_BASE.to_string()),
    })
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env::var("STAMPDESK_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let db_path =
        PathBuf::from(env::var("STAMPDESK_DB").unwrap_or_else(|_| "stampdesk.db".to_string()));

    let defaults = AppConfig::default();
    let config = AppConfig {
        max_body_bytes: env_usize("STAMPDESK_MAX_BODY_BYTES", defaults.max_body_bytes),
        upload: UploadConfig {
            dir: PathBuf::from(
                env::var("STAMPDESK_UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            ..defaults.upload.clone()
        },
        rate_limit: RateLimitConfig {
            window: Duration::from_secs(env_u64("STAMPDESK_RATE_LIMIT_WINDOW_SECS", 60)),
            max_order: env_u32("STAMPDESK_RATE_LIMIT_ORDER", defaults.rate_limit.max_order),
            max_order_product: env_u32(
                "STAMPDESK_RATE_LIMIT_ORDER_PRODUCT",
                defaults.rate_limit.max_order_product,
            ),
        },
        session_idle_ttl: Duration::from_secs(env_u64("STAMPDESK_SESSION_IDLE_TTL_SECS", 3600)),
        mail: mail_config_from_env(),
        telegram: telegram_config_from_env(),
        ..defaults
    };
    validate_startup_config(&config)?;

    if let Err(e) = tokio::fs::create_dir_all(&config.upload.dir).await {
        return Err(format!(
            "upload dir {} unavailable: {e}",
            config.upload.dir.display()
        ));
    }

    let store = SqliteStore::open(&db_path).map_err(|e| format!("open database: {e}"))?;
    let state = AppState::with_config(Arc::new(store), config);
    let app = build_router(state);

    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind failed: {e}"))?;
    info!("stampdesk-server listening on {bind_addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        wait_for_shutdown_signal().await;
    })
    .await
    .map_err(|e| format!("server failed: {e}"))
}
