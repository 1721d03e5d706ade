use std::env;

use anyhow::Context;
use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub jwt_ttl_hours: i64,
    pub max_upload_bytes: usize,
    pub payment: PaymentConfig,
    pub media: MediaConfig,
}

/// Hosted payment page settings.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub checkout_url: String,
    pub public_key: String,
    /// Sessions build their return URL as `{return_base_url}/{session_id}/return`.
    pub return_base_url: String,
    pub currency: String,
    pub session_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;

        let payment = PaymentConfig {
            checkout_url: env::var("PAYMENT_CHECKOUT_URL")
                .context("PAYMENT_CHECKOUT_URL is not set")?,
            public_key: env::var("PAYMENT_PUBLIC_KEY").context("PAYMENT_PUBLIC_KEY is not set")?,
            return_base_url: env::var("PAYMENT_RETURN_BASE_URL")
                .unwrap_or_else(|_| format!("http://{host}:{port}/api/payments")),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "ETB".to_string()),
            session_ttl_minutes: parse_or("PAYMENT_SESSION_TTL_MINUTES", 15),
        };

        let media = MediaConfig {
            base_url: env::var("MEDIA_BASE_URL").context("MEDIA_BASE_URL is not set")?,
            api_key: SecretString::from(env::var("MEDIA_API_KEY").unwrap_or_default()),
            timeout_secs: parse_or("MEDIA_TIMEOUT_SECS", 30),
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret: SecretString::from(jwt_secret),
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", 24),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
            payment,
            media,
        })
    }
}

impl PaymentConfig {
    pub fn page_url_for(&self, session_id: uuid::Uuid) -> String {
        format!(
            "{}/{}/page",
            self.return_base_url.trim_end_matches('/'),
            session_id
        )
    }

    pub fn return_url_for(&self, session_id: uuid::Uuid) -> String {
        format!(
            "{}/{}/return",
            self.return_base_url.trim_end_matches('/'),
            session_id
        )
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
