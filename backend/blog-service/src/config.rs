/// Configuration management for Blog Service
///
/// Loads configuration from environment variables (a `.env` file is honoured
/// by `main` before this runs).
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEV_SESSION_SECRET: &str = "dev-insecure-session-secret-change-me";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Page cache configuration
    pub cache: CacheConfig,
    /// Feed and display settings
    pub blog: BlogConfig,
    /// Session cookie settings
    pub session: SessionConfig,
    /// Uploaded media settings
    pub media: MediaConfig,
    /// Outgoing mail
    pub email: EmailConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL; the in-process cache is used when unset
    pub redis_url: Option<String>,
    /// Index page cache lifetime in seconds
    pub timeout_secs: u64,
    /// Upper bound on pages held by the in-process cache
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogConfig {
    /// Posts per feed page
    pub paginator_limit: usize,
    /// Characters kept when a post or comment is shown as a short label
    pub text_field_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(skip_serializing)]
    pub secret: String,
    pub ttl_secs: u64,
    /// Lifetime of password reset links
    pub reset_ttl_secs: u64,
    /// Set the `Secure` cookie attribute
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub max_upload_bytes: usize,
}

/// Outgoing mail settings.
///
/// With no SMTP host, messages are written as `.eml` files under `file_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub use_starttls: bool,
    /// Sender mailbox
    pub from: String,
    pub file_path: PathBuf,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let app = AppConfig {
            env: app_env.clone(),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env_or_default("PORT", 8000)?,
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: parse_env_or_default("DB_MAX_CONNECTIONS", default_max_connections())?,
            min_connections: parse_env_or_default("DB_MIN_CONNECTIONS", default_min_connections())?,
        };

        let cache = CacheConfig {
            redis_url: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            timeout_secs: parse_env_or_default("CACHE_TIMEOUT", 20)?,
            max_entries: parse_env_or_default(
                "CACHE_MAX_ENTRIES",
                page_cache::DEFAULT_MAX_ENTRIES,
            )?,
        };

        let blog = BlogConfig {
            paginator_limit: parse_env_or_default("PAGINATOR_LIMIT", 10)?,
            text_field_limit: parse_env_or_default("TEXT_FIELD_LIMIT", 15)?,
        };
        if blog.paginator_limit == 0 {
            bail!("PAGINATOR_LIMIT must be at least 1");
        }

        let secret = match std::env::var("SESSION_SECRET") {
            Ok(secret) => secret,
            Err(_) if production => bail!("SESSION_SECRET must be set in production"),
            Err(_) => DEV_SESSION_SECRET.to_string(),
        };
        if production && (secret.len() < 32 || secret == DEV_SESSION_SECRET) {
            bail!("SESSION_SECRET must be at least 32 characters and not the development default");
        }
        let session = SessionConfig {
            secret,
            ttl_secs: parse_env_or_default("SESSION_TTL_SECS", 1_209_600)?,
            reset_ttl_secs: parse_env_or_default("PASSWORD_RESET_TIMEOUT", 259_200)?,
            secure_cookie: production,
        };

        let media = MediaConfig {
            root: std::env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            max_upload_bytes: parse_env_or_default("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
        };

        let email = EmailConfig {
            smtp_host: non_empty_env("SMTP_HOST"),
            smtp_port: parse_env_or_default("SMTP_PORT", 587)?,
            smtp_username: non_empty_env("SMTP_USERNAME"),
            smtp_password: non_empty_env("SMTP_PASSWORD"),
            use_starttls: parse_env_or_default("SMTP_STARTTLS", true)?,
            from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "webmaster@localhost".to_string()),
            file_path: std::env::var("EMAIL_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("sent_emails")),
        };

        Ok(Config {
            app,
            database,
            cache,
            blog,
            session,
            media,
            email,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
