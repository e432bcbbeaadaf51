use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};

/// Placeholder JWT secrets that must not reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your_jwt_secret",
];

/// Runtime configuration, read from `UNYLOST_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub ai_layer_url: String,
    pub ai_match_timeout: Duration,
    pub upload_dir: PathBuf,
    pub sync_interval_secs: u64,
    pub sync_batch: u32,
    /// Echo verification and reset codes back in API responses.
    pub expose_codes: bool,
    pub admin_email: String,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("UNYLOST_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("UNYLOST_JWT_SECRET is unset or still a placeholder");
        }

        Ok(Self {
            host: var_or("UNYLOST_HOST", "0.0.0.0"),
            port: var_or("UNYLOST_PORT", "5000").parse()?,
            db_path: var_or("UNYLOST_DB_PATH", "unylost.db").into(),
            jwt_secret,
            jwt_ttl_hours: parsed_or("UNYLOST_JWT_TTL_HOURS", 168),
            ai_layer_url: var_or("UNYLOST_AI_LAYER_URL", "http://localhost:8000")
                .trim_end_matches('/')
                .to_string(),
            ai_match_timeout: Duration::from_secs(parsed_or("UNYLOST_AI_MATCH_TIMEOUT_SECS", 30)),
            upload_dir: var_or("UNYLOST_UPLOAD_DIR", "uploads").into(),
            sync_interval_secs: parsed_or("UNYLOST_SYNC_INTERVAL_SECS", 1800),
            sync_batch: parsed_or("UNYLOST_SYNC_BATCH", 20),
            expose_codes: parsed_or("UNYLOST_EXPOSE_CODES", true),
            admin_email: var_or("UNYLOST_ADMIN_EMAIL", "admin@unylost.com"),
            admin_password: var_or("UNYLOST_ADMIN_PASSWORD", "admin123"),
        })
    }

    /// Configuration for tests and local tooling: in-memory friendly
    /// defaults with the given secret.
    pub fn for_tests(jwt_secret: &str, upload_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            db_path: ":memory:".into(),
            jwt_secret: jwt_secret.to_string(),
            jwt_ttl_hours: 1,
            // Port 9 (discard) is closed on test machines, so AI calls fail fast.
            ai_layer_url: "http://127.0.0.1:9".into(),
            ai_match_timeout: Duration::from_secs(2),
            upload_dir,
            sync_interval_secs: 1800,
            sync_batch: 20,
            expose_codes: true,
            admin_email: "admin@unylost.com".into(),
            admin_password: "admin123".into(),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
