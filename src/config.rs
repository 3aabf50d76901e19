use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub token_ttl_hours: i64,
    pub storage_root: PathBuf,
    pub max_upload_bytes: usize,
    pub cleanup_interval: Duration,
    pub document_retention: chrono::Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let storage_root = env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage".to_string());

        let max_upload_mb: u64 = parse_or("MAX_UPLOAD_MB", 20);
        let max_upload_bytes = usize::try_from(scaled("MAX_UPLOAD_MB", max_upload_mb, 1024 * 1024)?)?;

        let cleanup_interval_hours: u64 = parse_or("CLEANUP_INTERVAL_HOURS", 24);
        if cleanup_interval_hours == 0 {
            anyhow::bail!("CLEANUP_INTERVAL_HOURS must be at least 1");
        }
        let cleanup_interval =
            Duration::from_secs(scaled("CLEANUP_INTERVAL_HOURS", cleanup_interval_hours, 3600)?);

        let retention_days: i64 = parse_or("DOCUMENT_RETENTION_DAYS", 30);
        let document_retention = match chrono::Duration::try_days(retention_days) {
            Some(d) if retention_days >= 0 => d,
            _ => anyhow::bail!("DOCUMENT_RETENTION_DAYS is out of range"),
        };

        let token_ttl_hours: i64 = parse_or("TOKEN_TTL_HOURS", 24);
        if token_ttl_hours < 1 || chrono::Duration::try_hours(token_ttl_hours).is_none() {
            anyhow::bail!("TOKEN_TTL_HOURS is out of range");
        }

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            token_ttl_hours,
            storage_root: PathBuf::from(storage_root),
            max_upload_bytes,
            cleanup_interval,
            document_retention,
        })
    }
}

/// Missing or unparsable values fall back to the default.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// `value * factor`, refusing values that do not fit.
fn scaled(key: &str, value: u64, factor: u64) -> anyhow::Result<u64> {
    match value.checked_mul(factor) {
        Some(v) => Ok(v),
        None => anyhow::bail!("{key} is too large"),
    }
}
