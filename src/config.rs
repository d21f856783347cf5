use std::env;

use anyhow::Context;
use chrono::Duration;

const DEFAULT_JWT_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(10);
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        let jwt_ttl_seconds = parse_ttl(env::var("JWT_TTL_SECONDS").ok().as_deref())?;
        Ok(Self {
            port,
            database_url,
            database_max_connections,
            host,
            jwt_secret,
            jwt_ttl_seconds,
        })
    }
}

/// Unset, unparsable or non-positive values fall back to the default; values
/// chrono cannot represent are a startup error.
fn parse_ttl(raw: Option<&str>) -> anyhow::Result<i64> {
    let ttl = raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_JWT_TTL_SECONDS);
    if Duration::try_seconds(ttl).is_none() {
        anyhow::bail!("JWT_TTL_SECONDS is out of range: {ttl}");
    }
    Ok(ttl)
}
