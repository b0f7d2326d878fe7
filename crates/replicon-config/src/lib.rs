//! Flat, env-var driven configuration for the replication pipeline.
//!
//! Deliberately not the layered-YAML approach some sibling tooling uses for
//! backtest-run reproducibility hashing — this service has no config-hash
//! concept, just a handful of env vars read once at process start.

use anyhow::{Context, Result};

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

/// Process-wide settings, read once in `main` and passed down by reference.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub redis_url: String,

    pub broker_base_url: String,
    pub vendor_key: String,
    pub vendor_code: String,
    pub vendor_secret: String,

    pub rate_limit_per_sec: u32,
    pub http_pool_size: usize,
    pub db_pool_size: u32,
    pub max_concurrent_broker_calls: usize,
    pub order_timeout_secs: u64,

    pub token_ttl_secs: u64,
    pub order_map_ttl_secs: u64,

    pub bus_ack_wait_secs: u64,
    pub bus_max_deliver: i32,

    pub ingress_addr: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env_required("DATABASE_URL")?,
            redis_url: env_required("REDIS_URL")?,

            broker_base_url: env_required("REPLICON_BROKER_BASE_URL")?,
            vendor_key: env_required("REPLICON_VENDOR_KEY")?,
            vendor_code: env_required("REPLICON_VENDOR_CODE")?,
            vendor_secret: env_required("REPLICON_VENDOR_SECRET")?,

            rate_limit_per_sec: env_parse_or("REPLICON_RATE_LIMIT_PER_SEC", 10)?,
            http_pool_size: env_parse_or("REPLICON_HTTP_POOL_SIZE", 20)?,
            db_pool_size: env_parse_or("REPLICON_DB_POOL_SIZE", 20)?,
            max_concurrent_broker_calls: env_parse_or(
                "REPLICON_MAX_CONCURRENT_BROKER_CALLS",
                50,
            )?,
            order_timeout_secs: env_parse_or("REPLICON_ORDER_TIMEOUT_SECS", 30)?,

            token_ttl_secs: env_parse_or("REPLICON_TOKEN_TTL_SECS", 3000)?,
            order_map_ttl_secs: env_parse_or("REPLICON_ORDER_MAP_TTL_SECS", 604_800)?,

            bus_ack_wait_secs: env_parse_or("REPLICON_BUS_ACK_WAIT_SECS", 30)?,
            bus_max_deliver: env_parse_or("REPLICON_BUS_MAX_DELIVER", 3)?,

            ingress_addr: env_or("REPLICON_INGRESS_ADDR", "0.0.0.0:8080"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_or_falls_back_on_missing_var() {
        std::env::remove_var("REPLICON_TEST_PARSE_FALLBACK");
        let v: u32 = env_parse_or("REPLICON_TEST_PARSE_FALLBACK", 7).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn env_parse_or_rejects_malformed_value() {
        std::env::set_var("REPLICON_TEST_PARSE_BAD", "not-a-number");
        let result: Result<u32> = env_parse_or("REPLICON_TEST_PARSE_BAD", 7);
        assert!(result.is_err());
        std::env::remove_var("REPLICON_TEST_PARSE_BAD");
    }
}
