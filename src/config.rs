//! Configuration management.
//!
//! Loads settings from environment variables and .env file.

use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Settings {
    // ClickHouse
    pub clickhouse_url: String,
    pub clickhouse_user: String,
    pub clickhouse_password: String,
    pub clickhouse_database: String,
    pub clickhouse_auth_scheme: String,
    pub clickhouse_rate_limit: u32,
    pub clickhouse_max_retries: u32,
    pub clickhouse_timeout_secs: u64,

    // Query limits
    pub query_max_rows: u64,
    pub query_cache_ttl_secs: u64,
    pub query_cache_max_entries: usize,
    pub batch_concurrency: usize,
    pub batch_max_queries: usize,

    // Server
    pub api_token: String,
    pub init_schema: bool,
    pub host: String,
    pub port: u16,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

/// How credentials are presented to ClickHouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `X-ClickHouse-User` / `X-ClickHouse-Key` headers.
    Headers,
    /// HTTP basic auth.
    Basic,
}

impl FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "headers" => Ok(Self::Headers),
            "basic" => Ok(Self::Basic),
            _ => Err(format!("Invalid auth scheme: {s}")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clickhouse_url: "http://localhost:8123".to_string(),
            clickhouse_user: "default".to_string(),
            clickhouse_password: String::new(),
            clickhouse_database: "default".to_string(),
            clickhouse_auth_scheme: "headers".to_string(),
            clickhouse_rate_limit: 20,
            clickhouse_max_retries: 3,
            clickhouse_timeout_secs: 30,
            query_max_rows: 10_000,
            query_cache_ttl_secs: 1800,
            query_cache_max_entries: 1000,
            batch_concurrency: 4,
            batch_max_queries: 20,
            api_token: String::new(),
            init_schema: false,
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Load settings from environment variables (and .env file).
    pub fn from_env() -> Self {
        // Try to load .env file (ignore if not found).
        let _ = dotenvy::dotenv();
        let d = Self::default();

        Self {
            clickhouse_url: env_str("CLICKHOUSE_URL", &d.clickhouse_url),
            clickhouse_user: env_str("CLICKHOUSE_USER", &d.clickhouse_user),
            clickhouse_password: env_str("CLICKHOUSE_PASSWORD", ""),
            clickhouse_database: env_str("CLICKHOUSE_DATABASE", &d.clickhouse_database),
            clickhouse_auth_scheme: env_str("CLICKHOUSE_AUTH_SCHEME", &d.clickhouse_auth_scheme),
            clickhouse_rate_limit: env_u32("CLICKHOUSE_RATE_LIMIT", d.clickhouse_rate_limit),
            clickhouse_max_retries: env_u32("CLICKHOUSE_MAX_RETRIES", d.clickhouse_max_retries),
            clickhouse_timeout_secs: env_u64("CLICKHOUSE_TIMEOUT_SECS", d.clickhouse_timeout_secs),

            query_max_rows: env_u64("QUERY_MAX_ROWS", d.query_max_rows),
            query_cache_ttl_secs: env_u64("QUERY_CACHE_TTL_SECS", d.query_cache_ttl_secs),
            query_cache_max_entries: env_usize(
                "QUERY_CACHE_MAX_ENTRIES",
                d.query_cache_max_entries,
            ),
            batch_concurrency: env_usize("BATCH_CONCURRENCY", d.batch_concurrency),
            batch_max_queries: env_usize("BATCH_MAX_QUERIES", d.batch_max_queries),

            api_token: env_str("API_TOKEN", ""),
            init_schema: env_bool("INIT_SCHEMA", false),
            host: env_str("HOST", &d.host),
            port: env_u16("PORT", d.port),

            log_level: env_str("LOG_LEVEL", &d.log_level),
            log_json: env_bool("LOG_JSON", false),
        }
    }

    /// Parsed auth scheme. Falls back to headers when invalid; `validate` reports it.
    pub fn auth_scheme(&self) -> AuthScheme {
        self.clickhouse_auth_scheme
            .parse()
            .unwrap_or(AuthScheme::Headers)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.query_cache_ttl_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate configuration for critical requirements.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.clickhouse_url.starts_with("http://")
            && !self.clickhouse_url.starts_with("https://")
        {
            errors.push("CLICKHOUSE_URL must start with http:// or https://".to_string());
        }

        if let Err(e) = self.clickhouse_auth_scheme.parse::<AuthScheme>() {
            errors.push(format!("CLICKHOUSE_AUTH_SCHEME: {e}"));
        }

        if self.clickhouse_rate_limit == 0 {
            errors.push("CLICKHOUSE_RATE_LIMIT must be > 0".to_string());
        }
        if self.clickhouse_max_retries == 0 {
            errors.push("CLICKHOUSE_MAX_RETRIES must be > 0".to_string());
        }
        if self.query_max_rows == 0 {
            errors.push("QUERY_MAX_ROWS must be > 0".to_string());
        }
        if self.batch_concurrency == 0 {
            errors.push("BATCH_CONCURRENCY must be > 0".to_string());
        }
        if self.batch_max_queries == 0 {
            errors.push("BATCH_MAX_QUERIES must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let settings = Settings {
            clickhouse_url: "localhost:8123".to_string(),
            clickhouse_auth_scheme: "kerberos".to_string(),
            query_max_rows: 0,
            batch_concurrency: 0,
            ..Settings::default()
        };
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].contains("CLICKHOUSE_URL"));
    }

    #[test]
    fn test_auth_scheme_parse() {
        assert_eq!("BASIC".parse::<AuthScheme>(), Ok(AuthScheme::Basic));
        assert_eq!("headers".parse::<AuthScheme>(), Ok(AuthScheme::Headers));
        assert!("token".parse::<AuthScheme>().is_err());
    }
}
