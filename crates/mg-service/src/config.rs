//! Media Gateway configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults. `from_vars` takes a plain map so tests can build configs
//! without touching the process environment.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default required audience claim value.
pub const DEFAULT_REQUIRED_AUDIENCE: &str = "media";

/// Default cap on JWKS fetches per issuer per minute.
pub const DEFAULT_JWKS_RATE_LIMIT_RPM: u32 = 10;

/// Default JWKS response cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Media Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Audience value a token must carry to pass the gate.
    pub required_audience: String,

    /// Maximum JWKS fetches per issuer per rolling minute.
    pub jwks_rate_limit_rpm: u32,

    /// How long fetched key sets are served from cache, in seconds.
    /// Bounds how long a key rotation at an issuer goes unnoticed.
    pub jwks_cache_ttl_seconds: u64,

    /// Timeout for a single JWKS fetch, in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Clock skew tolerance in seconds for exp/nbf validation.
    pub jwt_clock_skew_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid required audience configuration: {0}")]
    InvalidRequiredAudience(String),

    #[error("Invalid JWKS rate limit configuration: {0}")]
    InvalidJwksRateLimit(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidJwksCacheTtl(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidJwksFetchTimeout(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let required_audience = vars
            .get("REQUIRED_AUDIENCE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REQUIRED_AUDIENCE.to_string());

        if required_audience.trim().is_empty() {
            return Err(ConfigError::InvalidRequiredAudience(
                "REQUIRED_AUDIENCE must not be empty".to_string(),
            ));
        }

        let jwks_rate_limit_rpm = parse_positive_u32(
            vars,
            "JWKS_RATE_LIMIT_RPM",
            DEFAULT_JWKS_RATE_LIMIT_RPM,
            ConfigError::InvalidJwksRateLimit,
        )?;

        let jwks_cache_ttl_seconds = parse_positive_u64(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
            ConfigError::InvalidJwksCacheTtl,
        )?;

        let jwks_fetch_timeout_seconds = parse_positive_u64(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
            ConfigError::InvalidJwksFetchTimeout,
        )?;

        // Clock skew may be zero (the default) but is bounded above.
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        Ok(Config {
            bind_address,
            required_audience,
            jwks_rate_limit_rpm,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            jwt_clock_skew_seconds,
        })
    }
}

fn parse_positive_u32(
    vars: &HashMap<String, String>,
    name: &str,
    default: u32,
    err: fn(String) -> ConfigError,
) -> Result<u32, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u32 = value_str.parse().map_err(|e| {
        err(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(err(format!("{} must be greater than 0", name)));
    }

    Ok(value)
}

fn parse_positive_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    err: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        err(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(err(format!("{} must be greater than 0", name)));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = HashMap::new();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.required_audience, DEFAULT_REQUIRED_AUDIENCE);
        assert_eq!(config.jwks_rate_limit_rpm, DEFAULT_JWKS_RATE_LIMIT_RPM);
        assert_eq!(config.jwks_cache_ttl_seconds, DEFAULT_JWKS_CACHE_TTL_SECONDS);
        assert_eq!(
            config.jwks_fetch_timeout_seconds,
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
        );
        assert_eq!(config.jwt_clock_skew_seconds, DEFAULT_CLOCK_SKEW.as_secs());
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            ("REQUIRED_AUDIENCE".to_string(), "uploads".to_string()),
            ("JWKS_RATE_LIMIT_RPM".to_string(), "20".to_string()),
            ("JWKS_CACHE_TTL_SECONDS".to_string(), "60".to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "3".to_string()),
            ("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.required_audience, "uploads");
        assert_eq!(config.jwks_rate_limit_rpm, 20);
        assert_eq!(config.jwks_cache_ttl_seconds, 60);
        assert_eq!(config.jwks_fetch_timeout_seconds, 3);
        assert_eq!(config.jwt_clock_skew_seconds, 120);
    }

    #[test]
    fn test_required_audience_rejects_empty() {
        let vars = HashMap::from([("REQUIRED_AUDIENCE".to_string(), "  ".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidRequiredAudience(msg)) if msg.contains("must not be empty"))
        );
    }

    #[test]
    fn test_jwks_rate_limit_rejects_zero() {
        let vars = HashMap::from([("JWKS_RATE_LIMIT_RPM".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksRateLimit(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_jwks_rate_limit_rejects_non_numeric() {
        let vars = HashMap::from([("JWKS_RATE_LIMIT_RPM".to_string(), "ten".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksRateLimit(msg)) if msg.contains("must be a valid positive integer"))
        );
    }

    #[test]
    fn test_jwks_cache_ttl_rejects_zero() {
        let vars = HashMap::from([("JWKS_CACHE_TTL_SECONDS".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksCacheTtl(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_jwks_fetch_timeout_rejects_zero() {
        let vars = HashMap::from([("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwksFetchTimeout(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_accepts_zero() {
        let vars = HashMap::from([("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string())]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jwt_clock_skew_seconds, 0);
    }

    #[test]
    fn test_jwt_clock_skew_accepts_max() {
        let vars = HashMap::from([("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string())]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jwt_clock_skew_seconds, 600);
    }

    #[test]
    fn test_jwt_clock_skew_rejects_too_large() {
        let vars = HashMap::from([("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_rejects_negative() {
        let vars = HashMap::from([("JWT_CLOCK_SKEW_SECONDS".to_string(), "-5".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must be a valid non-negative integer"))
        );
    }
}
