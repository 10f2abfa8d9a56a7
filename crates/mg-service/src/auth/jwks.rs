//! JWKS client for fetching and caching an issuer's public keys.
//!
//! One `JwksClient` exists per issuer (see `resolver`). It fetches the
//! issuer's `/.well-known/jwks.json` document, caches the keys with a
//! configurable TTL, and bounds how often the remote endpoint may be
//! fetched per minute so a flood of hostile tokens cannot be turned
//! into a flood of outbound requests.
//!
//! # Security
//!
//! - Keys are cached to reduce load on issuers and improve latency
//! - Cache expiry on TTL picks up key rotations within a bounded time
//! - A kid absent from a still-valid cache fails WITHOUT refetching,
//!   so unknown-kid tokens cannot bypass the cache
//! - Remote fetches are rate limited per issuer and bounded by a
//!   timeout

use crate::auth::AuthError;
use crate::config;
use crate::observability::metrics::record_jwks_fetch;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Length of the rolling rate-limit window.
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// JSON Web Key from a JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (always "OKP" for Ed25519).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Curve name (always "Ed25519" for EdDSA).
    #[serde(default)]
    pub crv: Option<String>,

    /// Public key value (base64url encoded).
    #[serde(default)]
    pub x: Option<String>,

    /// Algorithm (should be "EdDSA").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document as published by an issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Tuning knobs shared by every issuer client, taken from [`Config`].
///
/// [`Config`]: crate::config::Config
#[derive(Debug, Clone, Copy)]
pub struct JwksSettings {
    /// How long a fetched key set is served from cache.
    pub cache_ttl: Duration,

    /// Timeout for one remote fetch.
    pub fetch_timeout: Duration,

    /// Maximum remote fetches per rolling minute.
    pub rate_limit_rpm: u32,
}

impl Default for JwksSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(config::DEFAULT_JWKS_CACHE_TTL_SECONDS),
            fetch_timeout: Duration::from_secs(config::DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
            rate_limit_rpm: config::DEFAULT_JWKS_RATE_LIMIT_RPM,
        }
    }
}

/// Cached key set with expiry time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    /// When this cache entry expires.
    expires_at: Instant,
}

/// Rolling one-minute fetch counter.
struct FetchWindow {
    window_start: Instant,
    fetches: u32,
}

impl FetchWindow {
    /// Account for one fetch attempt at `now`. Returns false when the
    /// window budget is exhausted.
    fn try_acquire(&mut self, now: Instant, limit: u32) -> bool {
        if now.duration_since(self.window_start) >= RATE_LIMIT_WINDOW {
            self.window_start = now;
            self.fetches = 0;
        }

        if self.fetches >= limit {
            return false;
        }

        self.fetches += 1;
        true
    }
}

/// Thread-safe client for one issuer's key-set endpoint.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached key set.
    cache: RwLock<Option<CachedJwks>>,

    /// Fetch accounting for rate limiting. A std Mutex: held only for
    /// the window arithmetic, never across an await point.
    window: Mutex<FetchWindow>,

    settings: JwksSettings,
}

impl JwksClient {
    /// Create a new JWKS client for one endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyResolution` if the HTTP client cannot be
    /// built with the configured fetch timeout. No client without the
    /// timeout is ever constructed.
    pub fn new(jwks_url: String, settings: JwksSettings) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()
            .map_err(|e| {
                tracing::error!(target: "mg.auth.jwks", error = %e, "Failed to build HTTP client for JWKS fetches");
                AuthError::KeyResolution("key set HTTP client construction failed".to_string())
            })?;

        Ok(Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            window: Mutex::new(FetchWindow {
                window_start: Instant::now(),
                fetches: 0,
            }),
            settings,
        })
    }

    /// Get a JWK by key ID.
    ///
    /// Serves from cache while the TTL holds; fetches otherwise. A kid
    /// missing from a valid cache fails without a refetch.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyResolution` if the key set is
    /// unreachable, malformed, rate-limited, or lacks `kid`.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        // Check cache first
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::debug!(target: "mg.auth.jwks", kid = %kid, "JWKS cache hit");
                        return Ok(key.clone());
                    }
                    tracing::debug!(target: "mg.auth.jwks", kid = %kid, "Key not found in valid JWKS cache");
                    return Err(AuthError::KeyResolution(
                        "key id not present in issuer key set".to_string(),
                    ));
                }
            }
        }

        // Cache miss or expired - fetch fresh JWKS
        self.refresh_cache().await?;

        // Try to get key from refreshed cache
        let cache = self.cache.read().await;
        if let Some(cached) = cache.as_ref() {
            if let Some(key) = cached.keys.get(kid) {
                return Ok(key.clone());
            }
        }

        tracing::warn!(target: "mg.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(AuthError::KeyResolution(
            "key id not present in issuer key set".to_string(),
        ))
    }

    /// Refresh the key-set cache from the remote endpoint.
    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), AuthError> {
        // Rate-limit gate first. Failed fetches count against the
        // budget too: the point is to bound outbound traffic.
        let allowed = self
            .window
            .lock()
            .map(|mut window| window.try_acquire(Instant::now(), self.settings.rate_limit_rpm))
            .unwrap_or(false);

        if !allowed {
            tracing::warn!(
                target: "mg.auth.jwks",
                url = %self.jwks_url,
                limit_rpm = self.settings.rate_limit_rpm,
                "JWKS fetch rate limit exceeded"
            );
            record_jwks_fetch("rate_limited");
            return Err(AuthError::KeyResolution(
                "key set fetch rate limit exceeded".to_string(),
            ));
        }

        tracing::debug!(target: "mg.auth.jwks", url = %self.jwks_url, "Fetching JWKS from issuer");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "mg.auth.jwks", url = %self.jwks_url, error = %e, "Failed to fetch JWKS");
                record_jwks_fetch("network_error");
                AuthError::KeyResolution("issuer key set unreachable".to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "mg.auth.jwks",
                url = %self.jwks_url,
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            record_jwks_fetch("http_error");
            return Err(AuthError::KeyResolution(
                "issuer key set endpoint returned an error".to_string(),
            ));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "mg.auth.jwks", url = %self.jwks_url, error = %e, "Failed to parse JWKS response");
            record_jwks_fetch("parse_error");
            AuthError::KeyResolution("issuer key set malformed".to_string())
        })?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            target: "mg.auth.jwks",
            url = %self.jwks_url,
            key_count = keys.len(),
            "JWKS cache refreshed"
        );
        record_jwks_fetch("ok");

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            expires_at: Instant::now() + self.settings.cache_ttl,
        });

        Ok(())
    }

    /// The endpoint this client fetches from.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}
