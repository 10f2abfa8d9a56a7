//! Per-issuer signing-key resolution.
//!
//! The resolver owns one [`JwksClient`] per issuer, built lazily the
//! first time a token from that issuer arrives. Clients are never
//! evicted: the set of issuers a deployment sees is small and stable,
//! and each client's own TTL cache bounds staleness.

use crate::auth::jwks::{Jwk, JwksClient, JwksSettings};
use crate::auth::AuthError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Well-known path where issuers publish their key set.
const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Maps issuers to their JWKS clients.
pub struct KeyResolver {
    /// One client per issuer URL. Lock is held only for map access,
    /// never across a fetch.
    clients: RwLock<HashMap<String, Arc<JwksClient>>>,

    /// Settings applied to every client built by this resolver.
    settings: JwksSettings,
}

impl KeyResolver {
    /// Create a resolver whose clients share the given settings.
    pub fn new(settings: JwksSettings) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            settings,
        }
    }

    /// Resolve the public key for `(issuer, kid)`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyResolution` when the issuer's key set
    /// cannot be fetched or does not contain `kid`.
    #[instrument(skip(self), fields(issuer = %issuer, kid = %kid))]
    pub async fn resolve_key(&self, issuer: &str, kid: &str) -> Result<Jwk, AuthError> {
        let client = self.client_for(issuer).await?;
        client.get_key(kid).await
    }

    /// Get or lazily create the JWKS client for an issuer.
    ///
    /// Read-lock fast path for the common case; concurrent first
    /// requests for the same issuer race on the write lock and the
    /// loser reuses the winner's client. A failed construction caches
    /// nothing, so a later request retries it.
    async fn client_for(&self, issuer: &str) -> Result<Arc<JwksClient>, AuthError> {
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(issuer) {
                return Ok(Arc::clone(client));
            }
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(issuer) {
            return Ok(Arc::clone(client));
        }

        let jwks_url = jwks_url_for(issuer);
        tracing::debug!(
            target: "mg.auth.resolver",
            issuer = %issuer,
            jwks_url = %jwks_url,
            "Creating JWKS client for new issuer"
        );
        let client = Arc::new(JwksClient::new(jwks_url, self.settings)?);
        clients.insert(issuer.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Number of issuers with a constructed client.
    #[cfg(test)]
    async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Derive the key-set URL from an issuer URL.
fn jwks_url_for(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), JWKS_PATH)
}
