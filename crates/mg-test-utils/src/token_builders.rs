//! Keypair fixtures and builder patterns for test tokens.
//!
//! Keypairs are derived from a process-local counter so every call to
//! [`TestKeypair::generate`] yields a distinct key without needing an
//! entropy source in tests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

static KEY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// An Ed25519 keypair with a key ID, usable both to sign test tokens
/// and to publish the matching JWK.
pub struct TestKeypair {
    kid: String,
    public_key: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    /// Generate a fresh keypair with the given key ID.
    pub fn generate(kid: &str) -> Self {
        let counter = KEY_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&counter.to_be_bytes());
        Self::from_seed(seed, kid)
    }

    /// Build a keypair from a fixed seed (deterministic across runs).
    pub fn from_seed(seed: [u8; 32], kid: &str) -> Self {
        let key_pair =
            Ed25519KeyPair::from_seed_unchecked(&seed).expect("valid Ed25519 seed");
        let public_key = key_pair.public_key().as_ref().to_vec();
        let private_key_pkcs8 = build_pkcs8_from_seed(&seed);

        Self {
            kid: kid.to_string(),
            public_key,
            private_key_pkcs8,
        }
    }

    /// The key ID under which this key is published.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The JWK document for this key's public half.
    pub fn jwk_json(&self) -> serde_json::Value {
        json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key),
            "alg": "EdDSA",
            "use": "sig",
        })
    }

    /// Sign arbitrary claims with this key.
    pub fn sign_claims(&self, claims: &serde_json::Value, kid: &str) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(kid.to_string());
        jsonwebtoken::encode(&header, claims, &encoding_key).expect("token signing")
    }
}

/// PKCS#8 v1 document wrapping an Ed25519 seed.
///
/// `EncodingKey::from_ed_der` expects a full PKCS#8 document, not a
/// raw seed; this builds the fixed 48-byte DER structure around it.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::new();

    // PrivateKeyInfo SEQUENCE
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // AlgorithmIdentifier SEQUENCE
    pkcs8.push(0x30);
    pkcs8.push(0x05); // Length: 5 bytes
    // OID 1.3.101.112 (Ed25519)
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // PrivateKey OCTET STRING wrapping an inner OCTET STRING
    pkcs8.push(0x04);
    pkcs8.push(0x22); // Length: 34 bytes
    pkcs8.push(0x04);
    pkcs8.push(0x20); // Length: 32 bytes
    pkcs8.extend_from_slice(seed);

    pkcs8
}

/// Builder for signed test tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TokenBuilder::new()
///     .iss(issuer.url())
///     .sub("alice")
///     .aud("media")
///     .expires_in_secs(300)
///     .sign(&keypair);
/// ```
pub struct TokenBuilder {
    iss: Option<String>,
    sub: Option<String>,
    aud: Option<serde_json::Value>,
    exp: i64,
    nbf: Option<i64>,
    iat: i64,
    kid_override: Option<String>,
}

impl TokenBuilder {
    /// Create a builder with a five-minute expiry and no iss/sub/aud.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            iss: None,
            sub: None,
            aud: None,
            exp: (now + Duration::seconds(300)).timestamp(),
            nbf: None,
            iat: now.timestamp(),
            kid_override: None,
        }
    }

    /// Set the issuer claim.
    pub fn iss(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Set the subject claim.
    pub fn sub(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Set a single-string audience claim.
    pub fn aud(mut self, audience: &str) -> Self {
        self.aud = Some(json!(audience));
        self
    }

    /// Set a list-shaped audience claim.
    pub fn aud_list(mut self, audiences: &[&str]) -> Self {
        self.aud = Some(json!(audiences));
        self
    }

    /// Set expiration to `seconds` from now.
    pub fn expires_in_secs(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set expiration to `seconds` in the past.
    pub fn expired_secs_ago(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() - Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set a not-before claim `seconds` from now.
    pub fn nbf_in_secs(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Put a different key ID in the header than the signing key's.
    pub fn kid_override(mut self, kid: &str) -> Self {
        self.kid_override = Some(kid.to_string());
        self
    }

    /// Build the claims payload without signing (for malformed-token
    /// scenarios that assemble the token by hand).
    pub fn claims_json(&self) -> serde_json::Value {
        let mut claims = json!({
            "exp": self.exp,
            "iat": self.iat,
        });
        if let Some(iss) = &self.iss {
            claims["iss"] = json!(iss);
        }
        if let Some(sub) = &self.sub {
            claims["sub"] = json!(sub);
        }
        if let Some(aud) = &self.aud {
            claims["aud"] = aud.clone();
        }
        if let Some(nbf) = self.nbf {
            claims["nbf"] = json!(nbf);
        }
        claims
    }

    /// Sign the token with the given keypair.
    pub fn sign(self, keypair: &TestKeypair) -> String {
        let kid = self
            .kid_override
            .clone()
            .unwrap_or_else(|| keypair.kid().to_string());
        keypair.sign_claims(&self.claims_json(), &kid)
    }
}

impl Default for TokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_yields_distinct_keys() {
        let a = TestKeypair::generate("key-1");
        let b = TestKeypair::generate("key-1");
        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let a = TestKeypair::from_seed([7u8; 32], "key-1");
        let b = TestKeypair::from_seed([7u8; 32], "key-1");
        assert_eq!(a.public_key, b.public_key);
    }

    #[test]
    fn test_jwk_json_shape() {
        let keypair = TestKeypair::generate("key-xyz");
        let jwk = keypair.jwk_json();

        assert_eq!(jwk["kty"], "OKP");
        assert_eq!(jwk["kid"], "key-xyz");
        assert_eq!(jwk["crv"], "Ed25519");
        assert_eq!(jwk["alg"], "EdDSA");
        assert!(jwk["x"].as_str().unwrap().len() > 32);
    }

    #[test]
    fn test_signed_token_has_three_segments_and_kid() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss("https://issuer.example.com")
            .sub("alice")
            .aud("media")
            .sign(&keypair);

        assert_eq!(token.split('.').count(), 3);

        let header_b64 = token.split('.').next().unwrap();
        let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header_bytes).unwrap();
        assert_eq!(header["alg"], "EdDSA");
        assert_eq!(header["kid"], "key-1");
    }

    #[test]
    fn test_kid_override_changes_header_only() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss("https://issuer.example.com")
            .sub("alice")
            .aud("media")
            .kid_override("other-kid")
            .sign(&keypair);

        let header_b64 = token.split('.').next().unwrap();
        let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header_bytes).unwrap();
        assert_eq!(header["kid"], "other-kid");
    }

    #[test]
    fn test_claims_json_omits_unset_fields() {
        let claims = TokenBuilder::new().sub("alice").claims_json();
        assert!(claims.get("iss").is_none());
        assert!(claims.get("aud").is_none());
        assert_eq!(claims["sub"], "alice");
        assert!(claims["exp"].as_i64().unwrap() > 0);
    }
}
