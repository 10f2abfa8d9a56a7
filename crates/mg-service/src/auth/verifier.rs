//! Bearer token verification.
//!
//! Turns an untrusted compact JWT into an [`AuthenticatedIdentity`].
//! The stages run in a fixed order so that no network call happens for
//! a token that could never verify:
//!
//! 1. Decode the envelope (size check, structure, header/payload JSON)
//! 2. Pre-check `iss`, `sub` and header `kid` presence
//! 3. Pin the declared algorithm to EdDSA
//! 4. Resolve the signing key via [`KeyResolver`]
//! 5. Verify signature, issuer binding and temporal claims
//! 6. Check audience membership
//!
//! # Security
//!
//! - Only EdDSA (Ed25519) is accepted; `alg: none` and HMAC tokens are
//!   rejected before any key is fetched
//! - Issuer binding: the key used for verification always comes from
//!   the issuer the token itself names, and the verified `iss` claim
//!   must match it
//! - Every failure surfaces as a generic message; the variant is for
//!   server-side logs only

use crate::auth::claims::Claims;
use crate::auth::jwks::Jwk;
use crate::auth::resolver::KeyResolver;
use crate::auth::AuthError;
use common::jwt::{decode_ed25519_public_key_jwk, decode_unverified, UnverifiedToken};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// The only algorithm this gateway accepts.
const PINNED_ALG: &str = "EdDSA";

/// The verified principal a request acts as.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Subject claim of the verified token.
    pub sub: String,
}

/// Redacts the subject: identities flow through request extensions and
/// tracing spans, neither of which should carry principal identifiers.
impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedIdentity")
            .field("sub", &"[REDACTED]")
            .finish()
    }
}

/// Verifies bearer tokens against per-issuer signing keys.
pub struct TokenVerifier {
    /// Maps `(issuer, kid)` to public keys.
    resolver: Arc<KeyResolver>,

    /// Audience value a token must carry.
    required_audience: String,

    /// Clock skew tolerance in seconds for exp/nbf validation.
    clock_skew_seconds: u64,
}

impl TokenVerifier {
    /// Create a new verifier.
    pub fn new(resolver: Arc<KeyResolver>, required_audience: String, clock_skew_seconds: u64) -> Self {
        Self {
            resolver,
            required_audience,
            clock_skew_seconds,
        }
    }

    /// Verify a bearer token and return the identity it proves.
    ///
    /// # Errors
    ///
    /// Returns the matching [`AuthError`] variant for each failing
    /// stage. All variants render the same client-facing message.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, AuthError> {
        // 1. Decode the envelope (includes the size check)
        let envelope = decode_unverified(token).map_err(|e| {
            tracing::debug!(target: "mg.auth.verifier", error = ?e, "Token envelope decode failed");
            AuthError::MalformedToken
        })?;

        // 2. Pre-check required fields before any network call
        let (issuer, kid) = precheck(&envelope)?;

        // 3. Algorithm pinning, also before any network call
        if envelope.header.alg != PINNED_ALG {
            tracing::warn!(
                target: "mg.auth.verifier",
                alg = %envelope.header.alg,
                "Token declares unsupported algorithm"
            );
            return Err(AuthError::SignatureInvalid);
        }

        // 4. Resolve the signing key from the token's own issuer
        let jwk = self.resolver.resolve_key(&issuer, &kid).await?;

        // 5. Verify signature, issuer and temporal claims
        let claims = verify_token(token, &issuer, &jwk, self.clock_skew_seconds)?;

        // 6. Audience membership
        if !claims.aud.contains(&self.required_audience) {
            tracing::debug!(
                target: "mg.auth.verifier",
                issuer = %claims.iss,
                "Token audience does not include the required audience"
            );
            return Err(AuthError::AudienceRejected);
        }

        tracing::debug!(target: "mg.auth.verifier", issuer = %claims.iss, "Token verified");
        Ok(AuthenticatedIdentity { sub: claims.sub })
    }
}

/// Check that the envelope carries everything verification needs.
///
/// Tokens missing `iss`, `sub` or a header `kid` can never verify, so
/// they are rejected here without driving traffic to any key-set
/// endpoint.
fn precheck(envelope: &UnverifiedToken) -> Result<(String, String), AuthError> {
    let issuer = envelope.claims.iss.clone().ok_or_else(|| {
        tracing::debug!(target: "mg.auth.verifier", "Token missing iss claim");
        AuthError::IncompleteClaims
    })?;

    if envelope.claims.sub.is_none() {
        tracing::debug!(target: "mg.auth.verifier", "Token missing sub claim");
        return Err(AuthError::IncompleteClaims);
    }

    let kid = envelope.header.kid.clone().ok_or_else(|| {
        tracing::debug!(target: "mg.auth.verifier", "Token missing kid header");
        AuthError::IncompleteClaims
    })?;

    Ok((issuer, kid))
}

/// Verify the token's signature and claims against a resolved key.
///
/// Uses EdDSA (Ed25519) exclusively. The verified `iss` claim is bound
/// to the issuer whose key set supplied the key.
fn verify_token(
    token: &str,
    issuer: &str,
    jwk: &Jwk,
    clock_skew_seconds: u64,
) -> Result<Claims, AuthError> {
    // Validate JWK is an EdDSA key
    if jwk.kty != "OKP" {
        tracing::warn!(target: "mg.auth.verifier", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(AuthError::SignatureInvalid);
    }
    if let Some(alg) = &jwk.alg {
        if alg != PINNED_ALG {
            tracing::warn!(target: "mg.auth.verifier", alg = %alg, "Unexpected JWK algorithm");
            return Err(AuthError::SignatureInvalid);
        }
    }

    // Get public key bytes from JWK
    let public_key_b64 = jwk.x.as_ref().ok_or_else(|| {
        tracing::error!(target: "mg.auth.verifier", kid = %jwk.kid, "JWK missing x field");
        AuthError::SignatureInvalid
    })?;

    let public_key_bytes = decode_ed25519_public_key_jwk(public_key_b64).map_err(|e| {
        tracing::error!(target: "mg.auth.verifier", error = %e, "Invalid public key encoding");
        AuthError::SignatureInvalid
    })?;

    let decoding_key = DecodingKey::from_ed_der(&public_key_bytes);

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.leeway = clock_skew_seconds;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_issuer(&[issuer]);
    // Audience membership is checked explicitly against the normalized
    // claim shape, not via the library's string comparison.
    validation.validate_aud = false;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "mg.auth.verifier", error = %e, "Token verification failed");
        AuthError::SignatureInvalid
    })?;

    // set_issuer already enforced this; keep the binding explicit.
    if token_data.claims.iss != issuer {
        tracing::warn!(target: "mg.auth.verifier", "Verified iss does not match key issuer");
        return Err(AuthError::SignatureInvalid);
    }

    Ok(token_data.claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use mg_test_utils::{TestKeypair, TokenBuilder};

    const ISSUER: &str = "https://issuer.example.com";

    fn jwk_for(keypair: &TestKeypair) -> Jwk {
        serde_json::from_value(keypair.jwk_json()).unwrap()
    }

    fn envelope_for(header: &str, payload: &str) -> UnverifiedToken {
        let header_b64 = URL_SAFE_NO_PAD.encode(header.as_bytes());
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        let token = format!("{}.{}.sig", header_b64, payload_b64);
        decode_unverified(&token).unwrap()
    }

    // =========================================================================
    // precheck
    // =========================================================================

    #[test]
    fn test_precheck_accepts_complete_envelope() {
        let envelope = envelope_for(
            r#"{"alg":"EdDSA","kid":"key-1"}"#,
            r#"{"iss":"https://issuer.example.com","sub":"user-1"}"#,
        );

        let (issuer, kid) = precheck(&envelope).unwrap();
        assert_eq!(issuer, "https://issuer.example.com");
        assert_eq!(kid, "key-1");
    }

    #[test]
    fn test_precheck_rejects_missing_iss() {
        let envelope = envelope_for(r#"{"alg":"EdDSA","kid":"key-1"}"#, r#"{"sub":"user-1"}"#);
        assert_eq!(precheck(&envelope), Err(AuthError::IncompleteClaims));
    }

    #[test]
    fn test_precheck_rejects_missing_sub() {
        let envelope = envelope_for(
            r#"{"alg":"EdDSA","kid":"key-1"}"#,
            r#"{"iss":"https://issuer.example.com"}"#,
        );
        assert_eq!(precheck(&envelope), Err(AuthError::IncompleteClaims));
    }

    #[test]
    fn test_precheck_rejects_missing_kid() {
        let envelope = envelope_for(
            r#"{"alg":"EdDSA"}"#,
            r#"{"iss":"https://issuer.example.com","sub":"user-1"}"#,
        );
        assert_eq!(precheck(&envelope), Err(AuthError::IncompleteClaims));
    }

    #[test]
    fn test_precheck_rejects_empty_string_fields() {
        // Empty strings are normalized to None during envelope decode.
        let envelope = envelope_for(
            r#"{"alg":"EdDSA","kid":""}"#,
            r#"{"iss":"https://issuer.example.com","sub":"user-1"}"#,
        );
        assert_eq!(precheck(&envelope), Err(AuthError::IncompleteClaims));
    }

    // =========================================================================
    // verify_token - JWK validation
    // =========================================================================

    fn fake_token() -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA","kid":"key-1"}"#.as_bytes());
        let payload_b64 = URL_SAFE_NO_PAD.encode(
            r#"{"iss":"https://issuer.example.com","sub":"user-1","aud":"media","exp":9999999999}"#
                .as_bytes(),
        );
        format!("{}.{}.fake_signature", header_b64, payload_b64)
    }

    #[test]
    fn test_verify_token_rejects_non_okp_key_type() {
        let keypair = TestKeypair::generate("key-1");
        let mut jwk = jwk_for(&keypair);
        jwk.kty = "RSA".to_string();

        let result = verify_token(&fake_token(), ISSUER, &jwk, 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn test_verify_token_rejects_non_eddsa_jwk_algorithm() {
        let keypair = TestKeypair::generate("key-1");
        let mut jwk = jwk_for(&keypair);
        jwk.alg = Some("RS256".to_string());

        let result = verify_token(&fake_token(), ISSUER, &jwk, 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn test_verify_token_rejects_missing_x_field() {
        let keypair = TestKeypair::generate("key-1");
        let mut jwk = jwk_for(&keypair);
        jwk.x = None;

        let result = verify_token(&fake_token(), ISSUER, &jwk, 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn test_verify_token_rejects_invalid_base64_public_key() {
        let keypair = TestKeypair::generate("key-1");
        let mut jwk = jwk_for(&keypair);
        jwk.x = Some("!!!invalid-base64!!!".to_string());

        let result = verify_token(&fake_token(), ISSUER, &jwk, 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    // =========================================================================
    // verify_token - signature and claims
    // =========================================================================

    #[test]
    fn test_verify_token_accepts_valid_token() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss(ISSUER)
            .sub("user-1")
            .aud("media")
            .expires_in_secs(300)
            .sign(&keypair);

        let claims = verify_token(&token, ISSUER, &jwk_for(&keypair), 0).unwrap();
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.sub, "user-1");
        assert!(claims.aud.contains("media"));
    }

    #[test]
    fn test_verify_token_rejects_wrong_key() {
        let signing = TestKeypair::generate("key-1");
        let other = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss(ISSUER)
            .sub("user-1")
            .aud("media")
            .expires_in_secs(300)
            .sign(&signing);

        // Verified against a different keypair with the same kid.
        let result = verify_token(&token, ISSUER, &jwk_for(&other), 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn test_verify_token_rejects_tampered_payload() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss(ISSUER)
            .sub("user-1")
            .aud("media")
            .expires_in_secs(300)
            .sign(&keypair);

        let mut parts = token.split('.');
        let header = parts.next().unwrap();
        let _payload = parts.next().unwrap();
        let signature = parts.next().unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            r#"{"iss":"https://issuer.example.com","sub":"admin","aud":"media","exp":9999999999}"#
                .as_bytes(),
        );
        let tampered = format!("{}.{}.{}", header, forged_payload, signature);

        let result = verify_token(&tampered, ISSUER, &jwk_for(&keypair), 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn test_verify_token_rejects_expired() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss(ISSUER)
            .sub("user-1")
            .aud("media")
            .expired_secs_ago(120)
            .sign(&keypair);

        let result = verify_token(&token, ISSUER, &jwk_for(&keypair), 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn test_verify_token_leeway_admits_recently_expired() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss(ISSUER)
            .sub("user-1")
            .aud("media")
            .expired_secs_ago(30)
            .sign(&keypair);

        assert!(verify_token(&token, ISSUER, &jwk_for(&keypair), 0).is_err());
        assert!(verify_token(&token, ISSUER, &jwk_for(&keypair), 120).is_ok());
    }

    #[test]
    fn test_verify_token_rejects_not_yet_valid() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss(ISSUER)
            .sub("user-1")
            .aud("media")
            .expires_in_secs(600)
            .nbf_in_secs(300)
            .sign(&keypair);

        let result = verify_token(&token, ISSUER, &jwk_for(&keypair), 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn test_verify_token_rejects_issuer_mismatch() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss("https://other-issuer.example.com")
            .sub("user-1")
            .aud("media")
            .expires_in_secs(300)
            .sign(&keypair);

        // Key resolution happened for ISSUER; the signed iss differs.
        let result = verify_token(&token, ISSUER, &jwk_for(&keypair), 0);
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[test]
    fn test_verify_token_accepts_audience_list() {
        let keypair = TestKeypair::generate("key-1");
        let token = TokenBuilder::new()
            .iss(ISSUER)
            .sub("user-1")
            .aud_list(&["other", "media"])
            .expires_in_secs(300)
            .sign(&keypair);

        let claims = verify_token(&token, ISSUER, &jwk_for(&keypair), 0).unwrap();
        assert!(claims.aud.contains("media"));
    }

    // =========================================================================
    // TokenVerifier pipeline (stages before key resolution)
    // =========================================================================

    use crate::auth::jwks::JwksSettings;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(
            Arc::new(KeyResolver::new(JwksSettings::default())),
            "media".to_string(),
            0,
        )
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage_without_network() {
        // No issuer client exists, so failure proves no resolution ran.
        let result = verifier().verify("not-a-jwt").await;
        assert_eq!(result.unwrap_err(), AuthError::MalformedToken);
    }

    #[tokio::test]
    async fn test_verify_rejects_oversized_token() {
        let token = "a".repeat(common::jwt::MAX_JWT_SIZE_BYTES + 1);
        let result = verifier().verify(&token).await;
        assert_eq!(result.unwrap_err(), AuthError::MalformedToken);
    }

    #[tokio::test]
    async fn test_verify_rejects_alg_none_before_resolution() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","kid":"key-1"}"#.as_bytes());
        let payload_b64 = URL_SAFE_NO_PAD.encode(
            r#"{"iss":"https://issuer.example.com","sub":"user-1","aud":"media","exp":9999999999}"#
                .as_bytes(),
        );
        let token = format!("{}.{}.", header_b64, payload_b64);

        let result = verifier().verify(&token).await;
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[tokio::test]
    async fn test_verify_rejects_hs256_before_resolution() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","kid":"key-1"}"#.as_bytes());
        let payload_b64 = URL_SAFE_NO_PAD.encode(
            r#"{"iss":"https://issuer.example.com","sub":"user-1","aud":"media","exp":9999999999}"#
                .as_bytes(),
        );
        let token = format!("{}.{}.c2ln", header_b64, payload_b64);

        let result = verifier().verify(&token).await;
        assert_eq!(result.unwrap_err(), AuthError::SignatureInvalid);
    }

    #[tokio::test]
    async fn test_verify_rejects_incomplete_claims_before_resolution() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA","kid":"key-1"}"#.as_bytes());
        let payload_b64 =
            URL_SAFE_NO_PAD.encode(r#"{"sub":"user-1","aud":"media","exp":9999999999}"#.as_bytes());
        let token = format!("{}.{}.c2ln", header_b64, payload_b64);

        let result = verifier().verify(&token).await;
        assert_eq!(result.unwrap_err(), AuthError::IncompleteClaims);
    }

    #[test]
    fn test_identity_debug_redacts_sub() {
        let identity = AuthenticatedIdentity {
            sub: "user-1".to_string(),
        };
        let debug_str = format!("{:?}", identity);
        assert!(!debug_str.contains("user-1"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
