//! JWT utilities shared across Media Gateway components.
//!
//! This module provides the pieces of token handling that must run
//! BEFORE any signature verification or network call:
//! - Size limits for DoS prevention
//! - Unverified envelope decoding (header `alg`/`kid`, payload
//!   `iss`/`sub`) used to select a signing key
//! - Clock skew constants for temporal claim validation
//! - Ed25519 public key decoding from JWK documents
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing decoded here is trusted: the envelope is only used to
//!   decide which key to fetch, and the token MUST still be verified
//!   against that key afterwards
//! - Generic error messages prevent information leakage

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Oversized tokens are rejected before base64 decoding or any
/// cryptographic operation. Typical tokens are 200-500 bytes; 8KB
/// leaves room for fat claim sets while bounding the work an attacker
/// can force with a single request.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default clock skew tolerance for `exp`/`nbf` validation.
///
/// Zero: tokens are judged against the gateway's clock exactly unless
/// a deployment opts into a tolerance via configuration.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(0);

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration from silently widening the window in
/// which expired tokens are accepted.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while decoding a token envelope.
///
/// Note: the Display strings are intentionally generic. Detailed
/// causes are logged at debug level where the error is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtParseError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not structurally a signed JWT (wrong segment count,
    /// bad base64, unparsable JSON).
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Unverified envelope
// =============================================================================

/// The untrusted header of a decoded token envelope.
#[derive(Debug, Clone)]
pub struct UnverifiedHeader {
    /// Declared signing algorithm. Used only to reject unexpected
    /// algorithm families before key resolution.
    pub alg: String,

    /// Key ID selecting which of the issuer's keys signed the token.
    /// Absent or empty values are surfaced as `None`.
    pub kid: Option<String>,
}

/// The untrusted claim fields peeked from a decoded token payload.
///
/// Only the fields needed to decide whether key resolution should run
/// at all are extracted here. Empty strings are normalized to `None`.
#[derive(Debug, Clone)]
pub struct UnverifiedClaims {
    /// Issuer URL, the base for key discovery.
    pub iss: Option<String>,

    /// Subject identifier.
    pub sub: Option<String>,
}

/// A structurally valid but cryptographically unverified token.
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    /// Decoded header fields.
    pub header: UnverifiedHeader,

    /// Peeked claim fields.
    pub claims: UnverifiedClaims,
}

/// Decode a token's envelope without verifying the signature.
///
/// Splits the compact serialization into its three segments and
/// parses the header and payload JSON. The result is used to select a
/// signing key and to fail fast on tokens that could never verify;
/// nothing in it is trusted.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - wrong segment count, invalid base64url, or
///   invalid JSON in either decoded segment
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken, JwtParseError> {
    // Size check first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtParseError::TokenTooLarge);
    }

    // Compact serialization: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtParseError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtParseError::MalformedToken)?;
    let payload_part = parts.get(1).ok_or(JwtParseError::MalformedToken)?;

    let header = decode_json_segment(header_part)?;
    let payload = decode_json_segment(payload_part)?;

    // alg is mandatory in a JWS header; a missing one is malformed.
    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtParseError::MalformedToken)?;

    let kid = non_empty_string(&header, "kid");
    let iss = non_empty_string(&payload, "iss");
    let sub = non_empty_string(&payload, "sub");

    Ok(UnverifiedToken {
        header: UnverifiedHeader { alg, kid },
        claims: UnverifiedClaims { iss, sub },
    })
}

/// Base64url-decode one envelope segment and parse it as JSON.
fn decode_json_segment(segment: &str) -> Result<serde_json::Value, JwtParseError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtParseError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtParseError::MalformedToken
    })
}

/// Extract a string field, treating empty strings and non-string
/// values as absent (defense-in-depth against `"kid": ""` and
/// `"iss": 42` style inputs).
fn non_empty_string(value: &serde_json::Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

// =============================================================================
// Key decoding
// =============================================================================

/// Decode an Ed25519 public key from a JWK `x` field (base64url).
///
/// The `x` field of an OKP (Octet Key Pair) JWK carries the raw
/// 32-byte public key in unpadded base64url.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the content is not valid
/// base64url.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================
