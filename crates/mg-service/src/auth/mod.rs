//! Token verification and signing-key resolution.
//!
//! This is the security boundary of the gateway. The flow is
//! Gate → Verifier → Resolver → remote key-set fetch:
//!
//! - [`resolver::KeyResolver`] maps `(issuer, kid)` to a public key,
//!   caching one JWKS client per issuer
//! - [`verifier::TokenVerifier`] turns an untrusted bearer token into
//!   either an [`AuthenticatedIdentity`] or an [`AuthError`]
//! - the middleware gate (`crate::middleware::auth`) sits at the
//!   request boundary and converts any failure into a uniform 401

pub mod claims;
pub mod jwks;
pub mod resolver;
pub mod verifier;

pub use claims::{Audience, Claims};
pub use jwks::JwksClient;
pub use resolver::KeyResolver;
pub use verifier::{AuthenticatedIdentity, TokenVerifier};

use thiserror::Error;

/// Rejection taxonomy for the authentication core.
///
/// Every variant renders the same client-facing message; the variant
/// itself (via [`AuthError::category`]) is for server-side logs and
/// metrics only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization: Bearer <token>` header on the request.
    #[error("The access token is invalid or expired")]
    MissingToken,

    /// Token is not structurally a signed JWT (or is oversized).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Decodable token missing `iss`, `sub`, or a header `kid`.
    /// Checked before any network call so claim-less tokens cannot
    /// drive traffic to key-set endpoints.
    #[error("The access token is invalid or expired")]
    IncompleteClaims,

    /// The issuer's key set was unreachable, malformed, rate-limited,
    /// or did not contain the requested key ID.
    #[error("The access token is invalid or expired")]
    KeyResolution(String),

    /// Signature verification failed: bad signature, wrong algorithm,
    /// issuer mismatch, expired, or not yet valid.
    #[error("The access token is invalid or expired")]
    SignatureInvalid,

    /// Audience claim does not contain the required audience.
    #[error("The access token is invalid or expired")]
    AudienceRejected,

    /// Unexpected defect inside the verification path. Converted to
    /// the same rejection as every other failure at the gate.
    #[error("The access token is invalid or expired")]
    Internal(String),
}

impl AuthError {
    /// Stable category tag for logs and metrics.
    ///
    /// Bounded set of values; safe to use as a metric label.
    pub fn category(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::IncompleteClaims => "incomplete_claims",
            AuthError::KeyResolution(_) => "key_resolution",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::AudienceRejected => "audience_rejected",
            AuthError::Internal(_) => "internal",
        }
    }
}
