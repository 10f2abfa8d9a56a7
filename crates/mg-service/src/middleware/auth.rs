//! Authentication gate for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, verifies
//! it through [`TokenVerifier`], and injects the resulting identity
//! into request extensions. Every failure becomes the same uniform 401
//! via [`GatewayError::Unauthorized`].

use crate::auth::{AuthError, TokenVerifier};
use crate::errors::GatewayError;
use crate::observability::metrics::record_auth_outcome;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Header carrying the verified subject to the upstream service.
///
/// Stripped from every inbound request before being set, so a client
/// can never smuggle its own value through the gate.
pub const VERIFIED_SUBJECT_HEADER: &str = "x-verified-subject";

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier with per-issuer key resolution.
    pub verifier: Arc<TokenVerifier>,
}

/// Authentication middleware that verifies bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// The scheme is matched case-insensitively and surrounding whitespace
/// is tolerated.
///
/// # Response
///
/// - Returns 401 Unauthorized with WWW-Authenticate header if the
///   token is missing or fails verification, with an identical body
///   for every failure
/// - Continues to the next handler with
///   [`AuthenticatedIdentity`](crate::auth::AuthenticatedIdentity) in
///   extensions and the verified subject header set
#[instrument(skip(state, req, next), name = "mg.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    // A token missing entirely never reaches the verifier, so the
    // outcome is recorded and mapped here for every path.
    let result = match bearer_token(&req) {
        Some(token) => state.verifier.verify(token).await,
        None => {
            tracing::debug!(target: "mg.middleware.auth", "Missing or non-Bearer Authorization header");
            Err(AuthError::MissingToken)
        }
    };

    let identity = match result {
        Ok(identity) => identity,
        Err(error) => {
            record_auth_outcome(error.category());
            return Err(GatewayError::Unauthorized(error.category().to_string()));
        }
    };

    // Strip any client-supplied copy of the header, then set the
    // verified value. A subject that cannot be carried as a header
    // value is a rejection, so the outcome is only recorded as
    // accepted once the header is in place.
    req.headers_mut().remove(VERIFIED_SUBJECT_HEADER);
    let subject_value = HeaderValue::from_str(&identity.sub).map_err(|_| {
        tracing::error!(target: "mg.middleware.auth", "Verified subject not encodable as header value");
        let category = AuthError::Internal(String::new()).category();
        record_auth_outcome(category);
        GatewayError::Unauthorized(category.to_string())
    })?;
    req.headers_mut()
        .insert(VERIFIED_SUBJECT_HEADER, subject_value);

    record_auth_outcome("accepted");

    // Store the identity in request extensions for downstream handlers
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Pull the bearer token out of the Authorization header.
///
/// Returns `None` when the header is absent, is not valid UTF-8, uses
/// a different scheme, or carries an empty token.
fn bearer_token(req: &Request) -> Option<&str> {
    let header = req.headers().get("authorization")?.to_str().ok()?;
    extract_bearer(header)
}

/// Parse `Bearer <token>` with a case-insensitive scheme.
fn extract_bearer(header: &str) -> Option<&str> {
    let trimmed = header.trim();
    let (scheme, rest) = trimmed.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
