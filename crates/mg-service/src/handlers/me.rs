//! Current principal handler.
//!
//! Returns the identity the authentication gate verified for this
//! request.

use crate::auth::AuthenticatedIdentity;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for the `/api/v1/me` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Subject (principal identifier) from the verified token.
    pub sub: String,
}

/// Handler for GET /api/v1/me
///
/// Requires valid authentication via the auth middleware; the identity
/// arrives through request extensions.
///
/// ## Response
///
/// Returns 200 OK with the verified subject:
///
/// ```json
/// {
///   "sub": "user-abc123"
/// }
/// ```
#[instrument(skip_all, name = "mg.handlers.me")]
pub async fn get_me(Extension(identity): Extension<AuthenticatedIdentity>) -> Json<MeResponse> {
    tracing::debug!(target: "mg.handlers.me", "Returning verified identity");

    Json(MeResponse { sub: identity.sub })
}
