//! Health check handler.
//!
//! Provides the liveness probe endpoint.

use tracing::instrument;

/// Handler for GET /health
///
/// Pure liveness: the gateway holds no stateful backends, so a
/// response at all means the process is serving. Deliberately public
/// and outside the authentication gate.
#[instrument(skip_all, name = "mg.health.check")]
pub async fn health_check() -> &'static str {
    "OK"
}
