//! Mock token issuer serving a JWKS endpoint.
//!
//! Wraps a wiremock server that publishes key sets at the well-known
//! JWKS path. Tests use it as the `iss` value in tokens so the
//! gateway's key resolution fetches from it.

use crate::token_builders::TestKeypair;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Well-known path the gateway fetches key sets from.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A fake issuer backed by a wiremock server.
pub struct MockIssuer {
    server: MockServer,
}

impl MockIssuer {
    /// Start a mock issuer with no keys published yet.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// The issuer URL, suitable for the `iss` claim.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Publish the given keypairs' public halves as the JWKS document.
    ///
    /// Replaces any previously published key set, so this also models
    /// key rotation. Request counts recorded so far are cleared.
    pub async fn serve_keys(&self, keypairs: &[&TestKeypair]) {
        self.serve_jwks_response(self.jwks_template(keypairs)).await;
    }

    /// Publish keys but delay every JWKS response by `delay`.
    pub async fn serve_keys_with_delay(&self, keypairs: &[&TestKeypair], delay: Duration) {
        self.serve_jwks_response(self.jwks_template(keypairs).set_delay(delay))
            .await;
    }

    /// Respond to JWKS fetches with the given HTTP status and no body.
    pub async fn serve_error(&self, status: u16) {
        self.serve_jwks_response(ResponseTemplate::new(status)).await;
    }

    /// Number of JWKS fetches received since keys were last published.
    pub async fn jwks_request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == JWKS_PATH)
            .count()
    }

    fn jwks_template(&self, keypairs: &[&TestKeypair]) -> ResponseTemplate {
        let keys: Vec<serde_json::Value> =
            keypairs.iter().map(|keypair| keypair.jwk_json()).collect();
        ResponseTemplate::new(200).set_body_json(json!({ "keys": keys }))
    }

    async fn serve_jwks_response(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}
