//! Media Gateway error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Every authentication failure maps to the same 401 body: the client
//! must not be able to distinguish "bad signature" from "unknown
//! issuer" (that distinction would hand an attacker a verification
//! oracle). The real failure category is logged server-side only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Generic message returned for every authentication failure.
pub const GENERIC_AUTH_MESSAGE: &str = "The access token is invalid or expired";

/// Media Gateway error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 (all authentication failures, uniformly)
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request failed authentication. The carried string is the
    /// internal failure category; it is logged, never sent.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unexpected defect outside the authentication path.
    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthorized(_) => 401,
            GatewayError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::Unauthorized(category) => {
                // Log the real category server-side, return the
                // uniform message to the client.
                tracing::debug!(target: "mg.auth", category = %category, "Request rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    GENERIC_AUTH_MESSAGE.to_string(),
                )
            }
            GatewayError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"media-gateway-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_unauthorized() {
        let error = GatewayError::Unauthorized("signature_invalid".to_string());
        assert_eq!(format!("{}", error), "Unauthorized: signature_invalid");
    }

    #[test]
    fn test_display_internal() {
        let error = GatewayError::Internal;
        assert_eq!(format!("{}", error), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GatewayError::Unauthorized("test".to_string()).status_code(),
            401
        );
        assert_eq!(GatewayError::Internal.status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_unauthorized_is_uniform() {
        // Different internal categories must produce identical bodies.
        let mut bodies = Vec::new();
        for category in ["missing_token", "signature_invalid", "key_resolution"] {
            let response = GatewayError::Unauthorized(category.to_string()).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let www_auth = response.headers().get("WWW-Authenticate");
            assert!(www_auth.is_some(), "401 should carry WWW-Authenticate");
            let www_auth_str = www_auth.unwrap().to_str().unwrap();
            assert!(www_auth_str.contains("Bearer realm=\"media-gateway-api\""));

            bodies.push(read_body_json(response.into_body()).await);
        }

        for body in &bodies {
            assert_eq!(body["error"]["code"], "INVALID_TOKEN");
            assert_eq!(body["error"]["message"], GENERIC_AUTH_MESSAGE);
            assert_eq!(body, bodies.first().unwrap());
        }
    }

    #[tokio::test]
    async fn test_into_response_unauthorized_leaks_no_category() {
        let response =
            GatewayError::Unauthorized("key_resolution: issuer unreachable".to_string())
                .into_response();

        let body_json = read_body_json(response.into_body()).await;
        let rendered = body_json.to_string();
        assert!(!rendered.contains("key_resolution"));
        assert!(!rendered.contains("issuer unreachable"));
    }

    #[tokio::test]
    async fn test_into_response_internal() {
        let error = GatewayError::Internal;
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body_json["error"]["message"], "An internal error occurred");
    }
}
