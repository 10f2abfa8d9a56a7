//! Outermost middleware feeding the `mg_http_requests_total` counter
//! and `mg_http_request_duration_seconds` histogram.
//!
//! Sits outside the whole router stack so every response leaving the
//! gateway is counted, including ones produced before a handler runs:
//! the authentication gate's uniform 401s, framework 404/405s, and
//! request-timeout responses. Paths are normalized downstream in
//! `observability::metrics` to keep label cardinality bounded.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Records method, path, status code and latency for every response.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}
