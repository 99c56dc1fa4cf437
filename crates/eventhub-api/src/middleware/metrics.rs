//! Metrics tracking middleware
//!
//! Records request count and latency per route template. Requests that match
//! no route share one `unmatched` label so arbitrary paths cannot create new
//! series.

use crate::metrics;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Endpoint label for requests no route matched
const UNMATCHED_ENDPOINT: &str = "unmatched";

pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = endpoint_label(&request);

    let response = next.run(request).await;

    metrics::record_http_request(
        &endpoint,
        &method,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}
