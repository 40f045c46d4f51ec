use crate::metrics_defs::{REQUEST_DURATION, RESPONSE_STATUS};
use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use shared::{counter, histogram};
use std::time::Instant;

/// Records latency and status per matched route.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    histogram!(REQUEST_DURATION, "route" => route.clone())
        .record(started.elapsed().as_secs_f64());
    counter!(RESPONSE_STATUS, "route" => route, "status" => status).increment(1);
    response
}
