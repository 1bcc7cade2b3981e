//! Request logging middleware.
//!
//! Logs every HTTP request with method, path, status code, and latency, and
//! assigns the per-request id that the error envelope (spec §7) surfaces to
//! callers on 5xx responses.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn, Span};
use uuid::Uuid;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// The request id for the task currently handling a request, or a
/// placeholder when called outside request scope (e.g. a unit test).
pub fn current_request_id() -> String {
    REQUEST_ID.try_with(|id| id.clone()).unwrap_or_else(|_| "-".to_string())
}

/// Middleware that logs HTTP requests with timing information and scopes a
/// request id for the duration of the handler.
///
/// Logs at INFO level for successful requests, WARN level for 5xx.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();

    // Skip logging for health checks to reduce noise
    if path == "/health" {
        return next.run(request).await;
    }

    let request_id = Uuid::new_v4().to_string();
    let start = Instant::now();

    // Create a span for this request
    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let id_for_scope = request_id.clone();
    REQUEST_ID
        .scope(id_for_scope, async move {
            let _guard = span.enter();

            let mut response = next.run(request).await;
            if let Ok(value) = request_id.parse() {
                response.headers_mut().insert("x-request-id", value);
            }

            let latency = start.elapsed();
            let status = response.status().as_u16();

            Span::current().record("status", status);
            Span::current().record("latency_ms", latency.as_millis() as u64);

            if status >= 500 {
                warn!(
                    method = %method,
                    path = %path,
                    status = status,
                    latency_ms = latency.as_millis(),
                    "Request failed (5xx)"
                );
            } else if status >= 400 {
                info!(
                    method = %method,
                    path = %path,
                    status = status,
                    latency_ms = latency.as_millis(),
                    "Request completed (4xx)"
                );
            } else {
                info!(
                    method = %method,
                    path = %path,
                    status = status,
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            }

            response
        })
        .await
}
