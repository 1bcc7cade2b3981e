//! Idempotency layer.
//! Mission: Lock-and-replay mutating requests keyed by a client-supplied
//! `Idempotency-Key` header, so a retried POST/PUT/DELETE never double-runs
//! (spec §4.3). Pattern grounded in a request-deduplication plugin that
//! buffers the response and deny-lists hop-by-hop headers before caching it.

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::Cache;

const LOCK_TTL: Duration = Duration::from_secs(10);
const DATA_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const REPLAY_HEADER: &str = "x-idempotency-hit";

/// Response headers never replayed back to the caller verbatim — they are
/// either hop-by-hop or recomputed per response by the framework.
const HEADER_DENY_LIST: &[&str] = &[
    "date",
    "content-length",
    "connection",
    "access-control-allow-origin",
    "access-control-allow-methods",
    "access-control-allow-headers",
];

#[derive(Serialize, Deserialize)]
struct StoredResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

pub async fn idempotency_middleware(State(cache): State<Cache>, req: Request, next: Next) -> Response {
    let Some(key) = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
    else {
        return next.run(req).await;
    };

    let lock_key = format!("idempotency:lock:{key}");
    let data_key = format!("idempotency:data:{key}");

    match cache.set_if_absent(&lock_key, "1", LOCK_TTL).await {
        Ok(true) => {}
        Ok(false) => return replay_or_conflict(&cache, &data_key).await,
        Err(err) => {
            warn!(error = %err, "idempotency lock acquisition failed, proceeding unprotected");
            return next.run(req).await;
        }
    }

    let response = next.run(req).await;
    let status = response.status();

    let (parts, body) = response.into_parts();
    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer response body for idempotency cache");
            let _ = cache.delete(&lock_key).await;
            return (parts.status, parts.headers).into_response();
        }
    };

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        let _ = cache.delete(&lock_key).await;
        return Response::from_parts(parts, Body::from(body_bytes));
    }

    let stored = StoredResponse {
        status: status.as_u16(),
        headers: filtered_headers(&parts.headers),
        body: String::from_utf8_lossy(&body_bytes).into_owned(),
    };

    // Persist off the response path: a slow cache write must never delay the
    // client, and the lock is only cleared once the data is durable.
    let cache = cache.clone();
    tokio::spawn(async move {
        if let Err(err) = cache.set_json(&data_key, &stored, DATA_TTL).await {
            warn!(error = %err, "failed to persist idempotency response");
        }
        let _ = cache.delete(&lock_key).await;
    });

    Response::from_parts(parts, Body::from(body_bytes))
}

async fn replay_or_conflict(cache: &Cache, data_key: &str) -> Response {
    match cache.get_json::<StoredResponse>(data_key).await {
        Ok(Some(stored)) => {
            let mut response = Response::builder().status(stored.status);
            if let Some(headers) = response.headers_mut() {
                for (name, value) in &stored.headers {
                    if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                        headers.insert(name, value);
                    }
                }
                headers.insert(REPLAY_HEADER, HeaderValue::from_static("true"));
            }
            response.body(Body::from(stored.body)).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Ok(None) => {
            let mut response = (StatusCode::CONFLICT, "request with this idempotency key is already in flight").into_response();
            response.headers_mut().insert("retry-after", HeaderValue::from_static("1"));
            response
        }
        Err(err) => {
            warn!(error = %err, "failed to read cached idempotency response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn filtered_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| !HEADER_DENY_LIST.contains(&name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn deny_list_strips_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("date", HeaderValue::from_static("now"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let filtered = filtered_headers(&headers);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].0, "content-type");
    }
}
