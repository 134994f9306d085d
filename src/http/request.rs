//! Request handling helpers.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and echo it on responses
//! - Extract the host a request was originally addressed to
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Behind proxies the first `X-Forwarded-Host` value is the farthest
//!   host; `Host` is only used without it

use axum::http::{header, HeaderMap, HeaderName};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Layer assigning an `x-request-id` to requests that carry none.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// The host the client addressed, port included when given.
pub fn farthest_host(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get(X_FORWARDED_HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|h| !h.is_empty())
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_host_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("127.0.0.1:8081"));
        assert_eq!(farthest_host(&headers).as_deref(), Some("127.0.0.1:8081"));

        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("www.example.com, proxy.internal"));
        assert_eq!(farthest_host(&headers).as_deref(), Some("www.example.com"));
    }

    #[test]
    fn test_no_host() {
        assert_eq!(farthest_host(&HeaderMap::new()), None);
    }
}
