//! Dynamically started HTTP mock listeners.

mod handler;
mod manager;
mod probe;
mod proxy;
mod recording;

pub use manager::{HttpMockManager, ServiceStatus};
pub use probe::port_available;
pub use recording::RECORDED_RULE_CAP;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// Build a response with a plain body and no extra headers.
pub(crate) fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

/// Build a JSON error body: `{"error": ...}` with optional `details`.
pub(crate) fn error_response(
    status: StatusCode,
    error: &str,
    details: Option<&[String]>,
) -> Response<Full<Bytes>> {
    let body = match details {
        Some(details) => serde_json::json!({ "error": error, "details": details }),
        None => serde_json::json!({ "error": error }),
    };
    let json = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
    let mut response = build_response(status, json);
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    apply_cors(&mut response);
    response
}

/// Permissive CORS headers, applied to every mock response so browser-based
/// callers can hit the mock directly.
pub(crate) fn apply_cors(response: &mut Response<Full<Bytes>>) {
    let headers = response.headers_mut();
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        hyper::header::HeaderValue::from_static("*"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_METHODS,
        hyper::header::HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_HEADERS,
        hyper::header::HeaderValue::from_static("*"),
    );
}
