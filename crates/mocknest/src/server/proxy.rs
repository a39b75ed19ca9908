//! Proxy fallback to the configured real backend.

use crate::model::Service;
use anyhow::{Context, Result};
use bytes::Bytes;
use hyper::Method;
use std::time::Duration;

/// Global HTTP client for proxy requests.
static HTTP_CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();

fn get_http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client")
    })
}

/// Upstream response relayed byte-for-byte to the client.
pub(crate) struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: String,
    pub body: Bytes,
}

/// Forward the unmatched request to the service's proxy target. The remainder
/// path (after service-prefix stripping) is appended to the target; inbound
/// headers are forwarded verbatim except Host; the body is forwarded for
/// every method that can carry one.
pub(crate) async fn forward(
    service: &Service,
    method: &Method,
    remainder: &str,
    query: Option<&str>,
    headers: &hyper::HeaderMap,
    body: &str,
) -> Result<UpstreamResponse> {
    let target = service.proxy_target.trim().trim_end_matches('/');
    let url = format!(
        "{}{}{}",
        target,
        remainder,
        query.map(|q| format!("?{q}")).unwrap_or_default()
    );

    let client = get_http_client();
    let mut request = match *method {
        Method::GET => client.get(&url),
        Method::POST => client.post(&url),
        Method::PUT => client.put(&url),
        Method::DELETE => client.delete(&url),
        Method::PATCH => client.patch(&url),
        Method::HEAD => client.head(&url),
        _ => client.get(&url),
    };

    for (key, value) in headers {
        let lower = key.as_str().to_lowercase();
        if lower != "host" && lower != "content-length" {
            if let Ok(value) = value.to_str() {
                request = request.header(key.as_str(), value);
            }
        }
    }

    if *method != Method::GET && *method != Method::HEAD && !body.is_empty() {
        request = request.body(body.to_string());
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to reach upstream {url}"))?;

    let status = response.status().as_u16();
    let response_headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let content_type = response_headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let body = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read upstream body from {url}"))?;

    Ok(UpstreamResponse {
        status,
        headers: response_headers,
        content_type,
        body,
    })
}
