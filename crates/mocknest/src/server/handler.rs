//! Catch-all request handler running the full resolution pipeline.
//!
//! There is deliberately no framework router here: prefix and path matching
//! are done manually so the service prefix, group sub-prefixes, and `:param`
//! layering compose exactly as configured.

use super::manager::RunningService;
use super::proxy;
use super::recording;
use super::{apply_cors, build_response, error_response};
use crate::matching::{find_matching_rule, strip_prefix};
use crate::model::{Rule, Service};
use crate::request::RequestView;
use crate::resolver::{self, RenderedResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use rand::Rng;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) async fn handle_service_request(
    req: Request<Incoming>,
    state: Arc<RunningService>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path().to_string();
    let query = uri.query().map(str::to_string);
    let headers = req.headers().clone();

    // CORS preflight is answered by the listener itself, before any matching.
    if method == Method::OPTIONS {
        let mut response = build_response(StatusCode::NO_CONTENT, Bytes::new());
        apply_cors(&mut response);
        return Ok(response);
    }

    // Root path is a liveness probe and participates in no matching.
    if path == "/" {
        let mut response = build_response(
            StatusCode::OK,
            format!("mocknest service '{}' is running", state.service_id),
        );
        apply_cors(&mut response);
        return Ok(response);
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).into_owned(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            String::new()
        }
    };

    // Service-level prefix stripping, against the snapshot captured at start.
    let prefix = state.prefix.read().clone();
    let Some(remainder) = strip_prefix(&path, &prefix) else {
        return Ok(error_response(
            StatusCode::NOT_FOUND,
            &format!("Path does not match service prefix '{prefix}'"),
            None,
        ));
    };

    // Rule content is re-read from the store on every request so edits apply
    // without a restart.
    let services = match state.store.get_services() {
        Ok(services) => services,
        Err(e) => {
            warn!("Failed to load services from store: {}", e);
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load service configuration",
                None,
            ));
        }
    };
    let Some(service) = services.into_iter().find(|s| s.id == state.service_id) else {
        return Ok(error_response(
            StatusCode::NOT_FOUND,
            &format!("Service '{}' not found", state.service_id),
            None,
        ));
    };

    // Groups are tried strictly in declaration order; a path that fails one
    // group's sub-prefix may still succeed against another.
    let mut matched: Option<(Rule, String, HashMap<String, String>)> = None;
    for group in &service.groups {
        let Some(group_remainder) = strip_prefix(&remainder, &group.sub_prefix) else {
            continue;
        };
        if let Some((rule, params)) =
            find_matching_rule(&group.children, method.as_str(), &group_remainder)
        {
            matched = Some((rule.clone(), group_remainder, params));
            break;
        }
    }

    let Some((rule, rule_path, params)) = matched else {
        return Ok(handle_unmatched(&state, &service, &method, &remainder, &query, &headers, body).await);
    };

    let mut view = RequestView::new(method.as_str(), &rule_path, query.as_deref(), &headers, &body);
    view.path_params = params;

    // Validation aggregates every missing field; it never short-circuits.
    let missing = validate_required_fields(&rule, &view);
    if !missing.is_empty() {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "Validation failed",
            Some(&missing),
        ));
    }

    // Delay simulation happens after validation, before response headers.
    // The random draw is taken before the await point.
    let delay_ms = if rule.delay_max > rule.delay {
        rand::thread_rng().gen_range(rule.delay..rule.delay_max)
    } else {
        rule.delay
    };
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    let descriptor = resolver::resolve_descriptor(&rule, &view);
    let rendered = match resolver::render(&descriptor, &rule, &view).await {
        Ok(rendered) => rendered,
        Err(e) => {
            debug!("Render error for rule '{}': {}", rule.id, e);
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Ok(error_response(status, &e.to_string(), None));
        }
    };

    Ok(write_rendered(&rule, rendered))
}

/// Build the final response: rule-declared headers first, then content
/// headers, then the body.
fn write_rendered(rule: &Rule, rendered: RenderedResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(
        StatusCode::from_u16(rendered.status_code).unwrap_or(StatusCode::OK),
    );

    for header in &rule.response_headers {
        if !header.key.is_empty() {
            builder = builder.header(&header.key, &header.value);
        }
    }
    builder = builder.header(hyper::header::CONTENT_TYPE, &rendered.content_type);
    if let Some(ref disposition) = rendered.content_disposition {
        builder = builder.header(hyper::header::CONTENT_DISPOSITION, disposition);
    }

    let mut response = builder
        .body(Full::new(rendered.body))
        .unwrap_or_else(|_| build_response(StatusCode::INTERNAL_SERVER_ERROR, "Response build error"));
    apply_cors(&mut response);
    response
}

/// Every required header and query parameter declared on the rule must be
/// present; each missing entry is reported in the details list.
fn validate_required_fields(rule: &Rule, view: &RequestView) -> Vec<String> {
    let mut missing = Vec::new();
    for header in rule.headers.iter().filter(|h| h.required) {
        if view.header(&header.key).is_none() {
            missing.push(format!("Missing header: {}", header.key));
        }
    }
    for param in rule.params.iter().filter(|p| p.required) {
        if !view.query.contains_key(&param.key) {
            missing.push(format!("Missing parameter: {}", param.key));
        }
    }
    missing
}

/// No rule matched: either proxy to the real backend or answer 404.
async fn handle_unmatched(
    state: &Arc<RunningService>,
    service: &Service,
    method: &Method,
    remainder: &str,
    query: &Option<String>,
    headers: &hyper::HeaderMap,
    body: String,
) -> Response<Full<Bytes>> {
    if !service.proxy_enabled || service.proxy_target.trim().is_empty() {
        return error_response(
            StatusCode::NOT_FOUND,
            &format!("No rule matched {} {}", method, remainder),
            None,
        );
    }

    match proxy::forward(service, method, remainder, query.as_deref(), headers, &body).await {
        Ok(upstream) => {
            // Auto-record the exchange after the client response is on its
            // way. Recording is best-effort; failures stay invisible here.
            if recording::is_textual(&upstream.content_type) {
                let store = Arc::clone(&state.store);
                let service_id = state.service_id.to_string();
                let method = method.to_string();
                let path = remainder.to_string();
                let content_type = upstream.content_type.clone();
                let body_text = String::from_utf8_lossy(&upstream.body).into_owned();
                tokio::spawn(async move {
                    recording::record_exchange(store, &service_id, &method, &path, &content_type, &body_text);
                });
            }

            let mut builder = Response::builder().status(
                StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY),
            );
            for (key, value) in &upstream.headers {
                // Hop-by-hop headers are not relayed.
                let lower = key.to_lowercase();
                if lower != "transfer-encoding" && lower != "connection" && lower != "keep-alive" {
                    builder = builder.header(key, value);
                }
            }
            builder
                .body(Full::new(upstream.body))
                .unwrap_or_else(|_| build_response(StatusCode::BAD_GATEWAY, "Upstream response error"))
        }
        Err(e) => {
            warn!("Proxy request failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, &format!("Proxy error: {e}"), None)
        }
    }
}
