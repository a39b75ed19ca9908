//! Auto-recording of proxied exchanges as new rules.
//!
//! Recording is best-effort and decoupled from the client response: it runs
//! as a detached task after the response has been relayed, reads the current
//! service snapshot, appends a synthesized rule to the first group, and
//! writes the whole document back (last-write-wins under concurrency).

use crate::matching::strip_prefix;
use crate::model::Rule;
use crate::store::ServiceStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum number of recorded rules kept in a service's first group.
pub const RECORDED_RULE_CAP: usize = 50;

const RECORDED_NAME_TAG: &str = "[recorded]";

/// Only textual upstream payloads are worth recording.
pub(crate) fn is_textual(content_type: &str) -> bool {
    let lower = content_type.to_lowercase();
    lower.contains("json") || lower.starts_with("text/")
}

pub(crate) fn record_exchange(
    store: Arc<dyn ServiceStore>,
    service_id: &str,
    method: &str,
    remainder: &str,
    content_type: &str,
    body: &str,
) {
    let mut services = match store.get_services() {
        Ok(services) => services,
        Err(e) => {
            warn!("Recording skipped, store read failed: {}", e);
            return;
        }
    };
    let Some(service) = services.iter_mut().find(|s| s.id == service_id) else {
        warn!("Recording skipped, service '{}' vanished", service_id);
        return;
    };
    let Some(group) = service.groups.first_mut() else {
        warn!(
            "Recording skipped, service '{}' has no groups",
            service_id
        );
        return;
    };

    let recorded_count = group
        .children
        .iter()
        .filter(|r| r.name.starts_with(RECORDED_NAME_TAG))
        .count();
    if recorded_count >= RECORDED_RULE_CAP {
        debug!(
            "Recording skipped, cap of {} reached for service '{}'",
            RECORDED_RULE_CAP, service_id
        );
        return;
    }

    // Store the url relative to the group so the recorded rule is matchable
    // on the next request.
    let url = strip_prefix(remainder, &group.sub_prefix).unwrap_or_else(|| remainder.to_string());
    let bare_type = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_string();

    group.children.push(Rule {
        id: uuid::Uuid::new_v4().to_string(),
        name: format!("{RECORDED_NAME_TAG} {method} {url}"),
        url,
        method: method.to_uppercase(),
        active: true,
        response_type: bare_type,
        response_basic: body.to_string(),
        ..Default::default()
    });

    if let Err(e) = store.save_services(&services) {
        // Invisible to the client by design; the exchange was already served.
        warn!("Recording persist failed for service '{}': {}", service_id, e);
    } else {
        debug!("Recorded {} {} into service '{}'", method, remainder, service_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Group, Service};
    use crate::store::FileStore;

    fn store_with_service(dir: &std::path::Path) -> Arc<dyn ServiceStore> {
        let store = FileStore::new(dir).unwrap();
        store
            .save_services(&[Service {
                id: "svc".to_string(),
                port: 4010,
                groups: vec![Group {
                    id: "g1".to_string(),
                    sub_prefix: "/v1".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }])
            .unwrap();
        Arc::new(store)
    }

    #[test]
    fn textual_detection() {
        assert!(is_textual("application/json"));
        assert!(is_textual("application/json; charset=utf-8"));
        assert!(is_textual("text/plain"));
        assert!(!is_textual("application/octet-stream"));
        assert!(!is_textual("image/png"));
    }

    #[test]
    fn records_rule_into_first_group() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_service(dir.path());

        record_exchange(
            Arc::clone(&store),
            "svc",
            "GET",
            "/v1/users/7",
            "application/json; charset=utf-8",
            r#"{"id": 7}"#,
        );

        let services = store.get_services().unwrap();
        let rules = &services[0].groups[0].children;
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        // Group sub-prefix is stripped so the rule matches on replay.
        assert_eq!(rule.url, "/users/7");
        assert_eq!(rule.method, "GET");
        assert_eq!(rule.response_type, "application/json");
        assert_eq!(rule.response_basic, r#"{"id": 7}"#);
        assert!(rule.active);
        assert!(rule.name.starts_with(RECORDED_NAME_TAG));
    }

    #[test]
    fn recording_respects_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_service(dir.path());

        for i in 0..RECORDED_RULE_CAP + 5 {
            record_exchange(
                Arc::clone(&store),
                "svc",
                "GET",
                &format!("/v1/items/{i}"),
                "application/json",
                "{}",
            );
        }

        let services = store.get_services().unwrap();
        assert_eq!(services[0].groups[0].children.len(), RECORDED_RULE_CAP);
    }

    #[test]
    fn recording_skips_service_without_groups() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store
            .save_services(&[Service {
                id: "bare".to_string(),
                port: 4011,
                ..Default::default()
            }])
            .unwrap();
        let store: Arc<dyn ServiceStore> = Arc::new(store);

        record_exchange(Arc::clone(&store), "bare", "GET", "/x", "text/plain", "hi");
        assert!(store.get_services().unwrap()[0].groups.is_empty());
    }
}
