//! HTTP service, group, and rule documents.

use serde::{Deserialize, Serialize};

fn default_status_code() -> u16 {
    200
}

fn default_response_type() -> String {
    "application/json".to_string()
}

fn default_true() -> bool {
    true
}

/// A single bindable HTTP listener with its own port/prefix and a tree of
/// groups/rules. Identity is the `id`; at most one live listener exists per id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub port: u16,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub proxy_enabled: bool,
    #[serde(default)]
    pub proxy_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_prefix: Option<String>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// A named sub-prefix partition of rules within a service. Groups do not own
/// listeners; they only scope matching.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sub_prefix: String,
    #[serde(default)]
    pub children: Vec<Rule>,
}

/// One method+path matcher plus its response configuration.
///
/// `url` may contain `:name` path-parameter segments. Within a group, literal
/// urls are matched before parameterized ones; among parameterized rules,
/// first-declared order wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub headers: Vec<RequiredField>,
    #[serde(default)]
    pub params: Vec<RequiredField>,
    /// Fixed delay in milliseconds, or the lower bound when `delayMax` is set.
    #[serde(default)]
    pub delay: u64,
    /// Upper bound (exclusive) for a uniformly random delay. Ignored unless
    /// strictly greater than `delay`.
    #[serde(default)]
    pub delay_max: u64,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default = "default_response_type")]
    pub response_type: String,
    #[serde(default)]
    pub response_basic: String,
    #[serde(default)]
    pub response_advanced: String,
    /// Local file path for binary response types.
    #[serde(default)]
    pub response_file: String,
    #[serde(default)]
    pub response_headers: Vec<KeyValue>,
    #[serde(default)]
    pub expectations: Vec<Expectation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_preset_id: Option<String>,
    #[serde(default)]
    pub response_presets: Vec<ResponsePreset>,
    /// Enables data-faking template expansion for JSON basic responses.
    #[serde(default)]
    pub mockjs_enabled: bool,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            url: String::new(),
            method: "GET".to_string(),
            active: true,
            headers: Vec::new(),
            params: Vec::new(),
            delay: 0,
            delay_max: 0,
            response_mode: ResponseMode::Basic,
            response_type: default_response_type(),
            response_basic: String::new(),
            response_advanced: String::new(),
            response_file: String::new(),
            response_headers: Vec::new(),
            expectations: Vec::new(),
            active_preset_id: None,
            response_presets: Vec::new(),
            mockjs_enabled: false,
        }
    }
}

/// Response generation mode: static body vs. sandboxed script.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Basic,
    Advanced,
}

/// A header or query parameter declared on a rule. Only `required` entries
/// participate in validation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequiredField {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub required: bool,
}

/// A custom response header key/value pair.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// A conditional override of a rule's response. All conditions must hold
/// (logical AND); expectations are tried in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default = "default_response_type")]
    pub response_type: String,
    #[serde(default)]
    pub response_basic: String,
    #[serde(default)]
    pub response_advanced: String,
}

/// One typed condition evaluated against the inbound request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub source: ConditionSource,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: String,
}

/// Namespace a condition reads its left-hand value from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConditionSource {
    #[default]
    Query,
    Header,
    Body,
    PathParam,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    #[default]
    Equals,
    Contains,
    Regex,
    Exists,
    Gt,
    Lt,
}

/// A named alternative response a rule can be switched to via `activePresetId`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePreset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default = "default_response_type")]
    pub response_type: String,
    #[serde(default)]
    pub response_basic: String,
    #[serde(default)]
    pub response_advanced: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_defaults_from_sparse_document() {
        let json = r#"{"id": "r1", "url": "/ping"}"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert!(rule.active);
        assert_eq!(rule.response_mode, ResponseMode::Basic);
        assert_eq!(rule.response_type, "application/json");
        assert_eq!(rule.delay, 0);
        assert!(rule.expectations.is_empty());
    }

    #[test]
    fn condition_source_uses_camel_case() {
        let json = r#"{"source": "pathParam", "key": "id", "operator": "gt", "value": "3"}"#;
        let cond: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.source, ConditionSource::PathParam);
        assert_eq!(cond.operator, ConditionOperator::Gt);
    }

    #[test]
    fn service_round_trips_field_for_field() {
        let service = Service {
            id: "svc-1".to_string(),
            name: "Orders".to_string(),
            port: 4001,
            prefix: "/api".to_string(),
            proxy_enabled: true,
            proxy_target: "http://upstream".to_string(),
            real_protocol: Some("https".to_string()),
            real_host: Some("orders.internal".to_string()),
            real_port: Some(443),
            real_prefix: Some("/v2".to_string()),
            groups: vec![Group {
                id: "g1".to_string(),
                name: "default".to_string(),
                sub_prefix: String::new(),
                children: vec![Rule {
                    id: "r1".to_string(),
                    url: "/ping".to_string(),
                    ..Default::default()
                }],
            }],
        };

        let json = serde_json::to_string(&service).unwrap();
        let back: Service = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, service.id);
        assert_eq!(back.port, service.port);
        assert_eq!(back.proxy_target, service.proxy_target);
        assert_eq!(back.groups.len(), 1);
        assert_eq!(back.groups[0].children[0].url, "/ping");
    }
}
