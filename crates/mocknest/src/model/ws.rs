//! WebSocket server and message-rule documents.

use serde::{Deserialize, Serialize};

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_true() -> bool {
    true
}

/// One configurable WebSocket mock server bound to its own port/path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WsServerConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub port: u16,
    #[serde(default = "default_ws_path")]
    pub path: String,
    /// Sent to every client immediately after the upgrade completes, if set.
    #[serde(default)]
    pub on_connect_message: String,
    #[serde(default)]
    pub rules: Vec<WsRule>,
}

/// Message-matching rule, scanned in declaration order. `any` always matches
/// and is conventionally declared last, but that is not enforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsRule {
    #[serde(default)]
    pub match_type: WsMatchType,
    #[serde(default)]
    pub match_pattern: String,
    #[serde(default)]
    pub delay: u64,
    #[serde(default)]
    pub response_mode: super::ResponseMode,
    #[serde(default)]
    pub response_basic: String,
    #[serde(default)]
    pub response_advanced: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Default for WsRule {
    fn default() -> Self {
        Self {
            match_type: WsMatchType::Any,
            match_pattern: String::new(),
            delay: 0,
            response_mode: super::ResponseMode::Basic,
            response_basic: String::new(),
            response_advanced: String::new(),
            active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WsMatchType {
    Exact,
    Contains,
    Regex,
    #[default]
    Any,
}

impl WsServerConfig {
    /// The example configuration seeded on first read of an empty store.
    pub fn seeded_example() -> Self {
        Self {
            id: "ws-example".to_string(),
            name: "Echo example".to_string(),
            port: 9101,
            path: default_ws_path(),
            on_connect_message: "connected".to_string(),
            rules: vec![
                WsRule {
                    match_type: WsMatchType::Exact,
                    match_pattern: "ping".to_string(),
                    response_basic: "pong".to_string(),
                    ..Default::default()
                },
                WsRule {
                    match_type: WsMatchType::Any,
                    response_basic: "default".to_string(),
                    ..Default::default()
                },
            ],
        }
    }
}
