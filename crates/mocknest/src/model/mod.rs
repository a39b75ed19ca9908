//! Document model for mock services and WebSocket servers.
//!
//! These types mirror the documents persisted by the external editor. They are
//! deserialized fresh from the store on every request, so every field carries a
//! serde default to tolerate partially filled documents.

mod http;
mod ws;

pub use http::{
    Condition, ConditionOperator, ConditionSource, Expectation, Group, KeyValue, RequiredField,
    ResponseMode, ResponsePreset, Rule, Service,
};
pub use ws::{WsMatchType, WsRule, WsServerConfig};
