//! Dynamically started WebSocket mock listeners.

mod log;
mod manager;

pub use log::{InteractionLog, LogDirection, LogEntry, WS_LOG_CAPACITY};
pub use manager::{ClientInfo, WsMockManager, WsStatus};
