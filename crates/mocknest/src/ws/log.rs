//! Bounded interaction log kept per WebSocket server.

use serde::Serialize;
use std::collections::VecDeque;

/// Fixed per-server log capacity; the oldest entry is evicted first.
pub const WS_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogDirection {
    /// Client-to-server text message.
    Inbound,
    /// Server-to-client text message.
    Outbound,
    /// Connection lifecycle and error events.
    System,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub direction: LogDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub message: String,
}

/// Ring buffer of the most recent interaction log entries.
#[derive(Debug)]
pub struct InteractionLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl InteractionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, direction: LogDirection, client_id: Option<String>, message: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp: chrono::Utc::now().timestamp_millis(),
            direction,
            client_id,
            message,
        });
    }

    /// Entries newer than `since` (exclusive), for incremental polling.
    pub fn entries_since(&self, since: Option<i64>) -> Vec<LogEntry> {
        match since {
            Some(ts) => self
                .entries
                .iter()
                .filter(|e| e.timestamp > ts)
                .cloned()
                .collect(),
            None => self.entries.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InteractionLog {
    fn default() -> Self {
        Self::new(WS_LOG_CAPACITY)
    }
}
