//! Lifecycle and message handling for WebSocket mock servers.
//!
//! Each configured server binds one upgrade listener on its own port/path.
//! Rules are re-read from the store on every inbound message, so edits apply
//! without a restart, mirroring the HTTP pipeline's live-read policy.

use super::log::{InteractionLog, LogDirection, LogEntry};
use crate::error::LifecycleError;
use crate::matching::strip_prefix;
use crate::model::{ResponseMode, WsMatchType, WsRule};
use crate::scripting;
use crate::server::port_available;
use crate::store::ServiceStore;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// A connected client as exposed to administrative callers.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub id: String,
    pub ip: String,
    /// Milliseconds since the Unix epoch.
    pub connected_at: i64,
}

/// Snapshot of one running WebSocket server, exposed by `status()`.
#[derive(Debug, Clone)]
pub struct WsStatus {
    pub running: bool,
    pub port: u16,
    pub path: String,
    pub client_count: usize,
}

struct WsClient {
    info: ClientInfo,
    sender: mpsc::UnboundedSender<Message>,
}

struct RunningWsServer {
    config_id: String,
    port: u16,
    path: String,
    clients: RwLock<HashMap<String, WsClient>>,
    log: Mutex<InteractionLog>,
    shutdown_tx: broadcast::Sender<()>,
    store: Arc<dyn ServiceStore>,
}

impl RunningWsServer {
    fn log_event(&self, direction: LogDirection, client_id: Option<&str>, message: impl Into<String>) {
        self.log
            .lock()
            .push(direction, client_id.map(str::to_string), message.into());
    }
}

/// Owns the registry of live WebSocket mock listeners.
pub struct WsMockManager {
    servers: RwLock<HashMap<String, Arc<RunningWsServer>>>,
    store: Arc<dyn ServiceStore>,
}

impl WsMockManager {
    pub fn new(store: Arc<dyn ServiceStore>) -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Start the listener for a configured server. Idempotent: starting an
    /// already-running server is a no-op success.
    pub async fn start(&self, config_id: &str) -> Result<(), LifecycleError> {
        if self.servers.read().contains_key(config_id) {
            debug!("WebSocket server '{}' already running", config_id);
            return Ok(());
        }

        let configs = self.store.get_ws_servers()?;
        let config = configs
            .into_iter()
            .find(|c| c.id == config_id)
            .ok_or_else(|| LifecycleError::WsServerNotFound(config_id.to_string()))?;

        if !port_available(config.port) {
            return Err(LifecycleError::PortInUse(config.port));
        }
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .map_err(|e| LifecycleError::BindError(config.port, e.to_string()))?;
        info!(
            "WebSocket server '{}' bound to 0.0.0.0:{}{}",
            config_id, config.port, config.path
        );

        let (shutdown_tx, _) = broadcast::channel(1);
        let server = Arc::new(RunningWsServer {
            config_id: config_id.to_string(),
            port: config.port,
            path: config.path.clone(),
            clients: RwLock::new(HashMap::new()),
            log: Mutex::new(InteractionLog::default()),
            shutdown_tx: shutdown_tx.clone(),
            store: Arc::clone(&self.store),
        });

        let accept_server = Arc::clone(&server);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let port = config.port;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let server = Arc::clone(&accept_server);
                                tokio::spawn(async move {
                                    handle_connection(server, stream, addr).await;
                                });
                            }
                            Err(e) => {
                                warn!("WebSocket accept error on port {}: {}", port, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("WebSocket server on port {} shutting down", port);
                        break;
                    }
                }
            }
        });

        self.servers
            .write()
            .insert(config_id.to_string(), server);
        Ok(())
    }

    /// Stop a server's listener and drop all live clients. Returns whether
    /// one was running.
    pub fn stop(&self, config_id: &str) -> bool {
        let removed = self.servers.write().remove(config_id);
        match removed {
            Some(server) => {
                let _ = server.shutdown_tx.send(());
                // Dropping senders ends each connection's writer task.
                server.clients.write().clear();
                info!("WebSocket server '{}' stopped", config_id);
                true
            }
            None => false,
        }
    }

    /// Send a text message to one connected client.
    pub fn send_to(
        &self,
        config_id: &str,
        client_id: &str,
        text: &str,
    ) -> Result<(), LifecycleError> {
        let server = self.running(config_id)?;
        let clients = server.clients.read();
        let client = clients
            .get(client_id)
            .ok_or_else(|| LifecycleError::ClientNotConnected(client_id.to_string()))?;
        let _ = client.sender.send(Message::Text(text.to_string()));
        drop(clients);
        server.log_event(LogDirection::Outbound, Some(client_id), text);
        Ok(())
    }

    /// Broadcast a text message to every connected client. Returns the number
    /// of clients addressed.
    pub fn broadcast(&self, config_id: &str, text: &str) -> Result<usize, LifecycleError> {
        let server = self.running(config_id)?;
        let clients = server.clients.read();
        let count = clients.len();
        for client in clients.values() {
            let _ = client.sender.send(Message::Text(text.to_string()));
        }
        drop(clients);
        server.log_event(
            LogDirection::Outbound,
            None,
            format!("[broadcast to {count}] {text}"),
        );
        Ok(count)
    }

    /// Close one client's connection.
    pub fn disconnect(&self, config_id: &str, client_id: &str) -> Result<(), LifecycleError> {
        let server = self.running(config_id)?;
        let clients = server.clients.read();
        let client = clients
            .get(client_id)
            .ok_or_else(|| LifecycleError::ClientNotConnected(client_id.to_string()))?;
        let _ = client.sender.send(Message::Close(None));
        drop(clients);
        server.log_event(LogDirection::System, Some(client_id), "Disconnected by operator");
        Ok(())
    }

    /// Interaction log entries, optionally filtered to those newer than
    /// `since` (epoch milliseconds).
    pub fn logs(&self, config_id: &str, since: Option<i64>) -> Result<Vec<LogEntry>, LifecycleError> {
        let server = self.running(config_id)?;
        let entries = server.log.lock().entries_since(since);
        Ok(entries)
    }

    /// Connected clients of one running server.
    pub fn clients(&self, config_id: &str) -> Result<Vec<ClientInfo>, LifecycleError> {
        let server = self.running(config_id)?;
        let clients = server.clients.read();
        Ok(clients.values().map(|c| c.info.clone()).collect())
    }

    /// Snapshot of all running servers.
    pub fn status(&self) -> HashMap<String, WsStatus> {
        self.servers
            .read()
            .iter()
            .map(|(id, server)| {
                (
                    id.clone(),
                    WsStatus {
                        running: true,
                        port: server.port,
                        path: server.path.clone(),
                        client_count: server.clients.read().len(),
                    },
                )
            })
            .collect()
    }

    /// Stop every listener.
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.servers.read().keys().cloned().collect();
        for id in ids {
            self.stop(&id);
        }
    }

    fn running(&self, config_id: &str) -> Result<Arc<RunningWsServer>, LifecycleError> {
        self.servers
            .read()
            .get(config_id)
            .cloned()
            .ok_or_else(|| LifecycleError::WsServerNotRunning(config_id.to_string()))
    }
}

async fn handle_connection(server: Arc<RunningWsServer>, stream: TcpStream, addr: SocketAddr) {
    // Upgrade with path validation: wrong paths are rejected with a 404
    // during the handshake.
    let expected_path = server.path.clone();
    let callback = |req: &Request, response: Response| {
        let path = req.uri().path();
        if strip_prefix(path, &expected_path) == Some("/".to_string()) {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(None);
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!("WebSocket handshake failed from {}: {}", addr, e);
            return;
        }
    };

    let client_id = uuid::Uuid::new_v4().to_string();
    let (mut sink, mut reader) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: the only owner of the sink. A close frame ends it.
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() {
                break;
            }
            if is_close {
                break;
            }
        }
    });

    server.clients.write().insert(
        client_id.clone(),
        WsClient {
            info: ClientInfo {
                id: client_id.clone(),
                ip: addr.ip().to_string(),
                connected_at: chrono::Utc::now().timestamp_millis(),
            },
            sender: tx.clone(),
        },
    );
    server.log_event(
        LogDirection::System,
        Some(&client_id),
        format!("Client connected from {}", addr.ip()),
    );
    info!(
        "WebSocket client {} connected to '{}' from {}",
        client_id, server.config_id, addr
    );

    // Greeting, if configured, goes out before any inbound traffic.
    if let Some(greeting) = on_connect_message(&server) {
        let _ = tx.send(Message::Text(greeting.clone()));
        server.log_event(LogDirection::Outbound, Some(&client_id), greeting);
    }

    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_text_message(&server, &client_id, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // Binary/ping/pong frames are not matched against rules.
            Err(e) => {
                server.log_event(
                    LogDirection::System,
                    Some(&client_id),
                    format!("Socket error: {e}"),
                );
                break;
            }
        }
    }

    server.clients.write().remove(&client_id);
    server.log_event(LogDirection::System, Some(&client_id), "Client disconnected");
    debug!("WebSocket client {} disconnected", client_id);
}

fn on_connect_message(server: &RunningWsServer) -> Option<String> {
    let configs = server.store.get_ws_servers().ok()?;
    let config = configs.into_iter().find(|c| c.id == server.config_id)?;
    if config.on_connect_message.is_empty() {
        None
    } else {
        Some(config.on_connect_message)
    }
}

/// Run the ordered rule scan for one inbound text message and send the first
/// matching rule's response, if the client is still connected.
async fn handle_text_message(server: &Arc<RunningWsServer>, client_id: &str, text: &str) {
    server.log_event(LogDirection::Inbound, Some(client_id), text);

    // Live read: rule edits apply to the very next message.
    let rules: Vec<WsRule> = match server.store.get_ws_servers() {
        Ok(configs) => configs
            .into_iter()
            .find(|c| c.id == server.config_id)
            .map(|c| c.rules)
            .unwrap_or_default(),
        Err(e) => {
            warn!("Failed to load WebSocket rules: {}", e);
            return;
        }
    };

    let Some(rule) = rules.iter().find(|r| r.active && rule_matches(r, text)) else {
        debug!("No WebSocket rule matched message on '{}'", server.config_id);
        return;
    };

    if rule.delay > 0 {
        tokio::time::sleep(Duration::from_millis(rule.delay)).await;
    }

    let response = match rule.response_mode {
        ResponseMode::Basic => rule.response_basic.clone(),
        ResponseMode::Advanced => {
            match scripting::run_ws_script(&rule.response_advanced, text, client_id) {
                Ok(serde_json::Value::String(s)) => s,
                Ok(value) => value.to_string(),
                Err(e) => {
                    server.log_event(
                        LogDirection::System,
                        Some(client_id),
                        format!("Script error: {e}"),
                    );
                    return;
                }
            }
        }
    };

    // The socket may have closed during the delay or script run.
    let clients = server.clients.read();
    if let Some(client) = clients.get(client_id) {
        let _ = client.sender.send(Message::Text(response.clone()));
        drop(clients);
        server.log_event(LogDirection::Outbound, Some(client_id), response);
    }
}

fn rule_matches(rule: &WsRule, text: &str) -> bool {
    match rule.match_type {
        WsMatchType::Exact => text == rule.match_pattern,
        WsMatchType::Contains => text.contains(&rule.match_pattern),
        WsMatchType::Regex => match regex::Regex::new(&rule.match_pattern) {
            Ok(re) => re.is_match(text),
            Err(e) => {
                // Fail closed: a bad pattern is skipped, not raised.
                debug!("Invalid WebSocket rule regex '{}': {}", rule.match_pattern, e);
                false
            }
        },
        WsMatchType::Any => true,
    }
}
