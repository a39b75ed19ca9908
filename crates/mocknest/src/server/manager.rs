//! Lifecycle management for per-service HTTP mock listeners.
//!
//! Each started service owns one TCP listener on its own port. The registry
//! is keyed by service id; rule content is never cached here — only the
//! port/prefix snapshot captured at start time.

use super::handler::handle_service_request;
use super::probe::port_available;
use crate::error::LifecycleError;
use crate::store::ServiceStore;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Snapshot of one running listener, exposed by `status()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running: bool,
    pub port: u16,
    pub prefix: String,
}

/// Runtime state shared with every request handler of one service.
pub(crate) struct RunningService {
    pub service_id: String,
    pub port: u16,
    /// Prefix snapshot captured at start; updated in place on a same-port
    /// restart without socket churn.
    pub prefix: RwLock<String>,
    pub store: Arc<dyn ServiceStore>,
    pub shutdown_tx: broadcast::Sender<()>,
}

/// Owns the registry of live per-service HTTP listeners.
pub struct HttpMockManager {
    services: RwLock<HashMap<String, Arc<RunningService>>>,
    store: Arc<dyn ServiceStore>,
}

impl HttpMockManager {
    pub fn new(store: Arc<dyn ServiceStore>) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Start (or reconfigure) the listener for a service.
    ///
    /// If the service is already running on the requested port, only the
    /// stored prefix snapshot is updated — no socket churn. A different port
    /// closes the existing listener and binds a new one. Returns the bound
    /// port.
    pub async fn start(
        &self,
        service_id: &str,
        port: u16,
        prefix: &str,
    ) -> Result<u16, LifecycleError> {
        if let Some(existing) = self.services.read().get(service_id).cloned() {
            if existing.port == port {
                *existing.prefix.write() = prefix.to_string();
                info!(
                    "Service '{}' already on port {}, updated prefix to '{}'",
                    service_id, port, prefix
                );
                return Ok(port);
            }
        }

        // Port change: tear down the old listener first.
        self.stop(service_id);

        if !port_available(port) {
            return Err(LifecycleError::PortInUse(port));
        }

        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| LifecycleError::BindError(port, e.to_string()))?;
        info!("Service '{}' bound to 0.0.0.0:{}", service_id, port);

        let (shutdown_tx, _) = broadcast::channel(1);
        let running = Arc::new(RunningService {
            service_id: service_id.to_string(),
            port,
            prefix: RwLock::new(prefix.to_string()),
            store: Arc::clone(&self.store),
            shutdown_tx: shutdown_tx.clone(),
        });

        let accept_state = Arc::clone(&running);
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _addr)) => {
                                let state = Arc::clone(&accept_state);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let state = Arc::clone(&state);
                                        async move { handle_service_request(req, state).await }
                                    });
                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error on port {}: {}", port, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Accept error on port {}: {}", port, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Service listener on port {} shutting down", port);
                        break;
                    }
                }
            }
        });

        self.services
            .write()
            .insert(service_id.to_string(), running);
        Ok(port)
    }

    /// Stop a service's listener. Returns whether one was running.
    pub fn stop(&self, service_id: &str) -> bool {
        let removed = self.services.write().remove(service_id);
        match removed {
            Some(running) => {
                let _ = running.shutdown_tx.send(());
                info!("Service '{}' stopped", service_id);
                true
            }
            None => false,
        }
    }

    /// Snapshot of all running listeners.
    pub fn status(&self) -> HashMap<String, ServiceStatus> {
        self.services
            .read()
            .iter()
            .map(|(id, running)| {
                (
                    id.clone(),
                    ServiceStatus {
                        running: true,
                        port: running.port,
                        prefix: running.prefix.read().clone(),
                    },
                )
            })
            .collect()
    }

    /// Stop every listener.
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.services.read().keys().cloned().collect();
        for id in ids {
            self.stop(&id);
        }
    }
}
