//! Whole-document store for service and WebSocket configurations.
//!
//! The store is deliberately cache-free: every call re-reads the current
//! snapshot from disk so edits made by the external editor take effect on the
//! very next request, without restarting any listener. Writes follow a
//! "create-if-absent, overwrite-with-revision" contract: the current revision
//! token is read back and incremented on every save.

use crate::error::StoreError;
use crate::model::{Service, WsServerConfig};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const SERVICES_FILE: &str = "services.json";
const WS_SERVERS_FILE: &str = "ws_servers.json";

/// Access to whole-document snapshots of the rule configuration.
///
/// Implementations must never cache between calls; the resolution pipeline
/// relies on fresh reads for its live-edit semantics.
pub trait ServiceStore: Send + Sync {
    fn get_services(&self) -> Result<Vec<Service>, StoreError>;
    fn save_services(&self, services: &[Service]) -> Result<(), StoreError>;
    fn get_ws_servers(&self) -> Result<Vec<WsServerConfig>, StoreError>;
    fn save_ws_servers(&self, servers: &[WsServerConfig]) -> Result<(), StoreError>;
}

/// On-disk document wrapper carrying the optimistic-overwrite revision token.
#[derive(Debug, Serialize, Deserialize)]
struct Document<T> {
    revision: u64,
    items: Vec<T>,
}

/// JSON-file-backed store: one document file per collection under a directory.
pub struct FileStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process. Recording
    // pushes from concurrent requests are last-write-wins by design.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn read_document<T: DeserializeOwned>(&self, file: &str) -> Result<Document<T>, StoreError> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(Document {
                revision: 0,
                items: Vec::new(),
            });
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_document<T: Serialize + DeserializeOwned>(
        &self,
        file: &str,
        items: &[T],
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let current: Document<serde_json::Value> = self.read_document(file)?;
        let document = serde_json::json!({
            "revision": current.revision + 1,
            "items": items,
        });
        let path = self.dir.join(file);
        write_atomic(&path, &serde_json::to_vec_pretty(&document)?)?;
        debug!(
            "Saved {} (revision {} -> {})",
            file,
            current.revision,
            current.revision + 1
        );
        Ok(())
    }
}

/// Write via a sibling temp file and rename, so a concurrent reader never
/// observes a half-written document.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

impl ServiceStore for FileStore {
    fn get_services(&self) -> Result<Vec<Service>, StoreError> {
        Ok(self.read_document(SERVICES_FILE)?.items)
    }

    fn save_services(&self, services: &[Service]) -> Result<(), StoreError> {
        self.write_document(SERVICES_FILE, services)
    }

    fn get_ws_servers(&self) -> Result<Vec<WsServerConfig>, StoreError> {
        let document: Document<WsServerConfig> = self.read_document(WS_SERVERS_FILE)?;
        if document.revision == 0 && document.items.is_empty() {
            // Empty store: seed one example configuration so the editor has
            // something to show, matching the first-read lifecycle contract.
            let seeded = vec![WsServerConfig::seeded_example()];
            self.save_ws_servers(&seeded)?;
            return Ok(seeded);
        }
        Ok(document.items)
    }

    fn save_ws_servers(&self, servers: &[WsServerConfig]) -> Result<(), StoreError> {
        self.write_document(WS_SERVERS_FILE, servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Group, Rule};

    fn sample_services() -> Vec<Service> {
        vec![Service {
            id: "svc-1".to_string(),
            name: "Orders".to_string(),
            port: 4001,
            prefix: "/api".to_string(),
            groups: vec![Group {
                id: "g1".to_string(),
                name: "default".to_string(),
                sub_prefix: String::new(),
                children: vec![Rule {
                    id: "r1".to_string(),
                    url: "/ping".to_string(),
                    response_basic: "pong".to_string(),
                    ..Default::default()
                }],
            }],
            ..Default::default()
        }]
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        // Create path: document does not exist yet.
        store.save_services(&sample_services()).unwrap();
        let loaded = store.get_services().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "svc-1");
        assert_eq!(loaded[0].groups[0].children[0].response_basic, "pong");

        // Update path: document exists, revision must advance.
        let mut services = loaded;
        services[0].name = "Orders v2".to_string();
        store.save_services(&services).unwrap();
        let raw = std::fs::read_to_string(dir.path().join(SERVICES_FILE)).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["revision"], 2);
        assert_eq!(store.get_services().unwrap()[0].name, "Orders v2");
    }

    #[test]
    fn empty_store_reads_as_empty_services() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.get_services().unwrap().is_empty());
    }

    #[test]
    fn ws_servers_seed_on_first_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        let servers = store.get_ws_servers().unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].id, "ws-example");

        // The seed is persisted, not re-generated per read.
        let raw = std::fs::read_to_string(dir.path().join(WS_SERVERS_FILE)).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["revision"], 1);

        // A store emptied by the editor stays empty afterwards.
        store.save_ws_servers(&[]).unwrap();
        assert!(store.get_ws_servers().unwrap().is_empty());
    }
}
