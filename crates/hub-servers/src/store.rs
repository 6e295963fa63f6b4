//! Persistent endpoint registry.
//!
//! Endpoints are cached in memory and written to a JSON file after every
//! mutation. Observers follow changes through a `watch` channel.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{Endpoint, EndpointError};

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Read access to the configured endpoints.
pub trait EndpointRegistry: Send + Sync {
    /// Snapshot of the endpoints currently enabled, in configuration order.
    fn enabled_endpoints(&self) -> Vec<Endpoint>;

    /// Looks up an endpoint by id.
    fn endpoint(&self, id: Uuid) -> Option<Endpoint>;
}

/// Endpoint list backed by an optional JSON file.
pub struct ServerStore {
    path: Option<PathBuf>,
    servers: RwLock<Vec<Endpoint>>,
    changes: watch::Sender<Vec<Endpoint>>,
}

impl ServerStore {
    /// Opens the registry at `path`, loading existing endpoints.
    ///
    /// When nothing valid is stored, including a file that no longer
    /// parses, a single enabled "Local" endpoint is seeded and persisted.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let mut servers = load_servers(&path)?;
        let seeded = servers.is_empty();
        if seeded {
            servers.push(Endpoint::new(
                "Local",
                "ws://localhost:8000/ws",
                "http://localhost:8000",
            )?);
        }
        let store = Self::build(Some(path), servers);
        if seeded {
            store.persist(&store.all())?;
        }
        Ok(store)
    }

    /// Creates a registry that is never written to disk.
    pub fn in_memory(servers: Vec<Endpoint>) -> Self {
        Self::build(None, servers)
    }

    fn build(path: Option<PathBuf>, servers: Vec<Endpoint>) -> Self {
        let (changes, _) = watch::channel(servers.clone());
        Self {
            path,
            servers: RwLock::new(servers),
            changes,
        }
    }

    /// All endpoints, enabled or not.
    pub fn all(&self) -> Vec<Endpoint> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Finds an endpoint by exact name.
    pub fn find_by_name(&self, name: &str) -> Option<Endpoint> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    /// Adds a validated endpoint. Names must be unique.
    pub fn add(&self, endpoint: Endpoint) -> Result<(), StoreError> {
        endpoint.validate()?;
        self.mutate(|servers| {
            if servers.iter().any(|s| s.name == endpoint.name) {
                return Err(EndpointError::DuplicateName(endpoint.name.clone()).into());
            }
            servers.push(endpoint);
            Ok(())
        })
    }

    /// Removes an endpoint, returning it if it existed.
    pub fn remove(&self, id: Uuid) -> Result<Option<Endpoint>, StoreError> {
        self.mutate(|servers| {
            let idx = servers.iter().position(|s| s.id == id);
            Ok(idx.map(|i| servers.remove(i)))
        })
    }

    /// Replaces the endpoint with the same id. Returns `false` if unknown.
    pub fn update(&self, endpoint: Endpoint) -> Result<bool, StoreError> {
        endpoint.validate()?;
        self.mutate(|servers| {
            if servers
                .iter()
                .any(|s| s.id != endpoint.id && s.name == endpoint.name)
            {
                return Err(EndpointError::DuplicateName(endpoint.name.clone()).into());
            }
            match servers.iter_mut().find(|s| s.id == endpoint.id) {
                Some(slot) => {
                    *slot = endpoint;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// Toggles the enabled flag, returning the updated endpoint.
    pub fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<Option<Endpoint>, StoreError> {
        self.mutate(|servers| {
            Ok(servers.iter_mut().find(|s| s.id == id).map(|s| {
                s.enabled = enabled;
                s.clone()
            }))
        })
    }

    /// Subscribes to the endpoint list; the current list is marked seen.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Endpoint>> {
        self.changes.subscribe()
    }

    /// Applies `f` to the list, persists it and notifies subscribers, all
    /// under the write lock. A failed write rolls the list back.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<Endpoint>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut servers = self
            .servers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = servers.clone();
        let out = f(&mut servers)?;
        if let Err(e) = self.persist(&servers) {
            warn!(error = %e, "endpoint registry not saved; change discarded");
            *servers = previous;
            return Err(e);
        }
        self.changes.send_replace(servers.clone());
        Ok(out)
    }

    /// Writes `servers` to disk.
    fn persist(&self, servers: &[Endpoint]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(servers)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        debug!("persisted {} endpoint(s) to {:?}", servers.len(), path);
        Ok(())
    }
}

impl EndpointRegistry for ServerStore {
    fn enabled_endpoints(&self) -> Vec<Endpoint> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect()
    }

    fn endpoint(&self, id: Uuid) -> Option<Endpoint> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }
}

/// Loads endpoints from a JSON file, dropping entries that fail validation.
/// An unreadable document yields an empty list.
fn load_servers(path: &Path) -> Result<Vec<Endpoint>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path)?;
    let servers: Vec<Endpoint> = match serde_json::from_str(&data) {
        Ok(servers) => servers,
        Err(e) => {
            warn!(error = %e, "endpoint registry {:?} is corrupt; reseeding", path);
            return Ok(Vec::new());
        }
    };
    let servers: Vec<Endpoint> = servers
        .into_iter()
        .filter(|s| match s.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(endpoint = %s.name, error = %e, "skipping invalid endpoint");
                false
            }
        })
        .collect();
    debug!("loaded {} endpoint(s) from {:?}", servers.len(), path);
    Ok(servers)
}

/// Returns the default registry path.
pub fn default_servers_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("remotectl").join("servers.json"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str) -> Endpoint {
        Endpoint::new(name, "ws://127.0.0.1:9000/ws", "http://127.0.0.1:9000").unwrap()
    }

    fn test_store() -> (tempfile::TempDir, ServerStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ServerStore::open(tmp.path().join("servers.json")).unwrap();
        (tmp, store)
    }

    #[test]
    fn open_seeds_local_endpoint() {
        let (tmp, store) = test_store();
        let all = store.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Local");
        assert_eq!(all[0].transport_address.as_str(), "ws://localhost:8000/ws");
        assert!(tmp.path().join("servers.json").exists());
    }

    #[test]
    fn enabled_endpoints_filters_disabled() {
        let a = endpoint("a");
        let b = endpoint("b").with_enabled(false);
        let store = ServerStore::in_memory(vec![a.clone(), b]);
        assert_eq!(store.enabled_endpoints(), vec![a]);
    }

    #[test]
    fn add_rejects_duplicate_names() {
        let store = ServerStore::in_memory(vec![endpoint("a")]);
        let err = store.add(endpoint("a")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Endpoint(EndpointError::DuplicateName(_))
        ));
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn remove_and_update() {
        let a = endpoint("a");
        let store = ServerStore::in_memory(vec![a.clone()]);

        let mut renamed = a.clone();
        renamed.name = "renamed".into();
        assert!(store.update(renamed).unwrap());
        assert!(store.find_by_name("renamed").is_some());
        assert!(!store.update(endpoint("ghost")).unwrap());

        assert_eq!(store.remove(a.id).unwrap().unwrap().id, a.id);
        assert!(store.remove(a.id).unwrap().is_none());
        assert!(store.all().is_empty());
    }

    #[test]
    fn set_enabled_toggles_and_notifies() {
        let a = endpoint("a");
        let store = ServerStore::in_memory(vec![a.clone()]);
        let mut rx = store.subscribe();

        let updated = store.set_enabled(a.id, false).unwrap().unwrap();
        assert!(!updated.enabled);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update()[0].enabled);
        assert!(store.enabled_endpoints().is_empty());
        assert!(store.set_enabled(Uuid::new_v4(), true).unwrap().is_none());
    }

    #[test]
    fn persist_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("servers.json");
        let kitchen = endpoint("kitchen");

        {
            let store = ServerStore::open(path.clone()).unwrap();
            store.add(kitchen.clone()).unwrap();
            store.set_enabled(kitchen.id, false).unwrap();
        }

        let store = ServerStore::open(path).unwrap();
        assert_eq!(store.all().len(), 2);
        let loaded = store.endpoint(kitchen.id).unwrap();
        assert_eq!(loaded.name, "kitchen");
        assert!(!loaded.enabled);
    }

    #[test]
    fn load_skips_invalid_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("servers.json");
        let good = endpoint("good");
        let mut bad = endpoint("bad");
        bad.transport_address = url::Url::parse("http://wrong/ws").unwrap();
        std::fs::write(&path, serde_json::to_string(&vec![good.clone(), bad]).unwrap()).unwrap();

        let store = ServerStore::open(path).unwrap();
        assert_eq!(store.all(), vec![good]);
    }

    #[test]
    fn corrupt_file_is_reseeded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("servers.json");
        std::fs::write(&path, "[{\"name\": ").unwrap();

        let store = ServerStore::open(path.clone()).unwrap();
        let all = store.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Local");

        let rewritten: Vec<Endpoint> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten, all);
    }

    #[test]
    fn failed_write_rolls_back_and_stays_silent() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory in place of the file makes every write fail.
        let store = ServerStore::build(Some(tmp.path().to_path_buf()), vec![endpoint("a")]);
        let mut rx = store.subscribe();

        assert!(matches!(store.add(endpoint("b")), Err(StoreError::Io(_))));
        assert_eq!(store.all().len(), 1);
        assert!(store.find_by_name("b").is_none());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn concurrent_mutations_publish_the_final_list() {
        let store = std::sync::Arc::new(ServerStore::in_memory(Vec::new()));
        let rx = store.subscribe();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store.add(endpoint(&format!("e{i}-{j}"))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.all().len(), 200);
        assert_eq!(*rx.borrow(), store.all());
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let servers = load_servers(&tmp.path().join("absent.json")).unwrap();
        assert!(servers.is_empty());
    }
}
