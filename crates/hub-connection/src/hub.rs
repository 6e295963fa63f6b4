//! Connection hub: one independent WebSocket connection per endpoint.
//!
//! The hub owns the map from endpoint id to [`Connection`]. Every map
//! mutation (operator connect/disconnect, reconnect installs) goes through
//! a single async mutex, and background work only touches the entry whose
//! generation it was started for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use futures_util::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};
use url::Url;
use uuid::Uuid;

use remotectl_hub_log::{EventSink, LogEvent, LogKind};
use remotectl_hub_servers::{Endpoint, EndpointRegistry};
use remotectl_protocol::Frame;

use crate::connection::{Connection, spawn_listener};
use crate::error::HubError;
use crate::reconnection::reconnect_cycle;
use crate::session::Session;
use crate::types::{ConnectionEvent, ConnectionState, HubConfig};

const EVENT_QUEUE: usize = 64;

/// Shared hub state. Background tasks hold it weakly.
pub(crate) struct HubInner {
    pub(crate) config: HubConfig,
    registry: RwLock<Option<Weak<dyn EndpointRegistry>>>,
    sink: RwLock<Option<Weak<dyn EventSink>>>,
    connections: Mutex<HashMap<Uuid, Connection>>,
    next_generation: AtomicU64,
    events_tx: mpsc::Sender<ConnectionEvent>,
}

impl HubInner {
    pub(crate) fn registry(&self) -> Option<Arc<dyn EndpointRegistry>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn sink(&self) -> Option<Arc<dyn EventSink>> {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Forwards an event to the sink; silently dropped once the sink is gone.
    pub(crate) fn log_event(&self, event: LogEvent) {
        let endpoint = event.endpoint_name.as_deref().unwrap_or("-");
        if event.kind == LogKind::Error {
            warn!(endpoint, title = %event.title, "{}", event.body);
        } else {
            debug!(endpoint, kind = %event.kind, title = %event.title, "hub event");
        }
        if let Some(sink) = self.sink() {
            sink.add(event);
        }
    }

    pub(crate) fn log(
        &self,
        endpoint_name: Option<&str>,
        kind: LogKind,
        title: &str,
        body: impl Into<String>,
    ) {
        self.log_event(LogEvent::new(endpoint_name, kind, title, body));
    }

    fn emit_state(&self, endpoint_id: Uuid, state: ConnectionState) {
        if let Err(e) = self
            .events_tx
            .try_send(ConnectionEvent::StateChanged { endpoint_id, state })
        {
            trace!("state event dropped: {e}");
        }
    }

    /// Replaces any connection for `endpoint` with a fresh one and opens
    /// its session.
    ///
    /// `expect` is set by the reconnect procedure: the attempt only
    /// proceeds while the map still holds that generation for the endpoint.
    pub(crate) async fn connect(self: &Arc<Self>, endpoint: Endpoint, expect: Option<u64>) {
        let id = endpoint.id;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let cancel = {
            let mut connections = self.connections.lock().await;
            if let Some(expected) = expect
                && !connections.get(&id).is_some_and(|c| c.is_current(expected))
            {
                debug!(endpoint = %endpoint.name, "reconnect superseded");
                return;
            }
            if let Some(old) = connections.remove(&id) {
                old.retire();
            }
            let conn = Connection::new(endpoint.clone(), generation);
            let cancel = conn.cancel.clone();
            connections.insert(id, conn);
            self.emit_state(id, ConnectionState::Connecting);
            cancel
        };

        self.log(
            Some(&endpoint.name),
            LogKind::Info,
            "WS connect",
            endpoint.transport_address.as_str(),
        );

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            r = Session::open(&endpoint.transport_address, &self.config, cancel.child_token()) => r,
        };

        match opened {
            Ok((session, reader)) => {
                let mut connections = self.connections.lock().await;
                let Some(conn) = connections.get_mut(&id).filter(|c| c.is_current(generation))
                else {
                    // Superseded during the handshake; dropping the session
                    // closes it.
                    return;
                };
                conn.session = Some(Arc::new(session));
                conn.state = ConnectionState::Connected;
                conn.task = Some(spawn_listener(
                    Arc::downgrade(self),
                    endpoint.clone(),
                    generation,
                    reader,
                    cancel,
                ));
                self.emit_state(id, ConnectionState::Connected);
                info!(endpoint = %endpoint.name, url = %endpoint.transport_address, "connected");
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    return;
                }
                self.log(
                    Some(&endpoint.name),
                    LogKind::Error,
                    "WS connect error",
                    e.to_string(),
                );
                self.schedule_reconnect(endpoint, generation).await;
            }
        }
    }

    /// Moves the connection of `generation` to `Reconnecting` and starts a
    /// reconnect cycle for it. Does nothing if it has been superseded.
    pub(crate) async fn schedule_reconnect(self: &Arc<Self>, endpoint: Endpoint, generation: u64) {
        let mut connections = self.connections.lock().await;
        let Some(conn) = connections
            .get_mut(&endpoint.id)
            .filter(|c| c.is_current(generation))
        else {
            return;
        };
        conn.state = ConnectionState::Reconnecting;
        if let Some(session) = conn.session.take() {
            session.close();
        }
        let cancel = conn.cancel.clone();
        let id = endpoint.id;
        conn.task = Some(tokio::spawn(reconnect_cycle(
            Arc::downgrade(self),
            endpoint,
            generation,
            cancel,
        )));
        self.emit_state(id, ConnectionState::Reconnecting);
    }

    async fn disconnect(&self, id: Uuid) {
        let mut connections = self.connections.lock().await;
        let Some(conn) = connections.remove(&id) else {
            return;
        };
        let name = conn.endpoint.name.clone();
        let address = conn.endpoint.transport_address.to_string();
        conn.retire();
        self.emit_state(id, ConnectionState::Disconnected);
        drop(connections);
        self.log(Some(&name), LogKind::Info, "WS disconnect", address);
    }

    async fn send_to(&self, endpoint: &Endpoint, text: &str) -> Result<(), HubError> {
        let session = self
            .connections
            .lock()
            .await
            .get(&endpoint.id)
            .filter(|c| c.state == ConnectionState::Connected)
            .and_then(|c| c.session.clone())
            .ok_or(HubError::NotConnected)?;
        session.send_text(text.to_string()).await
    }
}

/// Multi-endpoint WebSocket hub.
pub struct ConnectionHub {
    inner: Arc<HubInner>,
    events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl ConnectionHub {
    /// Creates an unbound hub with no connections.
    pub fn new(config: HubConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        Self {
            inner: Arc::new(HubInner {
                config,
                registry: RwLock::new(None),
                sink: RwLock::new(None),
                connections: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                events_tx,
            }),
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Binds the hub to its collaborators without taking ownership.
    ///
    /// Once either is dropped, operations that need it are skipped.
    pub fn bind<R, S>(&self, registry: &Arc<R>, sink: &Arc<S>)
    where
        R: EndpointRegistry + 'static,
        S: EventSink + 'static,
    {
        let registry: Arc<dyn EndpointRegistry> = registry.clone();
        let sink: Arc<dyn EventSink> = sink.clone();
        *self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(&registry));
        *self
            .inner
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(&sink));
    }

    /// Takes the state-change receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Connects every enabled endpoint of the registry.
    pub async fn connect_all(&self) {
        let Some(registry) = self.inner.registry() else {
            debug!("connect_all: registry unavailable");
            return;
        };
        let endpoints = registry.enabled_endpoints();
        info!("connecting {} endpoint(s)", endpoints.len());
        join_all(endpoints.into_iter().map(|e| self.connect(e))).await;
    }

    /// Opens a connection to `endpoint`, retiring any existing one first.
    ///
    /// Returns once the handshake has completed or failed; the listener
    /// keeps running in the background. Failures are reported as events.
    pub async fn connect(&self, endpoint: Endpoint) {
        self.inner.connect(endpoint, None).await;
    }

    /// Closes the connection for `id` with a going-away close. Unknown ids
    /// are ignored.
    pub async fn disconnect(&self, id: Uuid) {
        self.inner.disconnect(id).await;
    }

    /// Sends `frame` to each target independently.
    ///
    /// A target without an open session gets a "not connected" error event;
    /// the other targets are unaffected.
    pub async fn send(&self, frame: &Frame, targets: &[Endpoint]) {
        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                self.inner
                    .log(None, LogKind::Error, "WS send error", e.to_string());
                return;
            }
        };

        let sends = targets.iter().map(|endpoint| {
            let text = text.as_str();
            async move {
                let name = Some(endpoint.name.as_str());
                match self.inner.send_to(endpoint, text).await {
                    Ok(()) => self.inner.log(name, LogKind::Outbound, "WS → Frame", text),
                    Err(HubError::NotConnected) => {
                        self.inner
                            .log(name, LogKind::Error, "WS send failed", "Not connected")
                    }
                    Err(e) => self
                        .inner
                        .log(name, LogKind::Error, "WS send error", e.to_string()),
                }
            }
        });
        join_all(sends).await;
    }

    /// Follows an endpoint's enabled flag: connect when set, disconnect
    /// when cleared.
    pub async fn apply_enabled(&self, endpoint: &Endpoint) {
        if endpoint.enabled {
            self.connect(endpoint.clone()).await;
        } else {
            self.disconnect(endpoint.id).await;
        }
    }

    /// Reconciles connections with the registry.
    ///
    /// Enabled endpoints without a connection (or whose transport address
    /// changed) are connected; connections whose endpoint is gone or
    /// disabled are disconnected.
    pub async fn sync_with_registry(&self) {
        let Some(registry) = self.inner.registry() else {
            return;
        };
        let enabled = registry.enabled_endpoints();
        let current: HashMap<Uuid, Url> = self
            .inner
            .connections
            .lock()
            .await
            .iter()
            .map(|(id, c)| (*id, c.endpoint.transport_address.clone()))
            .collect();

        for id in current.keys() {
            if !enabled.iter().any(|e| e.id == *id) {
                self.disconnect(*id).await;
            }
        }

        let stale = enabled
            .into_iter()
            .filter(|e| current.get(&e.id) != Some(&e.transport_address));
        join_all(stale.map(|e| self.connect(e))).await;
    }

    /// Current state for `id`; `Disconnected` when there is no connection.
    pub async fn state(&self, id: Uuid) -> ConnectionState {
        self.inner
            .connections
            .lock()
            .await
            .get(&id)
            .map_or(ConnectionState::Disconnected, |c| c.state)
    }

    /// States of all existing connections.
    pub async fn states(&self) -> HashMap<Uuid, ConnectionState> {
        self.inner
            .connections
            .lock()
            .await
            .iter()
            .map(|(id, c)| (*id, c.state))
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.lock().await.len()
    }

    pub async fn is_connected(&self, id: Uuid) -> bool {
        self.state(id).await == ConnectionState::Connected
    }

    /// Disconnects every endpoint.
    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = self.inner.connections.lock().await.keys().copied().collect();
        for id in ids {
            self.disconnect(id).await;
        }
        info!("hub shut down");
    }
}
