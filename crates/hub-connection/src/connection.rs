//! Per-endpoint runtime state and its listener task.

use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use remotectl_hub_log::{LogEvent, LogKind};
use remotectl_hub_servers::Endpoint;

use crate::hub::HubInner;
use crate::pumps::read::{ListenOutcome, listen};
use crate::session::{Session, SessionReader};
use crate::types::ConnectionState;

/// One endpoint's connection as stored in the hub's map.
///
/// Every instance gets a fresh generation number. Background work that was
/// started for an instance carries its generation and only touches the map
/// entry while the generation still matches, so a retired instance can
/// never install over its successor.
pub(crate) struct Connection {
    pub(crate) endpoint: Endpoint,
    pub(crate) generation: u64,
    pub(crate) state: ConnectionState,
    /// Present while `Connected`.
    pub(crate) session: Option<Arc<Session>>,
    /// Cancels the listener, the reconnect wait and the session pumps.
    pub(crate) cancel: CancellationToken,
    /// Listener or reconnect task. Never aborted: a reconnect task may be
    /// the one retiring this connection.
    pub(crate) task: Option<JoinHandle<()>>,
}

impl Connection {
    pub(crate) fn new(endpoint: Endpoint, generation: u64) -> Self {
        Self {
            endpoint,
            generation,
            state: ConnectionState::Connecting,
            session: None,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Whether background work for `generation` still owns this entry.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && !self.cancel.is_cancelled()
    }

    /// Stops the listener (or reconnect wait) and closes the session with
    /// a going-away close.
    pub(crate) fn retire(mut self) {
        self.cancel.cancel();
        if let Some(session) = self.session.take() {
            session.close();
        }
        debug!(
            endpoint = %self.endpoint.name,
            generation = self.generation,
            "connection retired"
        );
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts the listen loop for a freshly opened session.
///
/// A receive failure is logged and hands the connection to the reconnect
/// procedure; cancellation ends the task quietly.
pub(crate) fn spawn_listener(
    hub: Weak<HubInner>,
    endpoint: Endpoint,
    generation: u64,
    reader: SessionReader,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let sink = hub.clone();
        let emit = move |event: LogEvent| {
            if let Some(inner) = sink.upgrade() {
                inner.log_event(event);
            }
        };

        let reason = match listen(reader, &endpoint.name, emit, &cancel).await {
            ListenOutcome::Cancelled => {
                debug!(endpoint = %endpoint.name, generation, "listener stopped");
                return;
            }
            ListenOutcome::Failed(reason) => reason,
        };
        if cancel.is_cancelled() {
            return;
        }

        let Some(inner) = hub.upgrade() else { return };
        inner.log(Some(&endpoint.name), LogKind::Error, "WS receive error", reason);
        inner.schedule_reconnect(endpoint, generation).await;
    })
}
