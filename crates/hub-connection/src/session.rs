//! One open WebSocket session to an endpoint.
//!
//! The write half is driven by the write pump (plus the optional ping
//! pump); the read half is handed back to the caller, which runs the
//! listen loop on it.

use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::HubError;
use crate::pumps::write::WriteRequest;
use crate::types::HubConfig;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read half of an open session.
pub(crate) type SessionReader = SplitStream<WsStream>;

const WRITE_QUEUE: usize = 256;

/// Write side of an open session.
///
/// Cancelling the session token stops the pumps; the write pump then sends
/// a "going away" close frame, which also unblocks the peer's reader.
pub(crate) struct Session {
    write_tx: mpsc::Sender<WriteRequest>,
    cancel: CancellationToken,
    _write_handle: JoinHandle<()>,
    _ping_handle: Option<JoinHandle<()>>,
}

impl Session {
    /// Performs the WebSocket handshake and starts the write side.
    pub(crate) async fn open(
        url: &Url,
        config: &HubConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, SessionReader), HubError> {
        let mut ws_config = WebSocketConfig::default();
        if let Some(max) = config.max_message_size {
            ws_config.max_message_size = Some(max);
            ws_config.max_frame_size = Some(max);
        }
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false)
                .await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<WriteRequest>(WRITE_QUEUE);

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            cancel.clone(),
        ));

        let ping_handle = config.keepalive.map(|period| {
            tokio::spawn(crate::pumps::ping::ping_pump(
                write_tx.clone(),
                period,
                cancel.clone(),
            ))
        });

        debug!(url = %url, "WebSocket session open");
        let session = Self {
            write_tx,
            cancel,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
        };
        Ok((session, read))
    }

    /// Sends a text message and waits until it has been written.
    pub(crate) async fn send_text(&self, text: String) -> Result<(), HubError> {
        let (done_tx, done_rx) = oneshot::channel();
        let req = WriteRequest {
            message: tungstenite::Message::Text(text.into()),
            done: Some(done_tx),
        };
        self.write_tx.send(req).await.map_err(|_| HubError::Closed)?;
        done_rx.await.map_err(|_| HubError::Closed)??;
        Ok(())
    }

    /// Stops the pumps; the peer receives a going-away close.
    pub(crate) fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
