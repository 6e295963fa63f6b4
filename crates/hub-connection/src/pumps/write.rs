//! WebSocket write pump: serialises outbound messages.

use futures_util::SinkExt;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// An outbound message, optionally with a completion notification.
pub(crate) struct WriteRequest {
    pub(crate) message: tungstenite::Message,
    pub(crate) done: Option<oneshot::Sender<Result<(), tungstenite::Error>>>,
}

/// Writes messages to the WebSocket until cancelled or the sink fails.
///
/// On cancellation a "going away" close frame is sent so the peer sees a
/// normal closure. A failed sink is abandoned without one.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<WriteRequest>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let mut sink_ok = true;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            req = write_rx.recv() => {
                let Some(req) = req else { break };
                let result = write.send(req.message).await;
                let failed = result.is_err();
                if let Err(e) = &result {
                    error!("WebSocket write error: {e}");
                }
                if let Some(done) = req.done {
                    let _ = done.send(result);
                }
                if failed {
                    sink_ok = false;
                    break;
                }
            }
        }
    }

    if !sink_ok {
        return;
    }
    let close = CloseFrame {
        code: CloseCode::Away,
        reason: String::new().into(),
    };
    if let Err(e) = write.send(tungstenite::Message::Close(Some(close))).await {
        debug!("close frame not sent: {e}");
    }
}
