//! WebSocket ping pump: optional keepalive pings.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

use super::write::WriteRequest;

/// Sends a ping every `period` until cancelled or the writer is gone.
pub(crate) async fn ping_pump(
    write_tx: mpsc::Sender<WriteRequest>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ping = WriteRequest {
                    message: tungstenite::Message::Ping(Vec::new().into()),
                    done: None,
                };
                if write_tx.send(ping).await.is_err() {
                    break;
                }
            }
        }
    }
}
