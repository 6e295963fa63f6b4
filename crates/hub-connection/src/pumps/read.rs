//! WebSocket read pump: the per-connection listen loop.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use remotectl_hub_log::{LogEvent, LogKind};

/// Why the listen loop stopped.
#[derive(Debug, PartialEq)]
pub(crate) enum ListenOutcome {
    /// Cancellation was requested; the operator asked to stop.
    Cancelled,
    /// Receiving failed or the peer closed; the reason is human readable.
    Failed(String),
}

/// Receives messages until cancelled or the stream fails, handing each one
/// to `emit` as an inbound log event.
///
/// Text is logged as-is, binary payloads base64-encoded (standard alphabet,
/// padded). Ping and pong are answered by the transport and only traced.
pub(crate) async fn listen<S, F>(
    mut read: S,
    endpoint_name: &str,
    emit: F,
    cancel: &CancellationToken,
) -> ListenOutcome
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    F: Fn(LogEvent),
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ListenOutcome::Cancelled,
            msg = read.next() => msg,
        };

        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(endpoint = %endpoint_name, "WebSocket read error: {e}");
                return ListenOutcome::Failed(e.to_string());
            }
            None => {
                debug!(endpoint = %endpoint_name, "WebSocket stream ended");
                return ListenOutcome::Failed("connection closed".into());
            }
        };

        // A message that raced with cancellation belongs to a retired
        // connection and must not reach the log.
        if cancel.is_cancelled() {
            return ListenOutcome::Cancelled;
        }

        let name = Some(endpoint_name);
        match msg {
            tungstenite::Message::Text(text) => {
                emit(LogEvent::new(name, LogKind::Inbound, "WS ←", text.as_str()));
            }
            tungstenite::Message::Binary(data) => {
                emit(LogEvent::new(
                    name,
                    LogKind::Inbound,
                    "WS ← (data)",
                    BASE64.encode(&data),
                ));
            }
            tungstenite::Message::Ping(_) => trace!(endpoint = %endpoint_name, "received ping"),
            tungstenite::Message::Pong(_) => trace!(endpoint = %endpoint_name, "received pong"),
            tungstenite::Message::Close(frame) => {
                let reason = match frame {
                    Some(f) => format!("closed by peer ({}) {}", u16::from(f.code), f.reason.as_str()),
                    None => "closed by peer".to_string(),
                };
                debug!(endpoint = %endpoint_name, "received close frame");
                return ListenOutcome::Failed(reason.trim_end().to_string());
            }
            tungstenite::Message::Frame(_) => {
                emit(LogEvent::new(name, LogKind::Inbound, "WS ← (unknown)", ""));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::{Arc, Mutex};

    type Collected = Arc<Mutex<Vec<LogEvent>>>;

    fn collector() -> (Collected, impl Fn(LogEvent)) {
        let events: Collected = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        (events, move |e| sink.lock().unwrap().push(e))
    }

    #[tokio::test]
    async fn logs_text_and_binary_then_fails_on_end() {
        let (events, emit) = collector();
        let messages = stream::iter(vec![
            Ok(tungstenite::Message::Text("hello".into())),
            Ok(tungstenite::Message::Binary(vec![0xde, 0xad, 0xbe, 0xef, 0x01].into())),
            Ok(tungstenite::Message::Ping(Vec::new().into())),
        ]);

        let outcome = listen(messages, "Local", emit, &CancellationToken::new()).await;
        assert_eq!(outcome, ListenOutcome::Failed("connection closed".into()));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "WS ←");
        assert_eq!(events[0].body, "hello");
        assert_eq!(events[0].kind, LogKind::Inbound);
        assert_eq!(events[0].endpoint_name.as_deref(), Some("Local"));
        assert_eq!(events[1].title, "WS ← (data)");
        assert_eq!(events[1].body, "3q2+7wE=");
    }

    #[tokio::test]
    async fn read_error_fails() {
        let (events, emit) = collector();
        let messages = stream::iter(vec![Err(tungstenite::Error::ConnectionClosed)]);
        let outcome = listen(messages, "Local", emit, &CancellationToken::new()).await;
        assert!(matches!(outcome, ListenOutcome::Failed(_)));
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_frame_fails() {
        let (_events, emit) = collector();
        let messages = stream::iter(vec![Ok(tungstenite::Message::Close(None))]);
        let outcome = listen(messages, "Local", emit, &CancellationToken::new()).await;
        assert_eq!(outcome, ListenOutcome::Failed("closed by peer".into()));
    }

    #[tokio::test]
    async fn cancel_interrupts_pending_receive() {
        let (events, emit) = collector();
        let cancel = CancellationToken::new();
        let pending = stream::pending::<Result<tungstenite::Message, tungstenite::Error>>();

        let c = cancel.clone();
        let handle = tokio::spawn(async move { listen(pending, "Local", emit, &c).await });
        cancel.cancel();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
        assert_eq!(outcome, ListenOutcome::Cancelled);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_logs_nothing() {
        let (events, emit) = collector();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let messages = stream::iter(vec![Ok(tungstenite::Message::Text("late".into()))]);
        assert_eq!(
            listen(messages, "Local", emit, &cancel).await,
            ListenOutcome::Cancelled
        );
        assert!(events.lock().unwrap().is_empty());
    }
}
