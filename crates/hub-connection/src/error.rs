//! Error types for hub connection operations.

use tokio_tungstenite::tungstenite;

/// Errors from a single endpoint's session.
///
/// These never escape the hub's public operations; they are reported to
/// the event sink scoped to the affected endpoint.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("frame encoding error: {0}")]
    Frame(#[from] remotectl_protocol::FrameError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    Closed,
}
