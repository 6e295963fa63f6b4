//! Connection hub for the remote console.
//!
//! Keeps one independent WebSocket session per configured endpoint,
//! broadcasts frames to a chosen subset of them, mirrors all traffic into
//! the event log and reconnects endpoints whose session fails.

mod connection;
pub mod error;
pub mod hub;
mod pumps;
mod reconnection;
mod session;
pub mod types;

pub use error::HubError;
pub use hub::ConnectionHub;
pub use types::{ConnectionEvent, ConnectionState, HubConfig, ReconnectConfig};
