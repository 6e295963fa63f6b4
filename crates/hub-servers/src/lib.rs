//! Server endpoint registry.
//!
//! Holds the operator's configured servers, validates their addresses and
//! persists the list as JSON. The connection hub reads enabled endpoints
//! through the [`EndpointRegistry`] trait.

pub mod store;
pub mod types;

pub use store::{EndpointRegistry, ServerStore, StoreError, default_servers_path};
pub use types::{Endpoint, EndpointError};
