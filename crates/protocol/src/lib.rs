//! Wire protocol types for the remote console.
//!
//! A [`Frame`] is the unit broadcast to servers over WebSocket sessions:
//! a `metadata` header plus an ordered list of `payload` entries.

pub mod builder;
pub mod frame;

pub use builder::FrameBuilder;
pub use frame::{Frame, FrameError, Metadata, Payload};
