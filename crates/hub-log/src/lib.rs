//! Operator-facing event log.
//!
//! Every inbound, outbound and failed exchange is recorded as a
//! [`LogEvent`] through the [`EventSink`] trait. [`LogStore`] is the
//! in-memory sink: a bounded newest-first buffer with change notification.

pub mod buffer;
pub mod store;
pub mod types;

pub use buffer::RingBuffer;
pub use store::{DEFAULT_CAPACITY, LogStore};
pub use types::{EventSink, LogEntry, LogEvent, LogKind};
