//! Frame composition with the console's defaults.

use crate::frame::{Frame, Metadata, Payload};

/// Default sender identity for composed frames.
pub const DEFAULT_SENDER_ID: &str = "device-a";

/// Default frame type for composed frames.
pub const DEFAULT_FRAME_TYPE: &str = "event";

/// Incrementally assembles a [`Frame`].
///
/// Empty receiver or status strings are treated as unset. The timestamp is
/// taken when [`build`](Self::build) is called.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    sender_id: String,
    receiver_id: String,
    msg_type: String,
    status: String,
    message_id: String,
    payload: Vec<Payload>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self {
            sender_id: DEFAULT_SENDER_ID.into(),
            receiver_id: String::new(),
            msg_type: DEFAULT_FRAME_TYPE.into(),
            status: String::new(),
            message_id: uuid::Uuid::new_v4().to_string(),
            payload: Vec::new(),
        }
    }
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender_id(mut self, id: impl Into<String>) -> Self {
        self.sender_id = id.into();
        self
    }

    pub fn receiver_id(mut self, id: impl Into<String>) -> Self {
        self.receiver_id = id.into();
        self
    }

    pub fn msg_type(mut self, msg_type: impl Into<String>) -> Self {
        self.msg_type = msg_type.into();
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self
    }

    /// Replaces the message id with a fresh random one.
    pub fn regenerate_message_id(mut self) -> Self {
        self.message_id = uuid::Uuid::new_v4().to_string();
        self
    }

    /// Appends a payload entry.
    pub fn entry(
        mut self,
        datatype: impl Into<String>,
        value: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        self.payload.push(Payload::new(datatype, value, slug));
        self
    }

    /// Builds the frame, stamping it with the current time.
    pub fn build(&self) -> Frame {
        self.build_at(chrono::Utc::now().timestamp_millis())
    }

    /// Builds the frame with an explicit millisecond timestamp.
    pub fn build_at(&self, timestamp: i64) -> Frame {
        Frame {
            metadata: Metadata {
                sender_id: self.sender_id.clone(),
                receiver_id: non_empty(&self.receiver_id),
                timestamp,
                message_id: self.message_id.clone(),
                msg_type: self.msg_type.clone(),
                status: non_empty(&self.status),
            },
            payload: self.payload.clone(),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}
