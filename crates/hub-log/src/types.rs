//! Log event types and the sink contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogKind {
    /// Message received over a WebSocket session.
    Inbound,
    /// Frame transmitted over a WebSocket session.
    Outbound,
    HttpRequest,
    HttpResponse,
    Error,
    Info,
}

impl LogKind {
    pub const ALL: [LogKind; 6] = [
        LogKind::Inbound,
        LogKind::Outbound,
        LogKind::HttpRequest,
        LogKind::HttpResponse,
        LogKind::Error,
        LogKind::Info,
    ];

    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Inbound => "inbound",
            LogKind::Outbound => "outbound",
            LogKind::HttpRequest => "httpRequest",
            LogKind::HttpResponse => "httpResponse",
            LogKind::Error => "error",
            LogKind::Info => "info",
        }
    }

    /// Parses a wire name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A structured record of console activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Name of the endpoint involved; `None` for console-wide events.
    pub endpoint_name: Option<String>,
    pub kind: LogKind,
    pub title: String,
    pub body: String,
}

impl LogEvent {
    pub fn new(
        endpoint_name: Option<&str>,
        kind: LogKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_name: endpoint_name.map(str::to_string),
            kind,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A stored event with its identity and arrival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LogEvent,
}

impl LogEntry {
    pub fn new(event: LogEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: Utc::now(),
            event,
        }
    }

    /// Case-insensitive substring match over title, body and endpoint name.
    pub fn matches(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        self.event.title.to_lowercase().contains(&needle)
            || self.event.body.to_lowercase().contains(&needle)
            || self
                .event
                .endpoint_name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
    }
}

/// Append-only observer of log events.
pub trait EventSink: Send + Sync {
    fn add(&self, event: LogEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names() {
        for kind in LogKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(LogKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(LogKind::parse("HTTPREQUEST"), Some(LogKind::HttpRequest));
        assert_eq!(LogKind::parse("wsIn"), None);
    }

    #[test]
    fn entry_serializes_flat() {
        let entry = LogEntry::new(LogEvent::new(Some("Local"), LogKind::Info, "WS connect", "ws://x"));
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["endpointName"], "Local");
        assert_eq!(v["kind"], "info");
        assert_eq!(v["title"], "WS connect");
        assert!(v["id"].is_string());
        assert!(v["date"].is_string());
    }

    #[test]
    fn matches_is_case_insensitive() {
        let entry = LogEntry::new(LogEvent::new(Some("Kitchen"), LogKind::Inbound, "WS ←", "LED on"));
        assert!(entry.matches(""));
        assert!(entry.matches("led"));
        assert!(entry.matches("kitch"));
        assert!(entry.matches("ws"));
        assert!(!entry.matches("garage"));

        let global = LogEntry::new(LogEvent::new(None, LogKind::Info, "Frame preview", "{}"));
        assert!(!global.matches("kitchen"));
    }
}
