//! Endpoint type and address validation.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Rejected endpoint configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EndpointError {
    #[error("endpoint name must not be empty")]
    EmptyName,

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("transport address must use ws or wss, got {0:?}")]
    TransportScheme(String),

    #[error("request address must use http or https, got {0:?}")]
    RequestScheme(String),

    #[error("an endpoint named {0:?} already exists")]
    DuplicateName(String),
}

/// A configured remote server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: Uuid,
    pub name: String,
    /// WebSocket address (`ws://` or `wss://`).
    #[serde(alias = "wsURL")]
    pub transport_address: Url,
    /// Base address for one-shot HTTP requests (`http://` or `https://`).
    #[serde(alias = "httpBaseURL")]
    pub request_address: Url,
    #[serde(alias = "isEnabled", default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Endpoint {
    /// Validates the addresses and creates an enabled endpoint with a fresh id.
    pub fn new(name: &str, transport: &str, request: &str) -> Result<Self, EndpointError> {
        let endpoint = Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            transport_address: parse_url(transport)?,
            request_address: parse_url(request)?,
            enabled: true,
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    /// Checks the name and address schemes.
    pub fn validate(&self) -> Result<(), EndpointError> {
        if self.name.trim().is_empty() {
            return Err(EndpointError::EmptyName);
        }
        match self.transport_address.scheme() {
            "ws" | "wss" => {}
            other => return Err(EndpointError::TransportScheme(other.to_string())),
        }
        match self.request_address.scheme() {
            "http" | "https" => {}
            other => return Err(EndpointError::RequestScheme(other.to_string())),
        }
        Ok(())
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

fn parse_url(s: &str) -> Result<Url, EndpointError> {
    Url::parse(s.trim()).map_err(|e| EndpointError::InvalidUrl {
        url: s.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_valid_addresses() {
        let ep = Endpoint::new("Local", "ws://localhost:8000/ws", "http://localhost:8000").unwrap();
        assert_eq!(ep.name, "Local");
        assert_eq!(ep.transport_address.as_str(), "ws://localhost:8000/ws");
        assert_eq!(ep.request_address.host_str(), Some("localhost"));
        assert!(ep.enabled);

        assert!(Endpoint::new("Secure", "wss://example.com/ws", "https://example.com").is_ok());
    }

    #[test]
    fn new_rejects_bad_input() {
        assert_eq!(
            Endpoint::new("  ", "ws://a/ws", "http://a").unwrap_err(),
            EndpointError::EmptyName
        );
        assert!(matches!(
            Endpoint::new("x", "not a url", "http://a"),
            Err(EndpointError::InvalidUrl { .. })
        ));
        assert_eq!(
            Endpoint::new("x", "http://a/ws", "http://a").unwrap_err(),
            EndpointError::TransportScheme("http".into())
        );
        assert_eq!(
            Endpoint::new("x", "ws://a/ws", "ftp://a").unwrap_err(),
            EndpointError::RequestScheme("ftp".into())
        );
    }

    #[test]
    fn json_uses_camel_case() {
        let ep = Endpoint::new("Local", "ws://localhost:8000/ws", "http://localhost:8000").unwrap();
        let v = serde_json::to_value(&ep).unwrap();
        assert_eq!(v["transportAddress"], "ws://localhost:8000/ws");
        assert_eq!(v["requestAddress"], "http://localhost:8000/");
        assert_eq!(v["enabled"], true);
    }

    #[test]
    fn json_accepts_legacy_field_names() {
        let text = r#"{
            "id": "0b6f1c1e-8a43-4c55-9a55-3f0f3c1d2e01",
            "name": "Legacy",
            "wsURL": "ws://10.0.0.2:8000/ws",
            "httpBaseURL": "http://10.0.0.2:8000",
            "isEnabled": false
        }"#;
        let ep: Endpoint = serde_json::from_str(text).unwrap();
        assert_eq!(ep.name, "Legacy");
        assert!(!ep.enabled);
        assert!(ep.validate().is_ok());
    }

    #[test]
    fn enabled_defaults_to_true() {
        let text = r#"{
            "id": "0b6f1c1e-8a43-4c55-9a55-3f0f3c1d2e01",
            "name": "X",
            "transportAddress": "ws://h/ws",
            "requestAddress": "http://h"
        }"#;
        let ep: Endpoint = serde_json::from_str(text).unwrap();
        assert!(ep.enabled);
    }
}
