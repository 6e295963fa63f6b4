fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use remotectl_hub_log::{LogEntry, LogKind};
    use remotectl_hub_servers::Endpoint;
    use remotectl_protocol::Frame;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (key order independent).
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  Rust:    {reserialized}"
        );
    }

    // --- Frames ---

    #[test]
    fn fixture_frame() {
        roundtrip_test::<Frame>("frame.json");
    }

    #[test]
    fn fixture_frame_with_nulls() {
        roundtrip_test::<Frame>("frame_nulls.json");
    }

    #[test]
    fn frame_compact_text_is_canonical() {
        let frame = Frame::from_json(&read_fixture("frame_nulls.json")).unwrap();
        assert_eq!(
            frame.to_json().unwrap(),
            r#"{"metadata":{"senderId":"device-a","receiverId":null,"timestamp":1734518400123,"messageId":"msg-1","type":"event","status":null},"payload":[]}"#
        );
    }

    #[test]
    fn frame_with_omitted_optionals_decodes() {
        let frame = Frame::from_json(&read_fixture("frame_omitted_optionals.json")).unwrap();
        assert!(frame.metadata.receiver_id.is_none());
        assert!(frame.metadata.status.is_none());
        assert_eq!(frame.payload.len(), 1);
        assert_eq!(frame.payload[0].slug, "armed");

        // Re-encoding spells the absent optionals out as null.
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert!(value["metadata"]["receiverId"].is_null());
        assert!(value["metadata"]["status"].is_null());
    }

    #[test]
    fn frame_preview_matches_compact_content() {
        let frame = Frame::from_json(&read_fixture("frame.json")).unwrap();
        let pretty: serde_json::Value =
            serde_json::from_str(&frame.to_pretty_json().unwrap()).unwrap();
        assert_eq!(pretty, load_fixture("frame.json"));
    }

    // --- Endpoints ---

    #[test]
    fn fixture_endpoints() {
        roundtrip_test::<Vec<Endpoint>>("endpoints.json");
    }

    #[test]
    fn legacy_endpoint_keys_decode() {
        let endpoints: Vec<Endpoint> =
            serde_json::from_str(&read_fixture("endpoints_legacy.json")).unwrap();
        assert_eq!(endpoints.len(), 2);

        let local = &endpoints[0];
        assert_eq!(
            local.id.to_string(),
            "6b1f8c3e-2d4a-4f5b-9c7d-1e2f3a4b5c6d"
        );
        assert_eq!(local.transport_address.as_str(), "ws://localhost:8000/ws");
        assert_eq!(local.request_address.as_str(), "http://localhost:8000/");
        assert!(local.enabled);

        // A missing flag means enabled.
        assert!(endpoints[1].enabled);
        assert_eq!(endpoints[1].transport_address.scheme(), "wss");
        for endpoint in &endpoints {
            endpoint.validate().unwrap();
        }
    }

    // --- Log entries ---

    #[test]
    fn fixture_log_entry() {
        let entry: LogEntry = serde_json::from_value(load_fixture("log_entry.json")).unwrap();
        assert_eq!(entry.event.kind, LogKind::HttpResponse);
        assert_eq!(entry.event.endpoint_name.as_deref(), Some("Local"));
        assert_eq!(entry.event.title, "HTTP ← 200");
        assert_eq!(entry.date.timestamp_millis(), 1_766_052_000_123);

        let again: LogEntry =
            serde_json::from_value(serde_json::to_value(&entry).unwrap()).unwrap();
        assert_eq!(again, entry);
    }

    #[test]
    fn log_kind_wire_names() {
        let names: Vec<String> = LogKind::ALL
            .iter()
            .map(|k| serde_json::to_value(k).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "inbound",
                "outbound",
                "httpRequest",
                "httpResponse",
                "error",
                "info"
            ]
        );
    }
}
