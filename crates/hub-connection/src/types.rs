//! Public types for the connection hub.

use std::time::Duration;

use uuid::Uuid;

/// Lifecycle state of one endpoint's connection.
///
/// `Connecting → Connected → (Reconnecting → Connecting → Connected)*`.
/// `Disconnected` is only reached through an explicit disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// WebSocket handshake in progress.
    Connecting,
    /// Session open, listener running.
    Connected,
    /// Session lost, waiting to retry.
    Reconnecting,
    /// No connection exists for the endpoint.
    Disconnected,
}

/// Events emitted by the hub for interested observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection state changed for an endpoint.
    StateChanged {
        endpoint_id: Uuid,
        state: ConnectionState,
    },
}

/// Delays used by the reconnect procedure.
///
/// Each reconnect cycle waits for the first delay of the schedule and then
/// makes a single connect attempt. A later failure starts a new cycle from
/// the head of the schedule again, so the remaining entries are never
/// reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub schedule: Vec<Duration>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            schedule: [1, 2, 5, 10, 20]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}

impl ReconnectConfig {
    /// Delay to wait before the attempt of a reconnect cycle.
    ///
    /// `None` disables automatic reconnection.
    pub fn cycle_delay(&self) -> Option<Duration> {
        self.schedule.first().copied()
    }
}

/// Hub tuning.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HubConfig {
    pub reconnect: ReconnectConfig,
    /// Interval between keepalive pings; `None` sends none.
    pub keepalive: Option<Duration>,
    /// Upper bound for incoming messages and frames; `None` keeps the
    /// transport's default.
    pub max_message_size: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(ConnectionState::Connected, ConnectionState::Connecting);
        assert_ne!(ConnectionState::Reconnecting, ConnectionState::Disconnected);
    }

    #[test]
    fn reconnect_config_defaults() {
        let config = ReconnectConfig::default();
        let secs: Vec<u64> = config.schedule.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![1, 2, 5, 10, 20]);
    }

    #[test]
    fn cycle_delay_is_head_of_schedule() {
        let config = ReconnectConfig::default();
        assert_eq!(config.cycle_delay(), Some(Duration::from_secs(1)));

        let custom = ReconnectConfig {
            schedule: vec![Duration::from_millis(50), Duration::from_secs(9)],
        };
        assert_eq!(custom.cycle_delay(), Some(Duration::from_millis(50)));

        let disabled = ReconnectConfig { schedule: vec![] };
        assert_eq!(disabled.cycle_delay(), None);
    }

    #[test]
    fn hub_config_default() {
        let config = HubConfig::default();
        assert_eq!(config.reconnect, ReconnectConfig::default());
        assert!(config.keepalive.is_none());
        assert!(config.max_message_size.is_none());
    }
}
