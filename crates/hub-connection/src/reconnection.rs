//! Reconnect procedure run after a connection's session fails.
//!
//! One cycle waits for the head of the delay schedule and then makes
//! exactly one connect attempt. If that attempt (or the session it opens)
//! fails later, a brand-new cycle starts from the first delay again.

use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use remotectl_hub_log::LogKind;
use remotectl_hub_servers::Endpoint;

use crate::hub::HubInner;
use crate::types::ReconnectConfig;

/// Waits for the cycle delay. Returns `false` when cancelled during the
/// wait or when reconnection is disabled.
pub(crate) async fn wait_for_retry(config: &ReconnectConfig, cancel: &CancellationToken) -> bool {
    let Some(delay) = config.cycle_delay() else {
        return false;
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => !cancel.is_cancelled(),
    }
}

/// Runs one reconnect cycle for the connection of `generation`.
///
/// Returns a boxed future to break the type cycle
/// `connect → schedule_reconnect → reconnect_cycle → connect`.
pub(crate) fn reconnect_cycle(
    hub: Weak<HubInner>,
    endpoint: Endpoint,
    generation: u64,
    cancel: CancellationToken,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let config = {
            let Some(inner) = hub.upgrade() else { return };
            let config = inner.config.reconnect.clone();
            match config.cycle_delay() {
                Some(delay) => inner.log(
                    Some(&endpoint.name),
                    LogKind::Info,
                    "WS reconnect",
                    format!("retry in {delay:?}"),
                ),
                None => debug!(endpoint = %endpoint.name, "reconnect disabled"),
            }
            config
        };

        if !wait_for_retry(&config, &cancel).await {
            debug!(endpoint = %endpoint.name, generation, "reconnect abandoned");
            return;
        }

        let Some(inner) = hub.upgrade() else { return };
        // Pick up an address edited while the connection was down.
        let endpoint = inner
            .registry()
            .and_then(|r| r.endpoint(endpoint.id))
            .unwrap_or(endpoint);
        debug!(endpoint = %endpoint.name, generation, "reconnect attempt");
        inner.connect(endpoint, Some(generation)).await;
    })
}
