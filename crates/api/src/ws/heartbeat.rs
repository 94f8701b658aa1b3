use std::sync::Arc;
use std::time::Duration;

use crate::ws::manager::ChannelManager;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that queues periodic Ping frames on every open
/// channel.
///
/// The task runs until aborted through the returned `JoinHandle`, which
/// happens during shutdown.
pub fn start_heartbeat(channels: Arc<ChannelManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            interval.tick().await;
            let count = channels.connection_count().await;
            tracing::debug!(count, "Channel heartbeat ping");
            channels.ping_all().await;
        }
    })
}
