use std::sync::Arc;

use reel_pipeline::StreamService;

use crate::config::ServerConfig;
use crate::ws::ChannelManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Registry of open client channels and their active jobs.
    pub channels: Arc<ChannelManager>,
    /// Admission, production and dispatch for streaming jobs.
    pub streams: Arc<StreamService>,
}
