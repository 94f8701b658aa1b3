//! WebSocket channel infrastructure.
//!
//! Provides the channel registry, heartbeat monitoring, and the HTTP
//! upgrade handler that turns a connection into a streaming channel.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{BeginJobError, ChannelGuard, ChannelHandle, ChannelManager, JobChannel, JobId};
