#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use reel_api::config::ServerConfig;
use reel_api::router::build_app_router;
use reel_api::state::AppState;
use reel_api::ws::ChannelManager;
use reel_core::error::CoreError;
use reel_core::unit::Frame;
use reel_pipeline::producer::{ReadOutcome, ResourceHandle};
use reel_pipeline::{ProcessorRegistry, ResourceProvider, StreamService, WorkerPool};

/// Reference the test provider refuses to open.
pub const MISSING_RESOURCE: &str = "missing.ogv";

/// Reference whose frames trickle out slowly, for disconnect tests.
pub const SLOW_RESOURCE: &str = "slow.ogv";

/// Frames served for every other reference.
pub const FRAMES_PER_RESOURCE: u64 = 250;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// the `echo` model by default and a small worker pool.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        worker_pool_size: 4,
        dispatch_window: 8,
        channel_buffer: 16,
        default_model: "echo".to_string(),
    }
}

// ---------------------------------------------------------------------------
// In-memory resource provider
// ---------------------------------------------------------------------------

/// Serves tiny 2x2 frames without touching ffmpeg.
pub struct TestProvider;

struct TestHandle {
    next: u64,
    delay: Option<Duration>,
}

#[async_trait]
impl ResourceHandle for TestHandle {
    async fn read_next(&mut self) -> Result<ReadOutcome, CoreError> {
        if self.next >= FRAMES_PER_RESOURCE {
            return Ok(ReadOutcome::EndOfResource);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next += 1;
        Ok(ReadOutcome::Frame(Frame::new(2, 2, vec![0; 12])))
    }

    fn unit_count_hint(&self) -> Option<u64> {
        Some(FRAMES_PER_RESOURCE)
    }
}

#[async_trait]
impl ResourceProvider for TestProvider {
    async fn open(&self, reference: &str) -> Result<Box<dyn ResourceHandle>, CoreError> {
        match reference {
            MISSING_RESOURCE => Err(CoreError::unavailable(reference, "No such file")),
            SLOW_RESOURCE => Ok(Box::new(TestHandle {
                next: 0,
                delay: Some(Duration::from_millis(20)),
            })),
            _ => Ok(Box::new(TestHandle {
                next: 0,
                delay: None,
            })),
        }
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Shared state wired to the in-memory provider and built-in processors.
pub fn build_test_state() -> AppState {
    let config = test_config();
    let streams = StreamService::new(
        config.pipeline_config(),
        ProcessorRegistry::with_builtins(),
        Arc::new(TestProvider),
        WorkerPool::new(config.worker_pool_size),
    );

    AppState {
        channels: Arc::new(ChannelManager::new(config.channel_buffer)),
        streams: Arc::new(streams),
        config: Arc::new(config),
    }
}

/// Build the full application router with all middleware layers.
pub fn build_test_app() -> Router {
    let state = build_test_state();
    let config = Arc::clone(&state.config);
    build_app_router(state, &config)
}

/// Serve the app on an ephemeral local port.
///
/// Returns the bound address and the state so tests can inspect the
/// channel registry while clients are connected.
pub async fn spawn_server() -> (SocketAddr, AppState) {
    let state = build_test_state();
    let app = build_app_router(state.clone(), &state.config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request through the router without a server.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
