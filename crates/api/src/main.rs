use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reel_api::config::ServerConfig;
use reel_api::router::build_app_router;
use reel_api::state::AppState;
use reel_api::ws;
use reel_pipeline::ffmpeg::FfmpegProvider;
use reel_pipeline::{ProcessorRegistry, StreamService, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reel_api=debug,reel_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        workers = config.worker_pool_size,
        window = config.dispatch_window,
        default_model = %config.default_model,
        "Loaded server configuration",
    );

    // --- Processors ---
    let registry = ProcessorRegistry::with_builtins();
    if registry.get(&config.default_model).is_none() {
        panic!(
            "DEFAULT_MODEL '{}' is not a registered model (known: {:?})",
            config.default_model,
            registry.names()
        );
    }

    // --- Stream service ---
    let pool = WorkerPool::new(config.worker_pool_size);
    let streams = Arc::new(StreamService::new(
        config.pipeline_config(),
        registry,
        Arc::new(FfmpegProvider::new()),
        pool.clone(),
    ));
    tracing::info!(workers = pool.size(), "Stream service ready");

    // --- Channel manager ---
    let channels = Arc::new(ws::ChannelManager::new(config.channel_buffer));

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&channels));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        channels: Arc::clone(&channels),
        streams,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let open = channels.connection_count().await;
    tracing::info!(open, "Closing remaining channels");
    channels.shutdown_all().await;

    let drained = channels
        .wait_for_jobs(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if drained {
        tracing::info!("All jobs stopped");
    } else {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Jobs still running at shutdown timeout"
        );
    }
    pool.close();

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
