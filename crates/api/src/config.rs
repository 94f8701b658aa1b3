use std::str::FromStr;

use reel_pipeline::dispatcher::DEFAULT_WINDOW;
use reel_pipeline::processor::InvertVideoProcessor;
use reel_pipeline::PipelineConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8998`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running jobs to wind down (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Units processed concurrently across all channels.
    pub worker_pool_size: usize,
    /// Units a single job may have in flight (default: `8`).
    pub dispatch_window: usize,
    /// Outbound messages queued per channel before sends suspend (default: `16`).
    pub channel_buffer: usize,
    /// Model used when a request names none (default: `invert_video`).
    pub default_model: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `8998`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `10`                       |
    /// | `WORKER_POOL_SIZE`      | available parallelism      |
    /// | `DISPATCH_WINDOW`       | `8`                        |
    /// | `CHANNEL_BUFFER`        | `16`                       |
    /// | `DEFAULT_MODEL`         | `invert_video`             |
    ///
    /// Panics on unparseable numeric values; misconfiguration should fail
    /// at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let default_parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let default_model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| InvertVideoProcessor::NAME.into())
            .trim()
            .to_lowercase();

        Self {
            host,
            port: env_or("PORT", 8998),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 10),
            worker_pool_size: env_or("WORKER_POOL_SIZE", default_parallelism),
            dispatch_window: env_or("DISPATCH_WINDOW", DEFAULT_WINDOW),
            channel_buffer: env_or("CHANNEL_BUFFER", 16),
            default_model,
        }
    }

    /// Per-job settings handed to the stream service.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            window: self.dispatch_window,
            default_model: self.default_model.clone(),
        }
    }
}

/// Read and parse `name`, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
