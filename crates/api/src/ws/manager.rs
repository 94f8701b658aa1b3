use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::Message;
use reel_core::message::{JobStatus, ServerMessage};
use reel_core::types::Timestamp;
use reel_pipeline::{ChannelClosed, ResultChannel};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Default depth of each channel's outbound queue.
pub const DEFAULT_CHANNEL_BUFFER: usize = 16;

/// Channel sender half for pushing frames to a WebSocket connection.
pub type ChannelSender = mpsc::Sender<Message>;

/// Identifies one job started through [`ChannelManager::begin_job`].
pub type JobId = u64;

/// The job currently streaming on a channel.
#[derive(Debug)]
struct ActiveJob {
    id: JobId,
    key: String,
}

/// Registry entry for a single open channel.
struct ChannelEntry {
    sender: ChannelSender,
    cancel: CancellationToken,
    active_job: Option<ActiveJob>,
    connected_at: Timestamp,
}

/// Why a job could not be started on a channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BeginJobError {
    #[error("a job is already active on this channel")]
    Busy { active: String },

    #[error("channel is not open")]
    NotOpen,
}

/// Manages all open streaming channels.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Job tasks are spawned through the
/// manager so shutdown can wait for them.
pub struct ChannelManager {
    channels: RwLock<HashMap<String, ChannelEntry>>,
    buffer: usize,
    jobs: TaskTracker,
    next_job_id: AtomicU64,
}

impl ChannelManager {
    /// Create an empty manager whose channels queue up to `buffer`
    /// outbound frames.
    pub fn new(buffer: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
            jobs: TaskTracker::new(),
            next_job_id: AtomicU64::new(1),
        }
    }

    /// Register a new channel.
    ///
    /// Returns the pipeline-facing handle, the receiver half the caller
    /// forwards to the WebSocket sink, and a guard that closes the channel
    /// when dropped.
    pub async fn open(
        self: &Arc<Self>,
        conn_id: String,
    ) -> (ChannelHandle, mpsc::Receiver<Message>, ChannelGuard) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let cancel = CancellationToken::new();
        let entry = ChannelEntry {
            sender: tx.clone(),
            cancel: cancel.clone(),
            active_job: None,
            connected_at: chrono::Utc::now(),
        };
        self.channels.write().await.insert(conn_id.clone(), entry);

        let handle = ChannelHandle {
            conn_id: conn_id.clone(),
            sender: tx,
            cancel: cancel.clone(),
        };
        let guard = ChannelGuard {
            conn_id,
            manager: Arc::clone(self),
            cancel,
            closed: false,
        };
        (handle, rx, guard)
    }

    /// Cancel and forget a channel. Repeated calls are no-ops.
    ///
    /// Returns `true` if the channel was open.
    pub async fn close(&self, conn_id: &str) -> bool {
        let removed = self.channels.write().await.remove(conn_id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                let open_for = chrono::Utc::now() - entry.connected_at;
                tracing::debug!(
                    conn_id = %conn_id,
                    open_ms = open_for.num_milliseconds(),
                    active_job = ?entry.active_job.as_ref().map(|job| &job.key),
                    "Channel closed",
                );
                true
            }
            None => false,
        }
    }

    /// Mark `key` as the active job on a channel.
    ///
    /// Fails if another job is still active there.
    pub async fn begin_job(&self, conn_id: &str, key: &str) -> Result<JobId, BeginJobError> {
        let mut channels = self.channels.write().await;
        let entry = channels.get_mut(conn_id).ok_or(BeginJobError::NotOpen)?;
        if let Some(active) = &entry.active_job {
            return Err(BeginJobError::Busy {
                active: active.key.clone(),
            });
        }
        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        entry.active_job = Some(ActiveJob {
            id,
            key: key.to_string(),
        });
        Ok(id)
    }

    /// Release job `id` on a channel.
    ///
    /// Returns `false` if the channel is gone or another job holds the slot.
    pub async fn end_job(&self, conn_id: &str, id: JobId) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get_mut(conn_id) {
            Some(entry) if entry.active_job.as_ref().is_some_and(|job| job.id == id) => {
                entry.active_job = None;
                true
            }
            _ => false,
        }
    }

    /// Correlation key of the job active on a channel.
    pub async fn active_job(&self, conn_id: &str) -> Option<String> {
        self.channels
            .read()
            .await
            .get(conn_id)
            .and_then(|entry| entry.active_job.as_ref().map(|job| job.key.clone()))
    }

    /// Run a job on the manager's task tracker.
    pub fn spawn_job<F>(&self, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.jobs.spawn(job)
    }

    /// Wait up to `timeout` for spawned jobs to finish.
    ///
    /// Returns `false` if some were still running when the timeout hit.
    pub async fn wait_for_jobs(&self, timeout: Duration) -> bool {
        self.jobs.close();
        tokio::time::timeout(timeout, self.jobs.wait()).await.is_ok()
    }

    /// Return the current number of open channels.
    pub async fn connection_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Queue a Ping frame on every open channel.
    ///
    /// Channels whose queue is full are skipped; they are plainly alive.
    pub async fn ping_all(&self) {
        let channels = self.channels.read().await;
        for entry in channels.values() {
            let _ = entry.sender.try_send(Message::Ping(Bytes::new()));
        }
    }

    /// Queue a Close frame on every channel, cancel it, then clear the map.
    ///
    /// Active jobs observe the cancellation exactly as they would a client
    /// disconnect.
    pub async fn shutdown_all(&self) {
        let mut channels = self.channels.write().await;
        let count = channels.len();
        for entry in channels.values() {
            let _ = entry.sender.try_send(Message::Close(None));
            entry.cancel.cancel();
        }
        channels.clear();
        tracing::info!(count, "Closed all channels");
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_BUFFER)
    }
}

// ---------------------------------------------------------------------------
// Channel handle
// ---------------------------------------------------------------------------

/// Sending side of one channel, handed to the job that streams on it.
#[derive(Clone)]
pub struct ChannelHandle {
    conn_id: String,
    sender: ChannelSender,
    cancel: CancellationToken,
}

impl ChannelHandle {
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Token cancelled when the channel closes for any reason.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
impl ResultChannel for ChannelHandle {
    /// Serialize `message` and queue it, suspending while the queue is full.
    ///
    /// Fails as soon as the channel is cancelled, even mid-wait.
    async fn send(&self, message: ServerMessage) -> Result<(), ChannelClosed> {
        let text = serde_json::to_string(&message).map_err(|e| {
            tracing::error!(conn_id = %self.conn_id, error = %e, "Failed to serialize message");
            ChannelClosed
        })?;

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ChannelClosed),
            sent = self.sender.send(Message::Text(text.into())) => sent.map_err(|_| ChannelClosed),
        }
    }

    fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Job channel
// ---------------------------------------------------------------------------

/// A [`ChannelHandle`] bound to one job.
///
/// The job's slot is released before a terminal message (`error` or
/// `rejected`) is queued, so a client reacting to it can start the next
/// job straight away.
pub struct JobChannel {
    handle: ChannelHandle,
    manager: Arc<ChannelManager>,
    id: JobId,
}

impl JobChannel {
    pub fn new(handle: ChannelHandle, manager: Arc<ChannelManager>, id: JobId) -> Self {
        Self {
            handle,
            manager,
            id,
        }
    }

    pub fn conn_id(&self) -> &str {
        self.handle.conn_id()
    }

    /// Release the job's slot. Idempotent.
    pub async fn release(&self) -> bool {
        self.manager.end_job(self.handle.conn_id(), self.id).await
    }
}

#[async_trait]
impl ResultChannel for JobChannel {
    async fn send(&self, message: ServerMessage) -> Result<(), ChannelClosed> {
        if matches!(
            message.status(),
            Some(JobStatus::Error | JobStatus::Rejected)
        ) {
            self.release().await;
        }
        self.handle.send(message).await
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Closes its channel when dropped.
///
/// Prefer [`ChannelGuard::close`]; the drop path only cancels
/// synchronously and removes the registry entry on a spawned task.
pub struct ChannelGuard {
    conn_id: String,
    manager: Arc<ChannelManager>,
    cancel: CancellationToken,
    closed: bool,
}

impl ChannelGuard {
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Close the channel and wait for it to leave the registry.
    pub async fn close(mut self) {
        self.closed = true;
        self.cancel.cancel();
        self.manager.close(&self.conn_id).await;
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.cancel.cancel();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let manager = Arc::clone(&self.manager);
            let conn_id = std::mem::take(&mut self.conn_id);
            runtime.spawn(async move {
                manager.close(&conn_id).await;
            });
        }
    }
}
