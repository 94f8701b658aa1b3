#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reel_core::error::CoreError;
use reel_core::job::JobRequest;
use reel_core::message::ServerMessage;
use reel_core::unit::{Frame, WorkUnit};
use reel_pipeline::pool::WorkerPool;
use reel_pipeline::processor::{ModelMetadata, ProcessResult, ProcessingError, ProcessorRegistry};
use reel_pipeline::producer::{ReadOutcome, ResourceHandle};
use reel_pipeline::{ChannelClosed, PipelineConfig, ResourceProvider, ResultChannel, StreamService, UnitProcessor};

/// Reference the test provider refuses to open.
pub const MISSING_RESOURCE: &str = "missing.ogv";

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// In-memory channel that records every delivered message.
///
/// With `close_after(n)` the channel accepts `n` messages and then behaves
/// like a disconnected peer.
#[derive(Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<ServerMessage>>,
    close_after: Option<usize>,
    closed: AtomicBool,
    /// Snapshot of `reads` taken at each result delivery.
    reads: Option<Arc<AtomicU64>>,
    reads_at_send: Mutex<Vec<(u64, u64)>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close_after(n: usize) -> Self {
        Self {
            close_after: Some(n),
            closed: AtomicBool::new(n == 0),
            ..Self::default()
        }
    }

    /// Record the provider's read count each time a result is delivered.
    pub fn watching_reads(reads: Arc<AtomicU64>) -> Self {
        Self {
            reads: Some(reads),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<ServerMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Indices of result messages, in delivery order.
    pub fn indices(&self) -> Vec<u64> {
        self.messages().iter().filter_map(ServerMessage::index).collect()
    }

    /// `(index, reads so far)` for each delivered result.
    pub fn reads_at_send(&self) -> Vec<(u64, u64)> {
        self.reads_at_send.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultChannel for RecordingChannel {
    async fn send(&self, message: ServerMessage) -> Result<(), ChannelClosed> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelClosed);
        }
        if let (Some(reads), Some(index)) = (&self.reads, message.index()) {
            self.reads_at_send
                .lock()
                .unwrap()
                .push((index, reads.load(Ordering::SeqCst)));
        }
        let mut messages = self.messages.lock().unwrap();
        messages.push(message);
        if self.close_after.is_some_and(|n| messages.len() >= n) {
            self.closed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Serves `frames` 1x1 frames for any reference except [`MISSING_RESOURCE`].
///
/// Frame `i` carries `i % 256` in its first byte. With `fail_after`, the
/// read following the last frame fails instead of ending the resource.
#[derive(Default)]
pub struct VecProvider {
    pub frames: u64,
    pub fail_after: bool,
    pub reads: Arc<AtomicU64>,
}

impl VecProvider {
    pub fn new(frames: u64) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    pub fn failing_after(frames: u64) -> Self {
        Self {
            frames,
            fail_after: true,
            ..Self::default()
        }
    }
}

struct VecHandle {
    next: u64,
    frames: u64,
    fail_after: bool,
    reads: Arc<AtomicU64>,
}

#[async_trait]
impl ResourceHandle for VecHandle {
    async fn read_next(&mut self) -> Result<ReadOutcome, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.next >= self.frames {
            if self.fail_after {
                return Err(CoreError::unavailable("test", "decoder crashed"));
            }
            return Ok(ReadOutcome::EndOfResource);
        }
        let tag = (self.next % 256) as u8;
        self.next += 1;
        Ok(ReadOutcome::Frame(Frame::new(1, 1, vec![tag, 0, 0])))
    }

    fn unit_count_hint(&self) -> Option<u64> {
        Some(self.frames)
    }
}

#[async_trait]
impl ResourceProvider for VecProvider {
    async fn open(&self, reference: &str) -> Result<Box<dyn ResourceHandle>, CoreError> {
        if reference == MISSING_RESOURCE {
            return Err(CoreError::unavailable(reference, "No such file"));
        }
        Ok(Box::new(VecHandle {
            next: 0,
            frames: self.frames,
            fail_after: self.fail_after,
            reads: Arc::clone(&self.reads),
        }))
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Processor with per-index delays and failures that tracks its peak
/// concurrency.
#[derive(Default)]
pub struct ScriptedProcessor {
    delays: HashMap<u64, Duration>,
    default_delay: Option<Duration>,
    failures: HashSet<u64>,
    fail_all: bool,
    running: AtomicUsize,
    peak: AtomicUsize,
    finished: Mutex<Vec<u64>>,
}

impl ScriptedProcessor {
    pub const NAME: &'static str = "scripted";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, index: u64, delay: Duration) -> Self {
        self.delays.insert(index, delay);
        self
    }

    pub fn delay_all(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn fail(mut self, index: u64) -> Self {
        self.failures.insert(index);
        self
    }

    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Highest number of units observed in `process` at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Unit indices in the order `process` returned them.
    pub fn finish_order(&self) -> Vec<u64> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl UnitProcessor for ScriptedProcessor {
    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: Self::NAME.to_string(),
            description: "test processor".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    async fn process(&self, unit: WorkUnit) -> ProcessResult {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(&unit.index).copied().or(self.default_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(unit.index);

        if self.fail_all || self.failures.contains(&unit.index) {
            return Err(ProcessingError::new(unit.index, "scripted failure"));
        }
        Ok(serde_json::json!({ "tag": unit.frame.data[0] }))
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// A service whose default model is `processor`, alongside the built-ins.
pub fn service(
    processor: Arc<ScriptedProcessor>,
    provider: VecProvider,
    window: usize,
    pool_size: usize,
) -> StreamService {
    let mut registry = ProcessorRegistry::with_builtins();
    registry.register(ScriptedProcessor::NAME, processor);
    StreamService::new(
        PipelineConfig {
            window,
            default_model: ScriptedProcessor::NAME.to_string(),
        },
        registry,
        Arc::new(provider),
        WorkerPool::new(pool_size),
    )
}

/// Parse a request from JSON text.
pub fn request(json: &str) -> JobRequest {
    JobRequest::parse(json.as_bytes()).unwrap()
}
