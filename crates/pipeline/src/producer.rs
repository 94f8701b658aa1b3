//! Lazy, finite unit production over an external resource.
//!
//! A [`ResourceProvider`] resolves a reference into a [`ResourceHandle`]
//! that yields raw frames until [`ReadOutcome::EndOfResource`]. The
//! [`UnitProducer`] wraps one handle for one job: it numbers frames,
//! enforces the job's requested count, and never restarts.

use async_trait::async_trait;
use reel_core::error::CoreError;
use reel_core::job::Job;
use reel_core::types::SequenceIndex;
use reel_core::unit::{Frame, WorkUnit};

/// Result of reading from an open resource.
#[derive(Debug)]
pub enum ReadOutcome {
    Frame(Frame),
    EndOfResource,
}

/// An opened resource, read front to back exactly once.
#[async_trait]
pub trait ResourceHandle: Send {
    async fn read_next(&mut self) -> Result<ReadOutcome, CoreError>;

    /// Number of units the resource reports, if known up front.
    fn unit_count_hint(&self) -> Option<u64> {
        None
    }
}

/// Opens resource references into readable handles.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Fails with [`CoreError::ResourceUnavailable`] when the reference
    /// cannot be opened at all.
    async fn open(&self, reference: &str) -> Result<Box<dyn ResourceHandle>, CoreError>;
}

/// Next step of a [`UnitProducer`].
#[derive(Debug)]
pub enum NextUnit {
    Unit(WorkUnit),
    EndOfResource,
}

/// Yields at most `requested_units` work units for a single job.
pub struct UnitProducer {
    handle: Box<dyn ResourceHandle>,
    limit: Option<u64>,
    next_index: SequenceIndex,
    finished: bool,
}

impl UnitProducer {
    /// Open the job's resource. No unit is read yet.
    pub async fn open(provider: &dyn ResourceProvider, job: &Job) -> Result<Self, CoreError> {
        let handle = provider.open(&job.resource).await?;
        tracing::debug!(
            key = %job.key,
            resource = %job.resource,
            requested = ?job.requested_units,
            available = ?handle.unit_count_hint(),
            "Resource opened",
        );
        Ok(Self::new(handle, job.requested_units))
    }

    pub fn new(handle: Box<dyn ResourceHandle>, limit: Option<u64>) -> Self {
        Self {
            handle,
            limit,
            next_index: 0,
            finished: false,
        }
    }

    /// Pull the next unit.
    ///
    /// Once `EndOfResource` or an error has been returned, every later
    /// call returns `EndOfResource` without touching the resource.
    pub async fn next_unit(&mut self) -> Result<NextUnit, CoreError> {
        if self.finished || self.limit.is_some_and(|limit| self.next_index >= limit) {
            self.finished = true;
            return Ok(NextUnit::EndOfResource);
        }

        match self.handle.read_next().await {
            Ok(ReadOutcome::Frame(frame)) => {
                let unit = WorkUnit {
                    index: self.next_index,
                    frame,
                };
                self.next_index += 1;
                Ok(NextUnit::Unit(unit))
            }
            Ok(ReadOutcome::EndOfResource) => {
                self.finished = true;
                Ok(NextUnit::EndOfResource)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    /// Number of units yielded so far.
    pub fn produced(&self) -> u64 {
        self.next_index
    }
}
