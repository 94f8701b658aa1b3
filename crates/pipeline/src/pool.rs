//! Process-wide cap on concurrent unit processing.
//!
//! Every channel's dispatcher submits through the same [`WorkerPool`]; a
//! counting semaphore decides how many units are being processed at once
//! across all jobs.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use reel_core::unit::WorkUnit;

use crate::processor::{ProcessResult, ProcessingError, UnitProcessor};

/// Fixed-size pool of processing slots. Cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` slots (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a unit.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Process `unit` on its own task once a slot is free.
    ///
    /// Dropping the returned handle does not cancel the work; the result
    /// is simply discarded when it completes.
    pub fn submit(
        &self,
        processor: Arc<dyn UnitProcessor>,
        unit: WorkUnit,
    ) -> JoinHandle<ProcessResult> {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let index = unit.index;
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| ProcessingError::new(index, "worker pool is shut down"))?;
            processor.process(unit).await
        })
    }

    /// Refuse further work. Units already holding a slot finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}
