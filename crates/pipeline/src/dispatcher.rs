//! Ordered streaming of unit results onto a channel.
//!
//! The dispatcher keeps a bounded window of in-flight units. Units are
//! processed concurrently on the [`WorkerPool`], but results are awaited
//! and emitted strictly from the front of the window, so emission order
//! is production order. A full window stops the dispatcher from pulling
//! further units, which couples producer pace to channel throughput.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::task::JoinHandle;

use reel_core::error::CoreError;
use reel_core::job::Job;
use reel_core::message::ServerMessage;
use reel_core::types::SequenceIndex;

use crate::channel::ResultChannel;
use crate::pool::WorkerPool;
use crate::processor::{ProcessResult, UnitProcessor};
use crate::producer::{NextUnit, UnitProducer};

/// Default number of units a single job may have in flight.
pub const DEFAULT_WINDOW: usize = 8;

/// How a dispatch run ended. `emitted` counts result messages delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The producer was exhausted and every result was delivered.
    Completed { emitted: u64 },
    /// The peer went away; remaining units were discarded.
    ChannelClosed { emitted: u64 },
    /// The resource failed mid-stream; a terminal error was sent after
    /// all earlier results.
    ResourceFailed { emitted: u64 },
}

impl DispatchOutcome {
    pub fn emitted(&self) -> u64 {
        match self {
            DispatchOutcome::Completed { emitted }
            | DispatchOutcome::ChannelClosed { emitted }
            | DispatchOutcome::ResourceFailed { emitted } => *emitted,
        }
    }
}

/// Drives producer -> processor -> channel for one job at a time.
#[derive(Clone)]
pub struct StreamDispatcher {
    pool: WorkerPool,
    window: usize,
}

impl StreamDispatcher {
    /// `window` is clamped to at least one unit.
    pub fn new(pool: WorkerPool, window: usize) -> Self {
        Self {
            pool,
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Run the job to completion or until the channel closes.
    ///
    /// Unit failures become error-kind results and never stop the job.
    pub async fn run<C>(
        &self,
        job: &Job,
        mut producer: UnitProducer,
        processor: Arc<dyn UnitProcessor>,
        channel: &C,
    ) -> DispatchOutcome
    where
        C: ResultChannel + ?Sized,
    {
        let mut in_flight: VecDeque<(SequenceIndex, JoinHandle<ProcessResult>)> =
            VecDeque::with_capacity(self.window);
        let mut emitted = 0u64;
        let mut exhausted = false;
        let mut read_error: Option<CoreError> = None;

        loop {
            // Refill the window.
            while !exhausted && in_flight.len() < self.window {
                if channel.is_closed() {
                    tracing::debug!(key = %job.key, emitted, "Channel closed, no further units");
                    return DispatchOutcome::ChannelClosed { emitted };
                }
                match producer.next_unit().await {
                    Ok(NextUnit::Unit(unit)) => {
                        let index = unit.index;
                        let handle = self.pool.submit(Arc::clone(&processor), unit);
                        in_flight.push_back((index, handle));
                    }
                    Ok(NextUnit::EndOfResource) => exhausted = true,
                    Err(e) => {
                        tracing::warn!(key = %job.key, error = %e, "Resource failed mid-stream");
                        exhausted = true;
                        read_error = Some(e);
                    }
                }
            }

            let Some((index, handle)) = in_flight.pop_front() else {
                break;
            };

            let message = match handle.await {
                Ok(Ok(data)) => ServerMessage::result(&job.key, index, data),
                Ok(Err(e)) => {
                    tracing::warn!(key = %job.key, index, error = %e.reason, "Unit processing failed");
                    ServerMessage::unit_error(&job.key, index, e.reason)
                }
                Err(e) => {
                    tracing::error!(key = %job.key, index, error = %e, "Unit task aborted");
                    ServerMessage::unit_error(&job.key, index, "processing task aborted")
                }
            };

            if channel.send(message).await.is_err() {
                // Dropping the remaining handles detaches their tasks.
                tracing::debug!(
                    key = %job.key,
                    emitted,
                    discarded = in_flight.len(),
                    "Channel closed mid-stream",
                );
                return DispatchOutcome::ChannelClosed { emitted };
            }
            emitted += 1;
        }

        if let Some(e) = read_error {
            let message = ServerMessage::terminal_error(&job.key, e.to_string());
            if channel.send(message).await.is_err() {
                return DispatchOutcome::ChannelClosed { emitted };
            }
            return DispatchOutcome::ResourceFailed { emitted };
        }

        DispatchOutcome::Completed { emitted }
    }
}
