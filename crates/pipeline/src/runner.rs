//! One request, start to finish.
//!
//! [`StreamService`] owns everything a job needs that outlives a single
//! channel: the processor registry, the resource provider and the shared
//! worker pool. Each call to [`StreamService::run_job`] admits the
//! request, opens the resource and streams results until completion or
//! disconnection.

use std::sync::Arc;

use reel_core::error::CoreError;
use reel_core::job::JobRequest;
use reel_core::message::ServerMessage;

use crate::admission::{admit, reject, AdmissionError};
use crate::channel::ResultChannel;
use crate::dispatcher::{DispatchOutcome, StreamDispatcher, DEFAULT_WINDOW};
use crate::pool::WorkerPool;
use crate::processor::{InvertVideoProcessor, ProcessorRegistry};
use crate::producer::{ResourceProvider, UnitProducer};

/// Per-job tuning shared by every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum units in flight for a single job.
    pub window: usize,
    /// Model used when a request does not name one.
    pub default_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            default_model: InvertVideoProcessor::NAME.to_string(),
        }
    }
}

/// How a request ended, from the server's point of view.
#[derive(Debug)]
pub enum JobOutcome {
    /// The request was refused; a rejection was sent if the channel was open.
    Rejected(CoreError),
    /// The job was acknowledged but its resource could not be opened. A
    /// terminal error was sent.
    ResourceUnavailable(CoreError),
    /// The dispatcher ran.
    Finished(DispatchOutcome),
    /// The peer disconnected before the job produced anything.
    ChannelClosed,
}

/// Runs admitted jobs against shared processors and workers.
pub struct StreamService {
    config: PipelineConfig,
    registry: ProcessorRegistry,
    provider: Arc<dyn ResourceProvider>,
    dispatcher: StreamDispatcher,
}

impl StreamService {
    pub fn new(
        config: PipelineConfig,
        registry: ProcessorRegistry,
        provider: Arc<dyn ResourceProvider>,
        pool: WorkerPool,
    ) -> Self {
        let dispatcher = StreamDispatcher::new(pool, config.window);
        Self {
            config,
            registry,
            provider,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Admit `request` and stream its results onto `channel`.
    pub async fn run_job<C>(&self, request: JobRequest, channel: &C) -> JobOutcome
    where
        C: ResultChannel + ?Sized,
    {
        let admitted = match admit(request, &self.config, &self.registry, channel).await {
            Ok(admitted) => admitted,
            Err(AdmissionError::Invalid { key, error }) => {
                // A closed channel simply means nobody is left to tell.
                let _ = reject(channel, key.as_deref(), &error).await;
                return JobOutcome::Rejected(error);
            }
            Err(AdmissionError::ChannelClosed) => return JobOutcome::ChannelClosed,
        };
        let job = admitted.job;

        let producer = match UnitProducer::open(self.provider.as_ref(), &job).await {
            Ok(producer) => producer,
            Err(e) => {
                tracing::warn!(key = %job.key, resource = %job.resource, error = %e, "Resource unavailable");
                if channel
                    .send(ServerMessage::terminal_error(&job.key, e.to_string()))
                    .await
                    .is_err()
                {
                    return JobOutcome::ChannelClosed;
                }
                return JobOutcome::ResourceUnavailable(e);
            }
        };

        let outcome = self
            .dispatcher
            .run(&job, producer, admitted.processor, channel)
            .await;

        tracing::info!(
            key = %job.key,
            emitted = outcome.emitted(),
            outcome = ?outcome,
            "Job finished",
        );
        JobOutcome::Finished(outcome)
    }
}
