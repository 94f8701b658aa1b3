//! Turning a raw request into an admitted job.
//!
//! Admission validates the request, resolves its processor and then sends
//! the acknowledgment. Nothing is sent on failure; the caller reports the
//! rejection with [`reject`].

use std::sync::Arc;

use reel_core::error::CoreError;
use reel_core::job::{validate_request, Job, JobRequest};
use reel_core::message::ServerMessage;

use crate::channel::{ChannelClosed, ResultChannel};
use crate::processor::{ProcessorRegistry, UnitProcessor};
use crate::runner::PipelineConfig;

/// A validated job together with the processor that will handle it.
pub struct AdmittedJob {
    pub job: Job,
    pub processor: Arc<dyn UnitProcessor>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The request was refused. `key` is the request's key, if it had one.
    #[error("{error}")]
    Invalid {
        key: Option<String>,
        error: CoreError,
    },

    /// The job was valid but the acknowledgment could not be delivered.
    #[error("channel closed before the job was acknowledged")]
    ChannelClosed,
}

/// Validate `request`, resolve its model and acknowledge it on `channel`.
///
/// Once this returns `Ok`, the channel has seen exactly one
/// acknowledgment for the job and no results yet.
pub async fn admit<C>(
    request: JobRequest,
    config: &PipelineConfig,
    registry: &ProcessorRegistry,
    channel: &C,
) -> Result<AdmittedJob, AdmissionError>
where
    C: ResultChannel + ?Sized,
{
    let key = request.key.clone();
    let invalid = |error: CoreError| AdmissionError::Invalid {
        key: key.clone(),
        error,
    };

    let job = validate_request(request, &config.default_model).map_err(invalid)?;
    let processor = registry.resolve(&job.model).map_err(invalid)?;

    channel
        .send(ServerMessage::accepted(&job.key))
        .await
        .map_err(|ChannelClosed| AdmissionError::ChannelClosed)?;

    tracing::info!(
        key = %job.key,
        resource = %job.resource,
        model = %job.model,
        requested = ?job.requested_units,
        "Job accepted",
    );

    Ok(AdmittedJob { job, processor })
}

/// Send a rejection for a request that never became a job.
pub async fn reject<C>(
    channel: &C,
    key: Option<&str>,
    error: &CoreError,
) -> Result<(), ChannelClosed>
where
    C: ResultChannel + ?Sized,
{
    tracing::info!(key = ?key, error = %error, "Job rejected");
    channel.send(ServerMessage::rejected(key, error.to_string())).await
}
