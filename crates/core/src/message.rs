//! Outbound channel messages.
//!
//! Every message is a flat JSON object keyed by the job's correlation key:
//!
//! ```text
//! {"key": "0", "status": "accepted"}                      acknowledgment
//! {"key": "0", "index": 4, "data": {"img": "data:..."}}    unit result
//! {"key": "0", "index": 5, "data": {"error": "..."}}       unit failure
//! {"key": "0", "status": "error", "error": "..."}          terminal job error
//! {"key": null, "status": "rejected", "error": "..."}      request refused
//! ```

use serde::Serialize;

use crate::types::SequenceIndex;

/// Status carried by non-result messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// The job was admitted; results follow.
    Accepted,
    /// The job was aborted after admission; nothing follows.
    Error,
    /// The request was refused; no job exists.
    Rejected,
}

/// A message emitted by the server over a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Status {
        key: Option<String>,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Result {
        key: String,
        index: SequenceIndex,
        data: serde_json::Value,
    },
    /// A unit that failed to process. Serializes like a result whose
    /// `data` is `{"error": <reason>}`.
    UnitError {
        key: String,
        index: SequenceIndex,
        data: UnitFailure,
    },
}

/// Payload of a [`ServerMessage::UnitError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub error: String,
}

impl ServerMessage {
    pub fn accepted(key: &str) -> Self {
        ServerMessage::Status {
            key: Some(key.to_string()),
            status: JobStatus::Accepted,
            error: None,
        }
    }

    pub fn terminal_error(key: &str, reason: impl Into<String>) -> Self {
        ServerMessage::Status {
            key: Some(key.to_string()),
            status: JobStatus::Error,
            error: Some(reason.into()),
        }
    }

    pub fn rejected(key: Option<&str>, reason: impl Into<String>) -> Self {
        ServerMessage::Status {
            key: key.map(str::to_string),
            status: JobStatus::Rejected,
            error: Some(reason.into()),
        }
    }

    pub fn result(key: &str, index: SequenceIndex, data: serde_json::Value) -> Self {
        ServerMessage::Result {
            key: key.to_string(),
            index,
            data,
        }
    }

    /// A result whose payload is replaced by an error indicator.
    pub fn unit_error(key: &str, index: SequenceIndex, reason: impl Into<String>) -> Self {
        ServerMessage::UnitError {
            key: key.to_string(),
            index,
            data: UnitFailure {
                error: reason.into(),
            },
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            ServerMessage::Status { key, .. } => key.as_deref(),
            ServerMessage::Result { key, .. } | ServerMessage::UnitError { key, .. } => Some(key),
        }
    }

    /// Sequence index, for result messages only.
    pub fn index(&self) -> Option<SequenceIndex> {
        match self {
            ServerMessage::Result { index, .. } | ServerMessage::UnitError { index, .. } => {
                Some(*index)
            }
            ServerMessage::Status { .. } => None,
        }
    }

    pub fn status(&self) -> Option<JobStatus> {
        match self {
            ServerMessage::Status { status, .. } => Some(*status),
            ServerMessage::Result { .. } | ServerMessage::UnitError { .. } => None,
        }
    }

    /// True for per-unit failures.
    pub fn is_unit_error(&self) -> bool {
        matches!(self, ServerMessage::UnitError { .. })
    }
}
