//! Job admission requests and validation.
//!
//! A client opens a streaming job by sending a flat JSON object over its
//! channel. [`JobRequest`] is the lenient, as-received shape; validation
//! turns it into an immutable [`Job`] descriptor or a
//! [`CoreError::Validation`].

use serde::Deserialize;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length (bytes) of a resource reference.
pub const MAX_RESOURCE_LEN: usize = 128;

/// Maximum length (bytes) of a correlation key.
pub const MAX_KEY_LEN: usize = 256;

/// Maximum length (bytes) of a model name.
const MAX_MODEL_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An admission request exactly as it arrived on the wire.
///
/// Every field is optional so that a malformed request still yields its
/// correlation key (when present) for the rejection message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    /// Requested unit count. Kept as a raw JSON value so that negative or
    /// fractional counts surface as validation errors, not parse errors.
    #[serde(default)]
    pub count: Option<serde_json::Value>,
    #[serde(default)]
    pub model: Option<String>,
}

impl JobRequest {
    /// Parse a text or binary frame into a request.
    pub fn parse(raw: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(raw)
            .map_err(|e| CoreError::Validation(format!("Malformed job request: {e}")))
    }
}

/// An admitted streaming job. Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Client-supplied opaque correlation key.
    pub key: String,
    /// Path or identifier handed to the resource provider.
    pub resource: String,
    /// Upper bound on produced units; `None` means the whole resource.
    pub requested_units: Option<u64>,
    /// Lower-cased name of the processor that handles each unit.
    pub model: String,
    pub admitted_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a request and build the [`Job`] descriptor.
///
/// Rules:
/// - `key` must be present and at most [`MAX_KEY_LEN`] bytes. Uniqueness
///   is not checked.
/// - `resource` must be present, non-blank and at most
///   [`MAX_RESOURCE_LEN`] bytes.
/// - `count`, when present, must be a non-negative integer.
/// - `model`, when present, must be non-blank; otherwise `default_model`
///   is used.
pub fn validate_request(request: JobRequest, default_model: &str) -> Result<Job, CoreError> {
    let key = request
        .key
        .ok_or_else(|| CoreError::Validation("Job request is missing 'key'".to_string()))?;
    if key.len() > MAX_KEY_LEN {
        return Err(CoreError::Validation(format!(
            "Correlation key must not exceed {MAX_KEY_LEN} bytes"
        )));
    }

    let resource = request.resource.unwrap_or_default();
    if resource.trim().is_empty() {
        return Err(CoreError::Validation(
            "Resource reference must not be empty".to_string(),
        ));
    }
    if resource.len() > MAX_RESOURCE_LEN {
        return Err(CoreError::Validation(format!(
            "Resource reference must not exceed {MAX_RESOURCE_LEN} bytes"
        )));
    }

    let requested_units = match request.count {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(parse_count(&value)?),
    };

    let model = match request.model {
        Some(name) => validate_model_name(&name)?,
        None => default_model.to_lowercase(),
    };

    Ok(Job {
        key,
        resource,
        requested_units,
        model,
        admitted_at: chrono::Utc::now(),
    })
}

fn parse_count(value: &serde_json::Value) -> Result<u64, CoreError> {
    value.as_u64().ok_or_else(|| {
        CoreError::Validation(format!(
            "'count' must be a non-negative integer, got {value}"
        ))
    })
}

fn validate_model_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Model name must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_MODEL_LEN {
        return Err(CoreError::Validation(format!(
            "Model name must not exceed {MAX_MODEL_LEN} bytes"
        )));
    }
    Ok(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> JobRequest {
        JobRequest::parse(json.as_bytes()).unwrap()
    }

    #[test]
    fn valid_request_builds_job() {
        let job = validate_request(
            request(r#"{"key":"0","resource":"video.ogv","count":100}"#),
            "invert_video",
        )
        .unwrap();

        assert_eq!(job.key, "0");
        assert_eq!(job.resource, "video.ogv");
        assert_eq!(job.requested_units, Some(100));
        assert_eq!(job.model, "invert_video");
    }

    #[test]
    fn missing_count_means_whole_resource() {
        let job = validate_request(request(r#"{"key":"a","resource":"v.mp4"}"#), "echo").unwrap();
        assert_eq!(job.requested_units, None);
    }

    #[test]
    fn zero_count_is_accepted() {
        let job =
            validate_request(request(r#"{"key":"a","resource":"v","count":0}"#), "echo").unwrap();
        assert_eq!(job.requested_units, Some(0));
    }

    #[test]
    fn model_name_is_lowercased() {
        let job = validate_request(
            request(r#"{"key":"a","resource":"v","model":"InvertVideo"}"#),
            "echo",
        )
        .unwrap();
        assert_eq!(job.model, "invertvideo");
    }

    #[test]
    fn empty_resource_is_rejected() {
        let err = validate_request(request(r#"{"key":"a","resource":"  "}"#), "echo").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn missing_resource_is_rejected() {
        let err = validate_request(request(r#"{"key":"a"}"#), "echo").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn overlong_resource_is_rejected() {
        let long = "v".repeat(MAX_RESOURCE_LEN + 1);
        let req = JobRequest {
            key: Some("a".into()),
            resource: Some(long),
            ..Default::default()
        };
        assert!(matches!(
            validate_request(req, "echo"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = validate_request(request(r#"{"resource":"v"}"#), "echo").unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("key")));
    }

    #[test]
    fn negative_count_is_rejected() {
        let err =
            validate_request(request(r#"{"key":"a","resource":"v","count":-1}"#), "echo")
                .unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("count")));
    }

    #[test]
    fn fractional_and_string_counts_are_rejected() {
        for count in ["1.5", r#""10""#] {
            let json = format!(r#"{{"key":"a","resource":"v","count":{count}}}"#);
            assert!(
                validate_request(request(&json), "echo").is_err(),
                "count {count} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = JobRequest::parse(b"{not json").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
