#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource unavailable: {reference}: {reason}")]
    ResourceUnavailable { reference: String, reason: String },

    #[error("Entity not found: {entity} named {name}")]
    NotFound { entity: &'static str, name: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::ResourceUnavailable`].
    pub fn unavailable(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::ResourceUnavailable {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}
