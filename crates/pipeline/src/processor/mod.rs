//! Unit processors and the model registry.
//!
//! A processor turns one [`WorkUnit`] into a JSON payload. Processors are
//! stateless across units, so one instance is shared by every job that
//! names it.

mod echo;
mod invert;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use reel_core::error::CoreError;
use reel_core::types::SequenceIndex;
use reel_core::unit::WorkUnit;

pub use echo::EchoProcessor;
pub use invert::InvertVideoProcessor;

/// A single unit failed. Recorded as that unit's result; the job continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unit {index} failed: {reason}")]
pub struct ProcessingError {
    pub index: SequenceIndex,
    pub reason: String,
}

impl ProcessingError {
    pub fn new(index: SequenceIndex, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Outcome of processing one unit.
pub type ProcessResult = Result<serde_json::Value, ProcessingError>;

/// Declared shape of one model input or output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorMetadata {
    pub name: String,
    pub datatype: String,
    pub shape: Vec<u64>,
}

impl TensorMetadata {
    pub fn new(name: &str, datatype: &str, shape: &[u64]) -> Self {
        Self {
            name: name.to_string(),
            datatype: datatype.to_string(),
            shape: shape.to_vec(),
        }
    }
}

/// Static description of a processor, served over REST.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub description: String,
    pub inputs: Vec<TensorMetadata>,
    pub outputs: Vec<TensorMetadata>,
}

/// Anything that can process a single work unit.
#[async_trait]
pub trait UnitProcessor: Send + Sync {
    fn metadata(&self) -> ModelMetadata;

    async fn process(&self, unit: WorkUnit) -> ProcessResult;
}

/// Maps lower-case model names to shared processors.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn UnitProcessor>>,
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in processor.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(InvertVideoProcessor::NAME, Arc::new(InvertVideoProcessor));
        registry.register(EchoProcessor::NAME, Arc::new(EchoProcessor));
        registry
    }

    /// Register (or replace) a processor under `name`.
    pub fn register(&mut self, name: &str, processor: Arc<dyn UnitProcessor>) {
        self.processors.insert(name.to_lowercase(), processor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn UnitProcessor>> {
        self.processors.get(&name.to_lowercase()).cloned()
    }

    /// Like [`get`](Self::get), but an unknown name is a validation error.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn UnitProcessor>, CoreError> {
        self.get(name)
            .ok_or_else(|| CoreError::Validation(format!("Unknown model '{name}'")))
    }

    pub fn metadata(&self, name: &str) -> Result<ModelMetadata, CoreError> {
        self.get(name)
            .map(|p| p.metadata())
            .ok_or_else(|| CoreError::NotFound {
                entity: "Model",
                name: name.to_string(),
            })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processors.keys().cloned().collect();
        names.sort();
        names
    }
}
