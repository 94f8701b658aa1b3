use async_trait::async_trait;

use reel_core::unit::WorkUnit;

use super::{ModelMetadata, ProcessResult, ProcessingError, TensorMetadata, UnitProcessor};

/// Reports frame geometry without touching pixel data.
///
/// Useful for exercising the delivery path without codec cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProcessor;

impl EchoProcessor {
    pub const NAME: &'static str = "echo";
}

#[async_trait]
impl UnitProcessor for EchoProcessor {
    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: Self::NAME.to_string(),
            description: "Returns the dimensions and size of each frame".to_string(),
            inputs: vec![TensorMetadata::new("input", "STRING", &[1])],
            outputs: vec![TensorMetadata::new("output", "UINT32", &[3])],
        }
    }

    async fn process(&self, unit: WorkUnit) -> ProcessResult {
        if unit.frame.data.is_empty() {
            return Err(ProcessingError::new(unit.index, "empty frame"));
        }
        Ok(serde_json::json!({
            "width": unit.frame.width,
            "height": unit.frame.height,
            "bytes": unit.frame.data.len(),
        }))
    }
}
