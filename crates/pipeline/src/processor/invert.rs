use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use reel_core::job::MAX_RESOURCE_LEN;
use reel_core::unit::{Frame, WorkUnit};

use super::{ModelMetadata, ProcessResult, ProcessingError, TensorMetadata, UnitProcessor};
use crate::ffmpeg::{MAX_FRAME_HEIGHT, MAX_FRAME_WIDTH};

/// JPEG quality used for encoded result frames.
const JPEG_QUALITY: u8 = 90;

/// Prefix of every encoded frame payload.
const DATA_URI_PREFIX: &str = "data:image/jpg;base64,";

/// Inverts every pixel of a frame and returns it as a JPEG data URI.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvertVideoProcessor;

impl InvertVideoProcessor {
    pub const NAME: &'static str = "invert_video";
}

#[async_trait]
impl UnitProcessor for InvertVideoProcessor {
    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: Self::NAME.to_string(),
            description: "Streams the colour-inverted frames of a video".to_string(),
            inputs: vec![TensorMetadata::new(
                "input",
                "STRING",
                &[MAX_RESOURCE_LEN as u64],
            )],
            outputs: vec![TensorMetadata::new(
                "output",
                "INT8",
                &[MAX_FRAME_HEIGHT as u64, MAX_FRAME_WIDTH as u64, 3],
            )],
        }
    }

    async fn process(&self, unit: WorkUnit) -> ProcessResult {
        let index = unit.index;
        if !unit.frame.is_well_formed() {
            return Err(ProcessingError::new(
                index,
                format!(
                    "frame is {} bytes, expected {} for {}x{}",
                    unit.frame.data.len(),
                    Frame::expected_len(unit.frame.width, unit.frame.height),
                    unit.frame.width,
                    unit.frame.height,
                ),
            ));
        }

        // Encoding is CPU-bound; keep it off the async workers.
        let encoded = tokio::task::spawn_blocking(move || invert_and_encode(unit.frame))
            .await
            .map_err(|e| ProcessingError::new(index, format!("encoder task failed: {e}")))?
            .map_err(|e| ProcessingError::new(index, e))?;

        Ok(serde_json::json!({
            "img": encoded,
            "labels": [],
        }))
    }
}

fn invert_and_encode(mut frame: Frame) -> Result<String, String> {
    for byte in frame.data.iter_mut() {
        *byte = !*byte;
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| format!("jpeg encoding failed: {e}"))?;

    Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(&jpeg)))
}
