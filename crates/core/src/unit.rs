//! Work units: the discrete pieces of input a job is split into.

use crate::types::SequenceIndex;

/// A decoded RGB24 video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Packed `R G B` bytes, row-major, no padding.
    pub data: Vec<u8>,
}

impl Frame {
    /// Bytes per pixel in the packed RGB24 layout.
    pub const CHANNELS: usize = 3;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Byte length a well-formed frame of these dimensions must have.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::CHANNELS
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == Self::expected_len(self.width, self.height)
    }
}

/// One unit of work within a job.
///
/// Owned by the producer until handed to a processor; never shared.
#[derive(Debug)]
pub struct WorkUnit {
    pub index: SequenceIndex,
    pub frame: Frame,
}
