//! Trait seams for frame acquisition and face analysis backends.
//!
//! The actual detection model (ONNX, a platform API, a remote service) is a
//! collaborator; this crate only defines the contract. Backends produce
//! [`DetectedFace`] values in the pixel space of the frame they analyzed.

use crate::types::{DetectedFace, FrameSize};
use thiserror::Error;

/// A packed RGB8 frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// `width * height * 3` bytes, row-major RGB.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("frame analysis failed: {0}")]
    Analysis(String),
    #[error("invalid frame: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
}

/// A face-detection backend.
///
/// The polling loop treats any error as "no faces detected for this cycle":
/// errors are logged and swallowed, never allowed to stop the loop.
pub trait FrameAnalyzer: Send {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, AnalyzerError>;
}

/// Stand-in for a backend that has not finished initializing: detects
/// nothing, never errors.
pub struct NullAnalyzer;

impl FrameAnalyzer for NullAnalyzer {
    fn analyze(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, AnalyzerError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("frame source exhausted")]
    Exhausted,
    #[error("frame source I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame source error: {0}")]
    Other(String),
}

/// A producer of frames, polled by the capture loop on its own interval.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_analyzer_detects_nothing() {
        let frame = Frame {
            data: vec![0u8; 12],
            width: 2,
            height: 2,
        };
        let faces = NullAnalyzer.analyze(&frame).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_frame_size() {
        let frame = Frame {
            data: vec![0u8; 640 * 480 * 3],
            width: 640,
            height: 480,
        };
        assert_eq!(frame.size(), FrameSize::new(640, 480));
    }
}
