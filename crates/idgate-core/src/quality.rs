//! Image-quality sub-checks and the aggregate score.

use crate::thresholds::Thresholds;
use crate::types::{DetectedFace, FrameSize};
use serde::{Deserialize, Serialize};

/// Four independent quality sub-checks for one face.
///
/// The aggregate [`score`](QualityReport::score) is the count of true checks
/// times 25, so always one of {0, 25, 50, 75, 100}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Face center within tolerance of the frame center on both axes.
    pub centered: bool,
    /// Face width within the configured fraction band of frame width.
    pub sized: bool,
    /// Head-tilt check; currently always passes.
    pub straight: bool,
    /// Sharpness check; currently always passes.
    pub sharp: bool,
}

impl QualityReport {
    /// Aggregate percentage score, a multiple of 25 in [0, 100].
    pub fn score(&self) -> u8 {
        [self.centered, self.sized, self.straight, self.sharp]
            .iter()
            .filter(|&&b| b)
            .count() as u8
            * 25
    }
}

/// Assess one face against the frame it was detected in.
pub fn assess_quality(face: &DetectedFace, frame: FrameSize, thresholds: &Thresholds) -> QualityReport {
    let face_center = face.bbox.center();
    let frame_center = frame.center();

    let centered = (face_center.x - frame_center.x).abs()
        <= thresholds.centered_tolerance * frame.width as f32
        && (face_center.y - frame_center.y).abs()
            <= thresholds.centered_tolerance * frame.height as f32;

    let width_ratio = if frame.width == 0 {
        0.0
    } else {
        face.bbox.width / frame.width as f32
    };
    let sized = width_ratio >= thresholds.face_width_min && width_ratio <= thresholds.face_width_max;

    // TODO: derive `straight` from the eye-line angle once analyzer keypoint
    // confidence is reliable enough; `sharp` needs a frame-buffer input.
    QualityReport {
        centered,
        sized,
        straight: true,
        sharp: true,
    }
}
