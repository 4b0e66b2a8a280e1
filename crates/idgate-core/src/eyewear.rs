//! Eyewear presence via a point-scoring heuristic.
//!
//! Glasses distort several independent properties of detected eye keypoints:
//! frames push the apparent eyebrow line up, lenses widen the detected eye
//! region, reflections degrade and unbalance eye confidence, and thick rims
//! stretch the detected corner span. No single signal is reliable on its
//! own, so each contributes one point and eyewear is reported only when
//! enough of them agree.

use crate::thresholds::Thresholds;
use crate::types::{DetectedFace, KeypointName};
use serde::{Deserialize, Serialize};

/// Outcome of the eyewear heuristic for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyewearReport {
    /// Number of signals that fired, in [0, 4].
    pub score: u8,
    /// True once `score` reaches the configured minimum (default 2).
    pub present: bool,
}

/// Run all four eyewear signals against one face.
///
/// A signal whose required keypoints are missing is skipped — it neither
/// contributes a point nor errors. A face with no usable eye keypoints at
/// all therefore scores 0 and reports no eyewear.
pub fn detect_eyewear(face: &DetectedFace, thresholds: &Thresholds) -> EyewearReport {
    let mut score = 0u8;

    if signal_brow_gap(face, thresholds) == Some(true) {
        score += 1;
    }
    if signal_eye_width(face, thresholds) == Some(true) {
        score += 1;
    }
    if signal_eye_confidence(face, thresholds) == Some(true) {
        score += 1;
    }
    if signal_corner_span(face, thresholds) == Some(true) {
        score += 1;
    }

    EyewearReport {
        score,
        present: score >= thresholds.eyewear_min_score,
    }
}

/// Signal 1: vertical gap between eyebrow reference point and eye center,
/// normalized by face height. Frames sit between brow and eye and inflate it.
/// Uses whichever sides have both points; `None` when neither side does.
fn signal_brow_gap(face: &DetectedFace, t: &Thresholds) -> Option<bool> {
    if face.bbox.height <= f32::EPSILON {
        return None;
    }

    let sides = [
        (KeypointName::LeftEyebrow, KeypointName::LeftEyeCenter),
        (KeypointName::RightEyebrow, KeypointName::RightEyeCenter),
    ];

    let mut total = 0.0f32;
    let mut count = 0usize;
    for (brow, eye) in sides {
        if let (Some(b), Some(e)) = (face.keypoint_pos(brow), face.keypoint_pos(eye)) {
            total += e.y - b.y;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }

    let mean_gap = total / count as f32;
    Some(mean_gap / face.bbox.height > t.eyewear_brow_gap_ratio)
}

/// Signal 2: detected eye width (inner-to-outer corner) relative to face
/// width. Lens edges are commonly picked up as eye corners.
fn signal_eye_width(face: &DetectedFace, t: &Thresholds) -> Option<bool> {
    if face.bbox.width <= f32::EPSILON {
        return None;
    }

    let sides = [
        (KeypointName::LeftEyeInner, KeypointName::LeftEyeOuter),
        (KeypointName::RightEyeInner, KeypointName::RightEyeOuter),
    ];

    let mut total = 0.0f32;
    let mut count = 0usize;
    for (inner, outer) in sides {
        if let (Some(i), Some(o)) = (face.keypoint_pos(inner), face.keypoint_pos(outer)) {
            total += i.distance(&o);
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }

    let mean_width = total / count as f32;
    Some(mean_width / face.bbox.width > t.eyewear_eye_width_ratio)
}

/// Signal 3: left/right eye confidence asymmetry, or low mean confidence.
/// Reflections off a lens typically degrade one eye more than the other.
fn signal_eye_confidence(face: &DetectedFace, t: &Thresholds) -> Option<bool> {
    let left = face.keypoint(KeypointName::LeftEyeCenter)?.confidence;
    let right = face.keypoint(KeypointName::RightEyeCenter)?.confidence;

    let asymmetric = (left - right).abs() > t.eyewear_confidence_asymmetry;
    let weak = (left + right) / 2.0 < t.eyewear_low_eye_confidence;
    Some(asymmetric || weak)
}

/// Signal 4: outer-corner span relative to face width. Rims stretch the span
/// toward the temples.
fn signal_corner_span(face: &DetectedFace, t: &Thresholds) -> Option<bool> {
    if face.bbox.width <= f32::EPSILON {
        return None;
    }
    let left = face.keypoint_pos(KeypointName::LeftEyeOuter)?;
    let right = face.keypoint_pos(KeypointName::RightEyeOuter)?;
    Some(left.distance(&right) / face.bbox.width > t.eyewear_corner_span_ratio)
}
