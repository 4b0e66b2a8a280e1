//! Expression classification from mouth geometry.

use crate::thresholds::Thresholds;
use crate::types::{DetectedFace, KeypointName};
use serde::{Deserialize, Serialize};

/// Detected facial expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Smiling,
    Neutral,
}

/// Classify the expression of one face.
///
/// Computes mouth width (left-to-right corner distance) over mouth height
/// (top-to-bottom distance); a ratio above `smile_mouth_ratio` reads as
/// smiling. Requires all four mouth keypoints — any missing point, or a
/// degenerate mouth height, defaults to [`Expression::Neutral`].
pub fn classify_expression(face: &DetectedFace, thresholds: &Thresholds) -> Expression {
    let (Some(left), Some(right), Some(top), Some(bottom)) = (
        face.keypoint_pos(KeypointName::MouthLeft),
        face.keypoint_pos(KeypointName::MouthRight),
        face.keypoint_pos(KeypointName::MouthTop),
        face.keypoint_pos(KeypointName::MouthBottom),
    ) else {
        return Expression::Neutral;
    };

    let width = left.distance(&right);
    let height = top.distance(&bottom);
    if height <= f32::EPSILON {
        return Expression::Neutral;
    }

    if width / height > thresholds.smile_mouth_ratio {
        Expression::Smiling
    } else {
        Expression::Neutral
    }
}
