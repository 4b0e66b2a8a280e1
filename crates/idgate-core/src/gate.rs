//! The capture gate: one boolean decision plus the highest-priority reason.

use crate::eyewear::detect_eyewear;
use crate::lighting::LightingSample;
use crate::quality::assess_quality;
use crate::thresholds::Thresholds;
use crate::types::{DetectedFace, FrameSize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why capture is currently blocked. Variants are declared in precedence
/// order; when several conditions fail at once, only the first is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NoFace,
    AwaitingLiveness,
    PoorLighting,
    LowQuality,
    TooManyFaces,
    EyewearDetected,
}

impl DenyReason {
    /// User-facing call-to-action label for the blocked capture button.
    pub fn call_to_action(&self) -> &'static str {
        match self {
            DenyReason::NoFace => "Position your face in the frame",
            DenyReason::AwaitingLiveness => "Move slightly to confirm liveness",
            DenyReason::PoorLighting => "Adjust your lighting",
            DenyReason::LowQuality => "Follow the photo guidelines",
            DenyReason::TooManyFaces => "Only one person in the frame",
            DenyReason::EyewearDetected => "Remove your glasses",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.call_to_action())
    }
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied(DenyReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            GateDecision::Allowed => None,
            GateDecision::Denied(reason) => Some(*reason),
        }
    }
}

/// Combine the latest pipeline outputs into a single capture decision.
///
/// Capture is permitted only when all of: at least one face, liveness
/// confirmed, a good lighting sample, quality score at or above the minimum
/// for the primary face, face count within the cap, and no eyewear detected
/// on any face. `lighting == None` (no sample taken yet) reads as poor
/// lighting.
pub fn evaluate_gate(
    faces: &[DetectedFace],
    lighting: Option<&LightingSample>,
    live: bool,
    frame: FrameSize,
    thresholds: &Thresholds,
) -> GateDecision {
    if faces.is_empty() {
        return GateDecision::Denied(DenyReason::NoFace);
    }

    if !live {
        return GateDecision::Denied(DenyReason::AwaitingLiveness);
    }

    match lighting {
        Some(sample) if sample.is_good(thresholds) => {}
        _ => return GateDecision::Denied(DenyReason::PoorLighting),
    }

    let primary = &faces[0];
    if assess_quality(primary, frame, thresholds).score() < thresholds.min_quality_score {
        return GateDecision::Denied(DenyReason::LowQuality);
    }

    if faces.len() > thresholds.max_faces {
        return GateDecision::Denied(DenyReason::TooManyFaces);
    }

    if faces
        .iter()
        .any(|face| detect_eyewear(face, thresholds).present)
    {
        return GateDecision::Denied(DenyReason::EyewearDetected);
    }

    GateDecision::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, KeypointName};

    const FRAME: FrameSize = FrameSize {
        width: 640,
        height: 480,
    };

    fn good_lighting() -> LightingSample {
        LightingSample {
            brightness: 120.0,
            contrast: 90.0,
        }
    }

    /// Centered, correctly-sized face with no eyewear signals.
    fn good_face() -> DetectedFace {
        DetectedFace::new(
            BoundingBox {
                x: 170.0,
                y: 90.0,
                width: 300.0,
                height: 300.0,
            },
            0.95,
        )
    }

    /// A face with enough eyewear signals to report glasses.
    fn glasses_face() -> DetectedFace {
        good_face()
            .with_keypoint(KeypointName::LeftEyeCenter, 250.0, 200.0, 0.95)
            .with_keypoint(KeypointName::RightEyeCenter, 390.0, 200.0, 0.30)
            .with_keypoint(KeypointName::LeftEyeOuter, 180.0, 200.0, 0.9)
            .with_keypoint(KeypointName::RightEyeOuter, 460.0, 200.0, 0.9)
    }

    #[test]
    fn test_all_conditions_met() {
        let faces = vec![good_face()];
        let lighting = good_lighting();
        let decision = evaluate_gate(&faces, Some(&lighting), true, FRAME, &Thresholds::default());
        assert!(decision.is_allowed());
        assert_eq!(decision.reason(), None);
    }

    #[test]
    fn test_no_face_highest_priority() {
        // Everything else bad too — but no-face wins
        let decision = evaluate_gate(&[], None, false, FRAME, &Thresholds::default());
        assert_eq!(decision.reason(), Some(DenyReason::NoFace));
    }

    #[test]
    fn test_liveness_before_lighting() {
        let faces = vec![good_face()];
        let decision = evaluate_gate(&faces, None, false, FRAME, &Thresholds::default());
        assert_eq!(decision.reason(), Some(DenyReason::AwaitingLiveness));
    }

    #[test]
    fn test_missing_lighting_sample_blocks() {
        let faces = vec![good_face()];
        let decision = evaluate_gate(&faces, None, true, FRAME, &Thresholds::default());
        assert_eq!(decision.reason(), Some(DenyReason::PoorLighting));
    }

    #[test]
    fn test_bad_lighting_blocks() {
        let faces = vec![good_face()];
        let dark = LightingSample {
            brightness: 20.0,
            contrast: 90.0,
        };
        let decision = evaluate_gate(&faces, Some(&dark), true, FRAME, &Thresholds::default());
        assert_eq!(decision.reason(), Some(DenyReason::PoorLighting));
    }

    #[test]
    fn test_low_quality_blocks() {
        // Off-center face: centered fails → score 75 is still allowed,
        // so also shrink it to fail sized → score 50
        let small_corner_face = DetectedFace::new(
            BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 80.0,
                height: 80.0,
            },
            0.9,
        );
        let faces = vec![small_corner_face];
        let lighting = good_lighting();
        let decision = evaluate_gate(&faces, Some(&lighting), true, FRAME, &Thresholds::default());
        assert_eq!(decision.reason(), Some(DenyReason::LowQuality));
    }

    #[test]
    fn test_quality_threshold_is_inclusive() {
        // Centered but slightly small → 75, which passes the >= 75 bar
        let face = DetectedFace::new(
            BoundingBox {
                x: 230.0,
                y: 150.0,
                width: 180.0, // ratio 0.28 < 0.30 → sized fails
                height: 180.0,
            },
            0.9,
        );
        let lighting = good_lighting();
        let decision =
            evaluate_gate(&[face], Some(&lighting), true, FRAME, &Thresholds::default());
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_too_many_faces_blocks() {
        let faces = vec![good_face(), good_face()];
        let lighting = good_lighting();
        let decision = evaluate_gate(&faces, Some(&lighting), true, FRAME, &Thresholds::default());
        assert_eq!(decision.reason(), Some(DenyReason::TooManyFaces));
    }

    #[test]
    fn test_eyewear_blocks() {
        let faces = vec![glasses_face()];
        let lighting = good_lighting();
        let decision = evaluate_gate(&faces, Some(&lighting), true, FRAME, &Thresholds::default());
        assert_eq!(decision.reason(), Some(DenyReason::EyewearDetected));
    }

    #[test]
    fn test_precedence_quality_before_face_count() {
        let small = DetectedFace::new(
            BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 80.0,
                height: 80.0,
            },
            0.9,
        );
        let faces = vec![small, good_face()];
        let lighting = good_lighting();
        let decision = evaluate_gate(&faces, Some(&lighting), true, FRAME, &Thresholds::default());
        assert_eq!(decision.reason(), Some(DenyReason::LowQuality));
    }

    #[test]
    fn test_call_to_action_labels() {
        assert_eq!(
            DenyReason::EyewearDetected.to_string(),
            "Remove your glasses"
        );
        assert_eq!(DenyReason::NoFace.to_string(), "Position your face in the frame");
    }
}
