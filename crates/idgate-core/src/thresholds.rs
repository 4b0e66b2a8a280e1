/// All heuristic thresholds in one immutable bundle.
///
/// Every evaluator takes a `&Thresholds` argument instead of reading
/// module-level constants, so individual limits can be overridden per
/// deployment or per test case. The defaults are the production values.
#[derive(Debug, Clone)]
pub struct Thresholds {
    /// Mouth width / mouth height ratio above which the expression is "smiling".
    pub smile_mouth_ratio: f32,

    /// Eyewear signal 1: eyebrow-to-eye vertical gap / face height.
    pub eyewear_brow_gap_ratio: f32,
    /// Eyewear signal 2: eye width (inner-to-outer corner) / face width.
    pub eyewear_eye_width_ratio: f32,
    /// Eyewear signal 3a: absolute left/right eye confidence difference.
    pub eyewear_confidence_asymmetry: f32,
    /// Eyewear signal 3b: mean eye confidence below this also fires signal 3.
    pub eyewear_low_eye_confidence: f32,
    /// Eyewear signal 4: outer-corner-to-outer-corner span / face width.
    pub eyewear_corner_span_ratio: f32,
    /// Points (out of 4) required to report eyewear as present.
    pub eyewear_min_score: u8,

    /// Face center must be within this fraction of frame width/height of the
    /// frame center, on both axes, to count as centered.
    pub centered_tolerance: f32,
    /// Acceptable band for face width as a fraction of frame width.
    pub face_width_min: f32,
    pub face_width_max: f32,
    /// Minimum aggregate quality score (multiple of 25) to permit capture.
    pub min_quality_score: u8,

    /// Manhattan displacement (pixels) between consecutive face positions
    /// above which the session is considered live.
    pub movement_threshold: f32,
    /// Capacity of the bounded movement history (FIFO).
    pub movement_history: usize,

    /// Acceptable mean brightness band, 0–255.
    pub min_brightness: f32,
    pub max_brightness: f32,
    /// Minimum contrast (max − min per-pixel brightness).
    pub min_contrast: f32,

    /// Maximum number of faces allowed in frame at capture time.
    pub max_faces: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            smile_mouth_ratio: 2.0,

            eyewear_brow_gap_ratio: 0.22,
            eyewear_eye_width_ratio: 0.30,
            eyewear_confidence_asymmetry: 0.25,
            eyewear_low_eye_confidence: 0.50,
            eyewear_corner_span_ratio: 0.80,
            eyewear_min_score: 2,

            centered_tolerance: 0.10,
            face_width_min: 0.30,
            face_width_max: 0.70,
            min_quality_score: 75,

            movement_threshold: 15.0,
            movement_history: 10,

            min_brightness: 60.0,
            max_brightness: 200.0,
            min_contrast: 40.0,

            max_faces: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let t = Thresholds::default();
        assert!(t.face_width_min < t.face_width_max);
        assert!(t.min_brightness < t.max_brightness);
        assert!(t.eyewear_min_score <= 4);
        assert_eq!(t.min_quality_score % 25, 0);
        assert!(t.movement_history >= 2);
    }
}
