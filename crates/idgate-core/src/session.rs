//! Per-session capture state: latest detections, lighting, liveness.
//!
//! Mirrors the event-loop model of the capture UI: two independent tickers
//! (frame analysis and lighting sampling) feed observations in, and the gate
//! decision is recomputed from whatever state is current. All mutation goes
//! through one owner, so no locking is needed here.

use crate::gate::{evaluate_gate, GateDecision};
use crate::lighting::LightingSample;
use crate::liveness::LivenessTracker;
use crate::thresholds::Thresholds;
use crate::types::{DetectedFace, FrameSize};

pub struct CaptureSession {
    thresholds: Thresholds,
    frame: FrameSize,
    faces: Vec<DetectedFace>,
    lighting: Option<LightingSample>,
    liveness: LivenessTracker,
}

impl CaptureSession {
    pub fn new(frame: FrameSize, thresholds: Thresholds) -> Self {
        let liveness = LivenessTracker::new(&thresholds);
        Self {
            thresholds,
            frame,
            faces: Vec::new(),
            lighting: None,
            liveness,
        }
    }

    /// Record the detections of one analysis cycle, replacing the previous
    /// cycle's faces. The primary (first) face feeds the liveness tracker.
    pub fn observe_faces(&mut self, faces: Vec<DetectedFace>) {
        if let Some(primary) = faces.first() {
            self.liveness.observe(primary.bbox.center());
        }
        self.faces = faces;
    }

    /// Record one lighting sample, fully replacing the previous one.
    pub fn observe_lighting(&mut self, sample: LightingSample) {
        self.lighting = Some(sample);
    }

    /// Current gate decision over the latest observations.
    pub fn decision(&self) -> GateDecision {
        evaluate_gate(
            &self.faces,
            self.lighting.as_ref(),
            self.liveness.is_live(),
            self.frame,
            &self.thresholds,
        )
    }

    pub fn is_live(&self) -> bool {
        self.liveness.is_live()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn primary_face(&self) -> Option<&DetectedFace> {
        self.faces.first()
    }

    pub fn lighting(&self) -> Option<&LightingSample> {
        self.lighting.as_ref()
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// The retake transition: discard the pending capture context and
    /// require liveness to be re-confirmed. Detections and lighting refresh
    /// on their own tickers.
    pub fn retake(&mut self) {
        self.liveness.reset();
        self.faces.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::DenyReason;
    use crate::types::BoundingBox;

    fn frame() -> FrameSize {
        FrameSize::new(640, 480)
    }

    fn centered_face(offset_x: f32) -> DetectedFace {
        DetectedFace::new(
            BoundingBox {
                x: 170.0 + offset_x,
                y: 90.0,
                width: 300.0,
                height: 300.0,
            },
            0.95,
        )
    }

    fn good_lighting() -> LightingSample {
        LightingSample {
            brightness: 120.0,
            contrast: 90.0,
        }
    }

    #[test]
    fn test_fresh_session_denies_no_face() {
        let session = CaptureSession::new(frame(), Thresholds::default());
        assert_eq!(session.decision().reason(), Some(DenyReason::NoFace));
    }

    #[test]
    fn test_full_flow_to_allowed() {
        let mut session = CaptureSession::new(frame(), Thresholds::default());

        session.observe_lighting(good_lighting());
        session.observe_faces(vec![centered_face(0.0)]);
        assert_eq!(
            session.decision().reason(),
            Some(DenyReason::AwaitingLiveness)
        );

        // Movement beyond the threshold confirms liveness
        session.observe_faces(vec![centered_face(20.0)]);
        assert!(session.is_live());
        assert!(session.decision().is_allowed());
    }

    #[test]
    fn test_observation_order_is_irrelevant() {
        // Lighting sample may land before or after detections
        let mut session = CaptureSession::new(frame(), Thresholds::default());
        session.observe_faces(vec![centered_face(0.0)]);
        session.observe_faces(vec![centered_face(20.0)]);
        session.observe_lighting(good_lighting());
        assert!(session.decision().is_allowed());
    }

    #[test]
    fn test_faces_replaced_each_cycle() {
        let mut session = CaptureSession::new(frame(), Thresholds::default());
        session.observe_faces(vec![centered_face(0.0), centered_face(5.0)]);
        assert_eq!(session.face_count(), 2);
        session.observe_faces(vec![centered_face(0.0)]);
        assert_eq!(session.face_count(), 1);
        session.observe_faces(Vec::new());
        assert_eq!(session.face_count(), 0);
        assert_eq!(session.decision().reason(), Some(DenyReason::NoFace));
    }

    #[test]
    fn test_retake_requires_new_liveness() {
        let mut session = CaptureSession::new(frame(), Thresholds::default());
        session.observe_lighting(good_lighting());
        session.observe_faces(vec![centered_face(0.0)]);
        session.observe_faces(vec![centered_face(20.0)]);
        assert!(session.decision().is_allowed());

        session.retake();
        assert!(!session.is_live());
        assert_eq!(session.decision().reason(), Some(DenyReason::NoFace));

        // Lighting survives retake; liveness must be re-earned
        session.observe_faces(vec![centered_face(0.0)]);
        assert_eq!(
            session.decision().reason(),
            Some(DenyReason::AwaitingLiveness)
        );
        session.observe_faces(vec![centered_face(20.0)]);
        assert!(session.decision().is_allowed());
    }

    #[test]
    fn test_lighting_sample_replacement() {
        let mut session = CaptureSession::new(frame(), Thresholds::default());
        session.observe_faces(vec![centered_face(0.0)]);
        session.observe_faces(vec![centered_face(20.0)]);

        session.observe_lighting(LightingSample {
            brightness: 20.0,
            contrast: 5.0,
        });
        assert_eq!(session.decision().reason(), Some(DenyReason::PoorLighting));

        session.observe_lighting(good_lighting());
        assert!(session.decision().is_allowed());
    }
}
