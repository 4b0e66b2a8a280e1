//! Capture engine: drives a frame source and an analyzer on independent
//! tickers and answers capture requests over a channel.
//!
//! Detection runs every 100ms, lighting sampling every second. Both feed the
//! same [`CaptureSession`]; a capture request is answered from whatever state
//! is current at that moment. Closing the handle tears the loop down.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use idgate_core::{
    classify_expression, CaptureSession, DenyReason, Expression, Frame, FrameAnalyzer,
    FrameSource, GateDecision, LightingSample, SourceError, Thresholds,
};
use idgate_imaging::{normalize, CropStrategy, NormalizeConfig, NormalizeError};

const DETECT_INTERVAL: Duration = Duration::from_millis(100);
const LIGHTING_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("capture denied: {0}")]
    Denied(DenyReason),
    #[error("no frame available yet")]
    NoFrame,
    #[error("frame buffer does not match its stated dimensions")]
    BadFrame,
    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("engine task exited")]
    ChannelClosed,
}

/// A normalized capture ready for submission.
#[derive(Debug)]
pub struct CapturedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Point-in-time view of the gate state, for status display.
#[derive(Debug, Clone)]
pub struct GateSnapshot {
    pub allowed: bool,
    pub call_to_action: Option<&'static str>,
    pub live: bool,
    pub face_count: usize,
    pub expression: Option<Expression>,
    pub lighting: Option<LightingSample>,
    pub frames_seen: u64,
}

enum EngineRequest {
    Capture {
        strategy: CropStrategy,
        reply: oneshot::Sender<Result<CapturedImage, EngineError>>,
    },
    Snapshot {
        reply: oneshot::Sender<GateSnapshot>,
    },
    Retake {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request a capture under the current gate state.
    pub async fn capture(&self, strategy: CropStrategy) -> Result<CapturedImage, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Capture {
                strategy,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Current gate state.
    pub async fn snapshot(&self) -> Result<GateSnapshot, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Discard the pending capture context; liveness must be re-earned.
    pub async fn retake(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Retake { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

struct EngineState {
    session: Option<CaptureSession>,
    last_frame: Option<Frame>,
    thresholds: Thresholds,
    normalize_config: NormalizeConfig,
    frames_seen: u64,
    exhausted: bool,
}

/// Spawn the engine task over a frame source and an analyzer.
pub fn spawn_engine(
    mut source: Box<dyn FrameSource>,
    mut analyzer: Box<dyn FrameAnalyzer>,
    thresholds: Thresholds,
    normalize_config: NormalizeConfig,
) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    tokio::spawn(async move {
        let mut state = EngineState {
            session: None,
            last_frame: None,
            thresholds,
            normalize_config,
            frames_seen: 0,
            exhausted: false,
        };

        let mut detect_tick = tokio::time::interval(DETECT_INTERVAL);
        let mut lighting_tick = tokio::time::interval(LIGHTING_INTERVAL);

        loop {
            tokio::select! {
                _ = detect_tick.tick(), if !state.exhausted => {
                    detect_cycle(&mut state, source.as_mut(), analyzer.as_mut());
                }
                _ = lighting_tick.tick(), if !state.exhausted => {
                    lighting_cycle(&mut state);
                }
                req = rx.recv() => {
                    let Some(req) = req else { break };
                    match req {
                        EngineRequest::Capture { strategy, reply } => {
                            let _ = reply.send(do_capture(&state, strategy));
                        }
                        EngineRequest::Snapshot { reply } => {
                            let _ = reply.send(snapshot(&state));
                        }
                        EngineRequest::Retake { reply } => {
                            if let Some(session) = state.session.as_mut() {
                                session.retake();
                            }
                            let _ = reply.send(());
                        }
                    }
                }
            }
        }
        tracing::debug!("engine task exiting");
    });

    EngineHandle { tx }
}

/// Pull one frame, analyze it, feed the session.
///
/// Analyzer errors count as "no faces this cycle"; only source exhaustion
/// stops the tickers.
fn detect_cycle(state: &mut EngineState, source: &mut dyn FrameSource, analyzer: &mut dyn FrameAnalyzer) {
    let frame = match source.next_frame() {
        Ok(frame) => frame,
        Err(SourceError::Exhausted) => {
            tracing::info!(frames = state.frames_seen, "frame source exhausted");
            state.exhausted = true;
            return;
        }
        Err(err) => {
            tracing::warn!(error = %err, "frame source error; skipping cycle");
            return;
        }
    };

    let session = state
        .session
        .get_or_insert_with(|| CaptureSession::new(frame.size(), state.thresholds.clone()));

    match analyzer.analyze(&frame) {
        Ok(faces) => session.observe_faces(faces),
        Err(err) => {
            tracing::warn!(error = %err, "analysis failed; treating as no faces");
            session.observe_faces(Vec::new());
        }
    }

    state.frames_seen += 1;
    state.last_frame = Some(frame);
}

fn lighting_cycle(state: &mut EngineState) {
    let (Some(session), Some(frame)) = (state.session.as_mut(), state.last_frame.as_ref()) else {
        return;
    };
    session.observe_lighting(LightingSample::from_rgb(&frame.data));
}

fn snapshot(state: &EngineState) -> GateSnapshot {
    let Some(session) = state.session.as_ref() else {
        return GateSnapshot {
            allowed: false,
            call_to_action: Some("Position your face in the frame"),
            live: false,
            face_count: 0,
            expression: None,
            lighting: None,
            frames_seen: 0,
        };
    };

    let decision = session.decision();
    GateSnapshot {
        allowed: decision.is_allowed(),
        call_to_action: decision.reason().map(|r| r.call_to_action()),
        live: session.is_live(),
        face_count: session.face_count(),
        expression: session
            .primary_face()
            .map(|face| classify_expression(face, session.thresholds())),
        lighting: session.lighting().copied(),
        frames_seen: state.frames_seen,
    }
}

fn do_capture(state: &EngineState, strategy: CropStrategy) -> Result<CapturedImage, EngineError> {
    let session = state.session.as_ref().ok_or(EngineError::NoFrame)?;
    match session.decision() {
        GateDecision::Denied(reason) => return Err(EngineError::Denied(reason)),
        GateDecision::Allowed => {}
    }

    let frame = state.last_frame.as_ref().ok_or(EngineError::NoFrame)?;
    let rgb = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or(EngineError::BadFrame)?;
    let source = image::DynamicImage::ImageRgb8(rgb);

    let jpeg = normalize(&source, strategy, &state.normalize_config)?;
    Ok(CapturedImage {
        jpeg,
        width: state.normalize_config.target_width,
        height: state.normalize_config.target_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use idgate_core::{AnalyzerError, BoundingBox, DetectedFace};

    /// Replays a fixed frame forever.
    struct LoopSource {
        frame: Frame,
    }

    impl FrameSource for LoopSource {
        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            Ok(self.frame.clone())
        }
    }

    /// Yields N frames, then reports exhaustion.
    struct FiniteSource {
        frame: Frame,
        remaining: usize,
    }

    impl FrameSource for FiniteSource {
        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            if self.remaining == 0 {
                return Err(SourceError::Exhausted);
            }
            self.remaining -= 1;
            Ok(self.frame.clone())
        }
    }

    /// Replays scripted detection results, then repeats the last one.
    struct ScriptedAnalyzer {
        script: Vec<Vec<DetectedFace>>,
        cursor: usize,
    }

    impl FrameAnalyzer for ScriptedAnalyzer {
        fn analyze(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, AnalyzerError> {
            let idx = self.cursor.min(self.script.len().saturating_sub(1));
            self.cursor += 1;
            Ok(self.script.get(idx).cloned().unwrap_or_default())
        }
    }

    fn bright_frame() -> Frame {
        // Alternating bands give both brightness and contrast in range
        let width = 640u32;
        let height = 480u32;
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            let v = if y % 2 == 0 { 80u8 } else { 180u8 };
            for _ in 0..width {
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame {
            data,
            width,
            height,
        }
    }

    fn face_at(x: f32) -> DetectedFace {
        DetectedFace::new(
            BoundingBox {
                x,
                y: 90.0,
                width: 300.0,
                height: 300.0,
            },
            0.95,
        )
    }

    /// Good detections that also satisfy liveness on the second cycle.
    fn live_script() -> Vec<Vec<DetectedFace>> {
        vec![vec![face_at(170.0)], vec![face_at(190.0)]]
    }

    fn spawn_test_engine(
        source: Box<dyn FrameSource>,
        script: Vec<Vec<DetectedFace>>,
    ) -> EngineHandle {
        spawn_engine(
            source,
            Box::new(ScriptedAnalyzer { script, cursor: 0 }),
            Thresholds::default(),
            NormalizeConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_before_any_frame_is_no_frame() {
        let handle = spawn_test_engine(
            Box::new(FiniteSource {
                frame: bright_frame(),
                remaining: 0,
            }),
            live_script(),
        );
        let err = handle.capture(CropStrategy::Letterbox).await.unwrap_err();
        assert!(matches!(err, EngineError::NoFrame));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_until_live_then_allowed() {
        let handle = spawn_test_engine(Box::new(LoopSource { frame: bright_frame() }), live_script());

        // One detect cycle: face present but liveness not yet confirmed
        tokio::time::advance(Duration::from_millis(110)).await;
        let snap = handle.snapshot().await.unwrap();
        assert!(!snap.allowed);

        // Second cycle moves the face; lighting ticker has fired by 1s
        tokio::time::advance(Duration::from_millis(1000)).await;
        let snap = handle.snapshot().await.unwrap();
        assert!(snap.live, "movement across cycles should confirm liveness");
        assert!(snap.allowed, "denied: {:?}", snap.call_to_action);
        // No mouth keypoints in the script, so the expression reads neutral
        assert_eq!(snap.expression, Some(Expression::Neutral));

        let captured = handle.capture(CropStrategy::Letterbox).await.unwrap();
        assert_eq!(captured.width, 640);
        assert_eq!(captured.height, 480);
        assert_eq!(&captured.jpeg[0..2], &[0xFF, 0xD8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_capture_names_the_reason() {
        // Analyzer never sees a face
        let handle = spawn_test_engine(Box::new(LoopSource { frame: bright_frame() }), vec![vec![]]);
        tokio::time::advance(Duration::from_millis(1200)).await;

        let err = handle.capture(CropStrategy::FaceWeighted).await.unwrap_err();
        match err {
            EngineError::Denied(reason) => assert_eq!(reason, DenyReason::NoFace),
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retake_resets_liveness() {
        let handle = spawn_test_engine(Box::new(LoopSource { frame: bright_frame() }), live_script());
        tokio::time::advance(Duration::from_millis(1200)).await;
        assert!(handle.snapshot().await.unwrap().allowed);

        handle.retake().await.unwrap();
        let snap = handle.snapshot().await.unwrap();
        assert!(!snap.live);
        assert!(!snap.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_source_keeps_serving_requests() {
        let handle = spawn_test_engine(
            Box::new(FiniteSource {
                frame: bright_frame(),
                remaining: 2,
            }),
            live_script(),
        );
        // Run well past exhaustion
        tokio::time::advance(Duration::from_secs(5)).await;

        let snap = handle.snapshot().await.unwrap();
        assert_eq!(snap.frames_seen, 2);
        // Both scripted cycles ran, so the gate settled on its final state
        assert!(snap.live);
    }
}
