//! Core analysis library for the idgate selfie-capture pipeline.
//!
//! Everything here is deterministic and side-effect free: detection results
//! flow in as [`DetectedFace`] values, the heuristic evaluators and the
//! [`CaptureSession`] decide whether a capture is currently allowed, and the
//! caller acts on the resulting [`GateDecision`]. Detection itself lives
//! behind the [`FrameAnalyzer`] trait — the model backend is a collaborator,
//! not part of this crate.

pub mod analyzer;
pub mod expression;
pub mod eyewear;
pub mod gate;
pub mod idnumber;
pub mod lighting;
pub mod liveness;
pub mod quality;
pub mod session;
pub mod thresholds;
pub mod types;

pub use analyzer::{AnalyzerError, Frame, FrameAnalyzer, FrameSource, NullAnalyzer, SourceError};
pub use expression::{classify_expression, Expression};
pub use eyewear::{detect_eyewear, EyewearReport};
pub use gate::{evaluate_gate, DenyReason, GateDecision};
pub use idnumber::{is_valid_pin, validate_pin, PinFormatError};
pub use lighting::LightingSample;
pub use liveness::LivenessTracker;
pub use quality::{assess_quality, QualityReport};
pub use session::CaptureSession;
pub use thresholds::Thresholds;
pub use types::{BoundingBox, DetectedFace, FrameSize, Keypoint, KeypointName, Point};
