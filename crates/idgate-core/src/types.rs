use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of facial keypoints the heuristic evaluators understand.
///
/// Analyzer backends may produce more points than these; anything outside
/// this set is dropped at the trait boundary. Evaluators must tolerate any
/// subset being absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointName {
    LeftEyeCenter,
    RightEyeCenter,
    LeftEyeInner,
    LeftEyeOuter,
    RightEyeInner,
    RightEyeOuter,
    LeftEyebrow,
    RightEyebrow,
    MouthTop,
    MouthBottom,
    MouthLeft,
    MouthRight,
}

/// A 2D position in the pixel space of the analyzed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Manhattan (L1) distance to another point.
    pub fn manhattan(&self, other: &Point) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// A named keypoint position with its per-point detection confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub position: Point,
    pub confidence: f32,
}

/// Axis-aligned bounding box of a detected face, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Dimensions of the frame a detection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width as f32 / 2.0, self.height as f32 / 2.0)
    }
}

/// One detected face within a single analysis cycle.
///
/// Produced fresh every cycle and discarded once derived values have been
/// computed; nothing in this crate retains a `DetectedFace` across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    /// Overall detection confidence in [0, 1].
    pub confidence: f32,
    pub keypoints: HashMap<KeypointName, Keypoint>,
}

impl DetectedFace {
    pub fn new(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            keypoints: HashMap::new(),
        }
    }

    /// Builder-style keypoint insertion, used by analyzer backends and tests.
    pub fn with_keypoint(mut self, name: KeypointName, x: f32, y: f32, confidence: f32) -> Self {
        self.keypoints.insert(
            name,
            Keypoint {
                position: Point::new(x, y),
                confidence,
            },
        );
        self
    }

    pub fn keypoint(&self, name: KeypointName) -> Option<&Keypoint> {
        self.keypoints.get(&name)
    }

    pub fn keypoint_pos(&self, name: KeypointName) -> Option<Point> {
        self.keypoints.get(&name).map(|k| k.position)
    }
}
