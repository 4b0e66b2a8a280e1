//! Movement-based liveness tracking.
//!
//! A printed photo or a static display produces a near-stationary bounding
//! box across analysis cycles; a live subject drifts measurably even when
//! trying to hold still. The tracker keeps a short bounded history of the
//! primary face position and latches "live" the first time the displacement
//! between the two most recent samples exceeds the configured threshold.
//!
//! The flag is monotonic for the lifetime of a session: once live, nothing
//! clears it except an explicit [`reset`](LivenessTracker::reset), which the
//! capture session wires to the retake action only.

use crate::thresholds::Thresholds;
use crate::types::Point;
use std::collections::VecDeque;

/// Bounded FIFO history of face positions plus the latched live flag.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    history: VecDeque<Point>,
    capacity: usize,
    threshold: f32,
    live: bool,
}

impl LivenessTracker {
    pub fn new(thresholds: &Thresholds) -> Self {
        // Capacity of at least 2 so there is always a consecutive pair
        let capacity = thresholds.movement_history.max(2);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            threshold: thresholds.movement_threshold,
            live: false,
        }
    }

    /// Record one observation of the primary face position.
    ///
    /// Evicts the oldest sample beyond capacity, then compares the two most
    /// recent samples by Manhattan distance.
    pub fn observe(&mut self, position: Point) {
        self.history.push_back(position);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        if self.live || self.history.len() < 2 {
            return;
        }

        let latest = self.history[self.history.len() - 1];
        let previous = self.history[self.history.len() - 2];
        if latest.manhattan(&previous) > self.threshold {
            tracing::debug!(
                displacement = latest.manhattan(&previous),
                threshold = self.threshold,
                "movement threshold exceeded — session is live"
            );
            self.live = true;
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Clear the live flag and history. Wired to the explicit retake action.
    pub fn reset(&mut self) {
        self.history.clear();
        self.live = false;
    }
}
