//! Hand pose tracking: smoothing, velocity, and per-frame classification.
//!
//! The tracker follows the index fingertip.  Position is exponentially
//! smoothed; velocity comes from the raw (unsmoothed) positions of
//! successive detected samples so quick flicks are not damped below the
//! swipe threshold.

use tracing::trace;

use super::classifier::{GestureClassifier, GestureSymbol};
use super::landmarks::{HandLandmark, Handedness, LandmarkSample, Vec2};

/// Landmark whose position drives the cursor.
pub const TRACKED_LANDMARK: HandLandmark = HandLandmark::IndexTip;

// ── Hand state ─────────────────────────────────────────────

/// Derived per-poll state of the tracked hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandState {
    /// Smoothed position in normalized image space.
    pub position: Vec2,
    /// Raw velocity in normalized units per second.
    pub velocity: Vec2,
    /// Raw classification for this frame.
    pub gesture: GestureSymbol,
    pub confidence: f64,
    /// `None` when no hand was detected this frame.
    pub handedness: Option<Handedness>,
    pub timestamp_s: f64,
}

impl HandState {
    /// State for a frame without a detected hand.
    pub fn absent(position: Vec2, timestamp_s: f64) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            gesture: GestureSymbol::None,
            confidence: 0.0,
            handedness: None,
            timestamp_s,
        }
    }

    pub fn hand_present(&self) -> bool {
        self.handedness.is_some()
    }
}

// ── Tracker ────────────────────────────────────────────────

/// Turns landmark samples into `HandState`s.
pub struct GesturePoseTracker {
    classifier: GestureClassifier,
    /// Smoothing factor: 1.0 follows the raw position exactly.
    alpha: f64,
    smoothed: Option<Vec2>,
    /// Raw position and timestamp of the previous detected sample.
    prev_raw: Option<(Vec2, f64)>,
}

impl GesturePoseTracker {
    pub fn new(classifier: GestureClassifier, alpha: f64) -> Self {
        Self {
            classifier,
            alpha,
            smoothed: None,
            prev_raw: None,
        }
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    /// Last smoothed position, or the screen center before any detection.
    pub fn position(&self) -> Vec2 {
        self.smoothed.unwrap_or(Vec2::new(0.5, 0.5))
    }

    /// Process one poll.  `now_s` stamps frames without a hand.
    ///
    /// Missing hands and partial detections do not move the smoothed
    /// position, so it never drifts toward a stale or zero point.
    pub fn update(&mut self, sample: Option<&LandmarkSample>, now_s: f64) -> HandState {
        let Some(sample) = sample else {
            return HandState::absent(self.position(), now_s);
        };
        let raw = match sample.xy(TRACKED_LANDMARK) {
            Some(raw) if sample.is_complete() => raw,
            _ => return self.partial(sample),
        };

        let t = sample.timestamp_s;
        let velocity = match self.prev_raw {
            Some((prev, prev_t)) if t > prev_t => {
                let dt = t - prev_t;
                Vec2::new((raw.x - prev.x) / dt, (raw.y - prev.y) / dt)
            }
            _ => Vec2::ZERO,
        };
        self.prev_raw = Some((raw, t));

        let smoothed = match self.smoothed {
            Some(s) => Vec2::new(
                s.x * (1.0 - self.alpha) + raw.x * self.alpha,
                s.y * (1.0 - self.alpha) + raw.y * self.alpha,
            ),
            None => raw,
        };
        self.smoothed = Some(smoothed);

        let gesture = self.classifier.classify(sample, velocity);
        trace!(
            gesture = gesture.as_str(),
            x = smoothed.x,
            y = smoothed.y,
            vx = velocity.x,
            vy = velocity.y,
            "hand state"
        );

        HandState {
            position: smoothed,
            velocity,
            gesture,
            confidence: sample.confidence,
            handedness: Some(sample.handedness),
            timestamp_s: t,
        }
    }

    /// Partial detection: report the hand but leave the filter alone.
    fn partial(&self, sample: &LandmarkSample) -> HandState {
        let mut state = HandState::absent(self.position(), sample.timestamp_s);
        state.confidence = sample.confidence;
        state.handedness = Some(sample.handedness);
        state
    }

    /// Forget smoothing and velocity history.
    pub fn reset(&mut self) {
        self.smoothed = None;
        self.prev_raw = None;
    }
}

// ── Tests ──────────────────────────────────────────────────
