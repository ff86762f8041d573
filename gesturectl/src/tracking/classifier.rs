//! Rule-based gesture classification from hand landmarks.
//!
//! Maps one landmark sample plus the hand's velocity to a single gesture
//! symbol.  Pure and deterministic: the same input always yields the same
//! symbol.  Rules are checked in a fixed order and the first match wins:
//! swipe, pinch, then the finger-extension poses.

use serde::Serialize;

use super::landmarks::{HandLandmark, LandmarkSample, Vec2};

// ── Gesture symbols ────────────────────────────────────────

/// Per-frame gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GestureSymbol {
    #[default]
    None,
    /// Index finger extended, others curled.
    Point,
    /// Thumb and index fingertips touching.
    Pinch,
    /// All fingers curled (fist).
    Grab,
    /// All fingers extended and held together.
    OpenPalm,
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
    /// All fingers extended with index and middle visibly apart.
    Spread,
    /// Index and middle extended, others curled.
    Peace,
}

impl GestureSymbol {
    /// String representation for logs and observers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Point => "point",
            Self::Pinch => "pinch",
            Self::Grab => "grab",
            Self::OpenPalm => "open-palm",
            Self::SwipeLeft => "swipe-left",
            Self::SwipeRight => "swipe-right",
            Self::SwipeUp => "swipe-up",
            Self::SwipeDown => "swipe-down",
            Self::Spread => "spread",
            Self::Peace => "peace",
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Self::None
    }

    pub fn is_swipe(&self) -> bool {
        matches!(
            self,
            Self::SwipeLeft | Self::SwipeRight | Self::SwipeUp | Self::SwipeDown
        )
    }
}

// ── Classifier ─────────────────────────────────────────────

/// Thresholds for the classification rules.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureClassifier {
    /// Speed (normalized units/s) above which the hand is swiping.
    pub swipe_threshold: f64,
    /// Thumb-to-index tip distance below which the hand is pinching.
    pub pinch_threshold: f64,
    /// Index-to-middle tip distance above which an open hand is spread.
    pub spread_threshold: f64,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self {
            swipe_threshold: 0.15,
            pinch_threshold: 0.05,
            spread_threshold: 0.1,
        }
    }
}

impl GestureClassifier {
    pub fn new(swipe_threshold: f64, pinch_threshold: f64) -> Self {
        Self {
            swipe_threshold,
            pinch_threshold,
            ..Self::default()
        }
    }

    /// Classify one sample.  Partial detections are always `None`.
    pub fn classify(&self, sample: &LandmarkSample, velocity: Vec2) -> GestureSymbol {
        if !sample.is_complete() {
            return GestureSymbol::None;
        }

        // Motion blurs pose detection, so swipes win over static poses.
        if velocity.magnitude() > self.swipe_threshold {
            return swipe_direction(velocity);
        }

        if let Some(d) = sample.distance(HandLandmark::ThumbTip, HandLandmark::IndexTip) {
            if d < self.pinch_threshold {
                return GestureSymbol::Pinch;
            }
        }

        match finger_extension(sample) {
            Some([false, true, true, false, false]) => GestureSymbol::Peace,
            Some([false, true, false, false, false]) => GestureSymbol::Point,
            Some([true, true, true, true, true]) => {
                let gap = sample
                    .distance(HandLandmark::IndexTip, HandLandmark::MiddleTip)
                    .unwrap_or(0.0);
                if gap > self.spread_threshold {
                    GestureSymbol::Spread
                } else {
                    GestureSymbol::OpenPalm
                }
            }
            Some([false, false, false, false, false]) => GestureSymbol::Grab,
            _ => GestureSymbol::None,
        }
    }
}

/// Swipe symbol for the dominant axis of motion.  y grows downward.
fn swipe_direction(velocity: Vec2) -> GestureSymbol {
    if velocity.x.abs() > velocity.y.abs() {
        if velocity.x < 0.0 {
            GestureSymbol::SwipeLeft
        } else {
            GestureSymbol::SwipeRight
        }
    } else if velocity.y < 0.0 {
        GestureSymbol::SwipeUp
    } else {
        GestureSymbol::SwipeDown
    }
}

/// Extended/flexed flags for `[thumb, index, middle, ring, pinky]`.
///
/// The thumb folds sideways, so it is extended when its tip is farther
/// from the wrist along x than its IP joint; this holds for either hand.
/// The other fingers are extended when the tip is above the PIP joint.
pub fn finger_extension(sample: &LandmarkSample) -> Option<[bool; 5]> {
    let wrist = sample.xy(HandLandmark::Wrist)?;
    let tips = HandLandmark::fingertips();
    let joints = HandLandmark::extension_joints();

    let mut extended = [false; 5];
    for (i, (tip, joint)) in tips.iter().zip(joints.iter()).enumerate() {
        let tip = sample.xy(*tip)?;
        let joint = sample.xy(*joint)?;
        extended[i] = if i == 0 {
            (tip.x - wrist.x).abs() > (joint.x - wrist.x).abs()
        } else {
            tip.y < joint.y
        };
    }
    Some(extended)
}

// ── Test helpers ───────────────────────────────────────────

/// Build a complete right-hand sample with the given fingers extended.
///
/// Wrist at (0.5, 0.8).  Extended fingertips sit above their PIP joint,
/// curled ones below it.  Fingertips are spaced 0.05 apart in x so no
/// pinch or spread is implied unless a test moves points explicitly.
#[cfg(test)]
pub(crate) fn make_pose(extended: [bool; 5]) -> LandmarkSample {
    use super::landmarks::{Handedness, LANDMARK_COUNT};

    let mut points = vec![[0.5, 0.8, 0.0]; LANDMARK_COUNT];
    // Thumb: IP at 0.05 from the wrist in x, tip farther out when extended.
    points[HandLandmark::ThumbIp.index()] = [0.45, 0.7, 0.0];
    points[HandLandmark::ThumbTip.index()] = if extended[0] {
        [0.35, 0.65, 0.0]
    } else {
        [0.48, 0.7, 0.0]
    };
    let fingers = [
        (HandLandmark::IndexPip, HandLandmark::IndexTip, 0.55),
        (HandLandmark::MiddlePip, HandLandmark::MiddleTip, 0.60),
        (HandLandmark::RingPip, HandLandmark::RingTip, 0.65),
        (HandLandmark::PinkyPip, HandLandmark::PinkyTip, 0.70),
    ];
    for (i, (pip, tip, x)) in fingers.iter().enumerate() {
        points[pip.index()] = [*x, 0.6, 0.0];
        points[tip.index()] = if extended[i + 1] {
            [*x, 0.4, 0.0]
        } else {
            [*x, 0.7, 0.0]
        };
    }
    LandmarkSample::new(&points, 0.9, Handedness::Right, 0.0)
}

#[cfg(test)]
pub(crate) fn set_point(sample: &LandmarkSample, landmark: HandLandmark, x: f64, y: f64) -> LandmarkSample {
    let mut points = sample.points().to_vec();
    points[landmark.index()] = [x, y, 0.0];
    LandmarkSample::new(&points, sample.confidence, sample.handedness, sample.timestamp_s)
}

// ── Tests ──────────────────────────────────────────────────
