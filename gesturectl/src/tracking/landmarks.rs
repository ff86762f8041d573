//! Hand landmark data structures.
//!
//! Models the 21 normalized keypoints a hand-landmark detector produces
//! per hand.  x and y are in [0, 1] image space (y grows downward); z is
//! relative depth with unbounded sign.  Samples are fixed-size so a poll
//! cycle never allocates for landmark math.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand landmarks, in detector output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

impl HandLandmark {
    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// String representation for logs and observers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }

    /// Fingertips, thumb first.
    pub fn fingertips() -> [HandLandmark; 5] {
        [
            Self::ThumbTip,
            Self::IndexTip,
            Self::MiddleTip,
            Self::RingTip,
            Self::PinkyTip,
        ]
    }

    /// Reference joint each fingertip is compared against when deciding
    /// extension.  The thumb has no PIP, so its IP joint stands in.
    pub fn extension_joints() -> [HandLandmark; 5] {
        [
            Self::ThumbIp,
            Self::IndexPip,
            Self::MiddlePip,
            Self::RingPip,
            Self::PinkyPip,
        ]
    }
}

// ── Handedness ─────────────────────────────────────────────

/// Which hand the detector believes it sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

// ── 2D vector ──────────────────────────────────────────────

/// Position or velocity in normalized image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

// ── Landmark sample ────────────────────────────────────────

/// One detector output for a single hand.
///
/// Holds up to 21 points; `len` is lower for partial detections.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSample {
    points: [[f64; 3]; LANDMARK_COUNT],
    len: usize,
    /// Detection confidence (0.0-1.0).
    pub confidence: f64,
    pub handedness: Handedness,
    /// Capture time in seconds on the source's monotonic clock.
    pub timestamp_s: f64,
}

impl LandmarkSample {
    /// Build a sample from detector points.  Extra points beyond 21 are
    /// ignored; fewer than 21 yields a partial sample.
    pub fn new(points: &[[f64; 3]], confidence: f64, handedness: Handedness, timestamp_s: f64) -> Self {
        let len = points.len().min(LANDMARK_COUNT);
        let mut fixed = [[0.0; 3]; LANDMARK_COUNT];
        fixed[..len].copy_from_slice(&points[..len]);
        Self {
            points: fixed,
            len,
            confidence: confidence.clamp(0.0, 1.0),
            handedness,
            timestamp_s,
        }
    }

    /// Number of detected points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether all 21 landmarks are present.
    pub fn is_complete(&self) -> bool {
        self.len == LANDMARK_COUNT
    }

    /// Detected points, in landmark order.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points[..self.len]
    }

    /// Position of a landmark, if it was detected.
    pub fn point(&self, landmark: HandLandmark) -> Option<[f64; 3]> {
        let i = landmark.index();
        (i < self.len).then(|| self.points[i])
    }

    /// 2D (x, y) position of a landmark, if it was detected.
    pub fn xy(&self, landmark: HandLandmark) -> Option<Vec2> {
        self.point(landmark).map(|p| Vec2::new(p[0], p[1]))
    }

    /// Euclidean 2D distance between two landmarks in image space.
    pub fn distance(&self, a: HandLandmark, b: HandLandmark) -> Option<f64> {
        let pa = self.xy(a)?;
        let pb = self.xy(b)?;
        Some(Vec2::new(pb.x - pa.x, pb.y - pa.y).magnitude())
    }

    /// Decode one JSON frame.  `null` means no hand was detected.
    pub fn from_json(line: &str, default_timestamp_s: f64) -> Result<Option<Self>, SourceError> {
        let frame: Option<JsonFrame> = serde_json::from_str(line)?;
        Ok(frame.map(|f| {
            Self::new(
                &f.landmarks,
                f.confidence,
                f.handedness,
                f.timestamp.unwrap_or(default_timestamp_s),
            )
        }))
    }
}

/// Wire shape of a recorded or streamed landmark frame.
#[derive(Debug, Deserialize)]
struct JsonFrame {
    landmarks: Vec<[f64; 3]>,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default = "default_handedness")]
    handedness: Handedness,
    #[serde(default)]
    timestamp: Option<f64>,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_handedness() -> Handedness {
    Handedness::Right
}

// ── Tests ──────────────────────────────────────────────────
