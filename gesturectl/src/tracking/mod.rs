//! Hand tracking - landmarks in, debounced gestures out.
//!
//! Provides:
//! - `landmarks`: 21-point hand samples and 2D vector math
//! - `classifier`: rule-based gesture classification
//! - `pose`: smoothing and velocity, producing `HandState`
//! - `confirm`: hold-time confirmation state machine
//! - `source`: landmark sources (scripted, replay, threaded)

pub mod classifier;
pub mod confirm;
pub mod landmarks;
pub mod pose;
pub mod source;

pub use classifier::{GestureClassifier, GestureSymbol};
pub use confirm::{ConfirmationState, ConfirmedGesture, GestureConfirmationFsm};
pub use landmarks::{HandLandmark, Handedness, LandmarkSample, Vec2, LANDMARK_COUNT};
pub use pose::{GesturePoseTracker, HandState};
pub use source::{LandmarkSource, ReplaySource, ScriptedSource, ThreadedSource};
