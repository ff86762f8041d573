//! Temporal confirmation of raw gesture classifications.
//!
//! A raw symbol must stay unchanged for the hold time before it is
//! confirmed, and each contiguous run confirms at most once.  This keeps
//! single-frame jitter near pose boundaries from firing actions.

use std::time::Duration;

use tracing::debug;

use super::classifier::GestureSymbol;
use super::pose::HandState;

/// Confirmation state machine states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfirmationState {
    /// No gesture held.
    Idle,
    /// A gesture has been seen continuously since `since_s`.
    Holding { symbol: GestureSymbol, since_s: f64 },
    /// The gesture has been confirmed; waits for it to change.
    Confirmed(GestureSymbol),
}

impl ConfirmationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Holding { .. } => "holding",
            Self::Confirmed(_) => "confirmed",
        }
    }
}

/// Emitted once per stable gesture run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedGesture {
    pub symbol: GestureSymbol,
    /// The hand state of the frame that completed the hold.
    pub state: HandState,
}

/// Debounces raw per-frame gestures into confirmations.
pub struct GestureConfirmationFsm {
    hold_s: f64,
    state: ConfirmationState,
}

impl GestureConfirmationFsm {
    pub fn new(hold_time: Duration) -> Self {
        Self {
            hold_s: hold_time.as_secs_f64(),
            state: ConfirmationState::Idle,
        }
    }

    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    /// The currently confirmed gesture, or `None`.
    pub fn confirmed(&self) -> GestureSymbol {
        match self.state {
            ConfirmationState::Confirmed(symbol) => symbol,
            _ => GestureSymbol::None,
        }
    }

    /// Feed one raw hand state.  Returns a confirmation at most once per
    /// contiguous run of the same symbol.
    pub fn update(&mut self, hand: &HandState) -> Option<ConfirmedGesture> {
        let g = hand.gesture;
        let now = hand.timestamp_s;

        match self.state {
            ConfirmationState::Confirmed(current) if current == g => return None,
            ConfirmationState::Holding { symbol, .. } if symbol == g => {}
            _ => {
                if g.is_none() {
                    self.state = ConfirmationState::Idle;
                    return None;
                }
                self.state = ConfirmationState::Holding {
                    symbol: g,
                    since_s: now,
                };
            }
        }

        // Evaluated on entry too, so a zero hold time confirms immediately.
        if let ConfirmationState::Holding { symbol, since_s } = self.state {
            if now - since_s >= self.hold_s {
                self.state = ConfirmationState::Confirmed(symbol);
                debug!(
                    gesture = symbol.as_str(),
                    held_ms = (now - since_s) * 1000.0,
                    "gesture confirmed"
                );
                return Some(ConfirmedGesture {
                    symbol,
                    state: hand.clone(),
                });
            }
        }
        None
    }

    /// Drop any held or confirmed gesture.
    pub fn reset(&mut self) {
        self.state = ConfirmationState::Idle;
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
pub(crate) fn raw(gesture: GestureSymbol, t: f64) -> HandState {
    use super::landmarks::{Handedness, Vec2};

    HandState {
        position: Vec2::new(0.5, 0.5),
        velocity: Vec2::ZERO,
        gesture,
        confidence: 0.9,
        handedness: if gesture.is_none() {
            None
        } else {
            Some(Handedness::Right)
        },
        timestamp_s: t,
    }
}

// ── Tests ──────────────────────────────────────────────────
