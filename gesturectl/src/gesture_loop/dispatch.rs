//! Gesture-to-action dispatch.
//!
//! Two paths run every poll:
//! - continuous: raw `Point` moves the pointer, raw `Grab` continues an
//!   open drag; neither is debounced or rate limited;
//! - discrete: a confirmation maps to one backend call, gated by the
//!   control flags and (except drag start/end) the rate limiter.
//!
//! Backend failures are logged and counted, never propagated.

use std::time::Duration;

use tracing::{debug, warn};

use super::rate_limit::RateLimiter;
use crate::backend::{scroll_magnitude, ActionBackend, ScrollDirection};
use crate::config::GestureConfig;
use crate::error::{BackendError, BackendResult};
use crate::tracking::{ConfirmedGesture, GestureSymbol, HandState};

/// A backend call the dispatcher decided on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    MoveTo,
    Click,
    RightClick,
    DragStart,
    DragContinue,
    DragEnd,
    Scroll(ScrollDirection, u32),
    NavigateBack,
    NavigateForward,
    ZoomIn,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoveTo => "move-to",
            Self::Click => "click",
            Self::RightClick => "right-click",
            Self::DragStart => "drag-start",
            Self::DragContinue => "drag-continue",
            Self::DragEnd => "drag-end",
            Self::Scroll(..) => "scroll",
            Self::NavigateBack => "navigate-back",
            Self::NavigateForward => "navigate-forward",
            Self::ZoomIn => "zoom-in",
        }
    }

    /// Pointer actions need desktop control; key chords need browser control.
    fn needs_browser(&self) -> bool {
        matches!(self, Self::NavigateBack | Self::NavigateForward | Self::ZoomIn)
    }

    fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::Click
                | Self::RightClick
                | Self::Scroll(..)
                | Self::NavigateBack
                | Self::NavigateForward
                | Self::ZoomIn
        )
    }
}

/// Dispatch settings taken from the config.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPolicy {
    pub enable_desktop_control: bool,
    pub enable_browser_control: bool,
    pub scroll_speed: f64,
    pub action_interval: Duration,
    pub grab_release: Duration,
}

impl DispatchPolicy {
    pub fn from_config(config: &GestureConfig) -> Self {
        Self {
            enable_desktop_control: config.enable_desktop_control,
            enable_browser_control: config.enable_browser_control,
            scroll_speed: config.scroll_speed,
            action_interval: config.action_interval(),
            grab_release: config.grab_release(),
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from_config(&GestureConfig::default())
    }
}

pub struct Dispatcher {
    policy: DispatchPolicy,
    limiter: RateLimiter,
    /// When the raw gesture last left `Grab` with a drag open.
    grab_left_at: Option<f64>,
    /// Consecutive failed backend calls.
    failure_streak: u32,
    /// Actions issued successfully.
    pub issued: u64,
    /// Actions that failed.
    pub failed: u64,
}

impl Dispatcher {
    pub fn new(policy: DispatchPolicy) -> Self {
        let limiter = RateLimiter::new(policy.action_interval);
        Self {
            policy,
            limiter,
            grab_left_at: None,
            failure_streak: 0,
            issued: 0,
            failed: 0,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }

    /// Actions dropped by the rate limiter.
    pub fn rate_limited(&self) -> u64 {
        self.limiter.rejected
    }

    /// Forget per-backend state (after a backend switch or re-enable).
    pub fn reset(&mut self) {
        self.limiter.reset();
        self.grab_left_at = None;
        self.failure_streak = 0;
    }

    /// Run both dispatch paths for one poll.
    pub fn dispatch(
        &mut self,
        backend: &mut dyn ActionBackend,
        hand: &HandState,
        confirmed: Option<&ConfirmedGesture>,
    ) {
        if !backend.is_enabled() {
            return;
        }
        self.continuous(backend, hand);
        if let Some(c) = confirmed {
            self.discrete(backend, c);
        }
    }

    fn continuous(&mut self, backend: &mut dyn ActionBackend, hand: &HandState) {
        let now = hand.timestamp_s;

        if backend.drag_active() {
            if hand.gesture == GestureSymbol::Grab {
                self.grab_left_at = None;
                self.issue(backend, Action::DragContinue, hand);
            } else {
                let left = *self.grab_left_at.get_or_insert(now);
                if now - left >= self.policy.grab_release.as_secs_f64() {
                    debug!(gesture = hand.gesture.as_str(), "grab released");
                    self.issue(backend, Action::DragEnd, hand);
                }
            }
        }

        if hand.gesture == GestureSymbol::Point {
            self.issue(backend, Action::MoveTo, hand);
        }
    }

    fn discrete(&mut self, backend: &mut dyn ActionBackend, confirmed: &ConfirmedGesture) {
        let hand = &confirmed.state;
        let action = match confirmed.symbol {
            GestureSymbol::Pinch => Action::Click,
            GestureSymbol::Peace => Action::RightClick,
            GestureSymbol::Grab => {
                self.grab_left_at = None;
                Action::DragStart
            }
            GestureSymbol::OpenPalm if backend.drag_active() => Action::DragEnd,
            GestureSymbol::SwipeLeft => Action::NavigateBack,
            GestureSymbol::SwipeRight => Action::NavigateForward,
            GestureSymbol::SwipeUp => Action::Scroll(
                ScrollDirection::Up,
                scroll_magnitude(hand.velocity.y, self.policy.scroll_speed),
            ),
            GestureSymbol::SwipeDown => Action::Scroll(
                ScrollDirection::Down,
                scroll_magnitude(hand.velocity.y, self.policy.scroll_speed),
            ),
            GestureSymbol::Spread => Action::ZoomIn,
            // Point is continuous; OpenPalm without a drag is a plain stop.
            GestureSymbol::Point | GestureSymbol::OpenPalm | GestureSymbol::None => return,
        };

        if !self.allowed(action) {
            return;
        }
        if action.is_rate_limited() && !self.limiter.check(hand.timestamp_s) {
            debug!(gesture = confirmed.symbol.as_str(), action = action.as_str(), "rate limited");
            return;
        }
        self.issue(backend, action, hand);
    }

    fn allowed(&self, action: Action) -> bool {
        match action {
            // Releasing a held button is always allowed.
            Action::DragEnd => true,
            a if a.needs_browser() => self.policy.enable_browser_control,
            _ => self.policy.enable_desktop_control,
        }
    }

    fn issue(&mut self, backend: &mut dyn ActionBackend, action: Action, hand: &HandState) {
        if !self.allowed(action) {
            return;
        }
        let result: BackendResult = match action {
            Action::MoveTo => backend.move_to(hand.position),
            Action::Click => backend.click(),
            Action::RightClick => backend.right_click(),
            Action::DragStart => backend.drag_start(),
            Action::DragContinue => backend.drag_continue(hand.position),
            Action::DragEnd => {
                self.grab_left_at = None;
                backend.drag_end()
            }
            Action::Scroll(direction, magnitude) => backend.scroll(direction, magnitude),
            Action::NavigateBack => backend.navigate_back(),
            Action::NavigateForward => backend.navigate_forward(),
            Action::ZoomIn => backend.zoom_in(),
        };

        match result {
            Ok(()) => {
                self.issued += 1;
                self.failure_streak = 0;
                if !matches!(action, Action::MoveTo | Action::DragContinue) {
                    debug!(backend = backend.name(), action = action.as_str(), "action issued");
                }
            }
            Err(BackendError::Disabled) => {}
            Err(e) => {
                self.failed += 1;
                self.failure_streak = self.failure_streak.saturating_add(1);
                warn!(
                    gesture = hand.gesture.as_str(),
                    backend = backend.name(),
                    action = action.as_str(),
                    streak = self.failure_streak,
                    error = %e,
                    "backend call failed"
                );
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Effect, RecordingBackend};
    use crate::tracking::confirm::raw;
    use crate::tracking::Vec2;

    fn confirm(symbol: GestureSymbol, t: f64) -> ConfirmedGesture {
        ConfirmedGesture {
            symbol,
            state: raw(symbol, t),
        }
    }

    #[test]
    fn test_point_moves_every_frame() {
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(DispatchPolicy::default());
        for i in 0..5 {
            d.dispatch(&mut backend, &raw(GestureSymbol::Point, i as f64 * 0.033), None);
        }
        assert_eq!(log.count(|e| matches!(e, Effect::MoveTo(_))), 5);
    }

    #[test]
    fn test_discrete_mapping() {
        let cases = [
            (GestureSymbol::Pinch, Effect::Click),
            (GestureSymbol::Peace, Effect::RightClick),
            (GestureSymbol::SwipeLeft, Effect::Back),
            (GestureSymbol::SwipeRight, Effect::Forward),
            (GestureSymbol::Spread, Effect::ZoomIn),
            (GestureSymbol::Grab, Effect::DragStart),
        ];
        for (symbol, expected) in cases {
            let (mut backend, log) = RecordingBackend::new();
            let mut d = Dispatcher::new(DispatchPolicy::default());
            let c = confirm(symbol, 1.0);
            d.dispatch(&mut backend, &c.state, Some(&c));
            assert_eq!(log.effects(), vec![expected], "{symbol:?}");
        }
    }

    #[test]
    fn test_scroll_uses_velocity() {
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(DispatchPolicy::default());
        let mut c = confirm(GestureSymbol::SwipeUp, 1.0);
        c.state.velocity = Vec2::new(0.0, -0.8);
        d.dispatch(&mut backend, &c.state, Some(&c));
        assert_eq!(log.effects(), vec![Effect::Scroll(ScrollDirection::Up, 8)]);
    }

    #[test]
    fn test_open_palm_without_drag_is_noop() {
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(DispatchPolicy::default());
        let c = confirm(GestureSymbol::OpenPalm, 1.0);
        d.dispatch(&mut backend, &c.state, Some(&c));
        assert!(log.effects().is_empty());
    }

    #[test]
    fn test_drag_continue_then_open_palm_release() {
        let policy = DispatchPolicy {
            grab_release: Duration::from_secs(10),
            ..DispatchPolicy::default()
        };
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(policy);
        let c = confirm(GestureSymbol::Grab, 0.0);
        d.dispatch(&mut backend, &c.state, Some(&c));
        d.dispatch(&mut backend, &raw(GestureSymbol::Grab, 0.033), None);
        d.dispatch(&mut backend, &raw(GestureSymbol::Grab, 0.066), None);
        d.dispatch(&mut backend, &raw(GestureSymbol::OpenPalm, 0.1), None);
        let c = confirm(GestureSymbol::OpenPalm, 0.25);
        d.dispatch(&mut backend, &c.state, Some(&c));
        assert_eq!(
            log.effects(),
            vec![
                Effect::DragStart,
                Effect::DragContinue(Vec2::new(0.5, 0.5)),
                Effect::DragContinue(Vec2::new(0.5, 0.5)),
                Effect::DragEnd,
            ]
        );
    }

    #[test]
    fn test_grab_release_after_grace() {
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(DispatchPolicy::default());
        let c = confirm(GestureSymbol::Grab, 0.0);
        d.dispatch(&mut backend, &c.state, Some(&c));
        // Brief dropout inside the grace period keeps the drag.
        d.dispatch(&mut backend, &raw(GestureSymbol::None, 0.05), None);
        d.dispatch(&mut backend, &raw(GestureSymbol::Grab, 0.10), None);
        assert!(backend.drag_active());
        d.dispatch(&mut backend, &raw(GestureSymbol::None, 0.20), None);
        d.dispatch(&mut backend, &raw(GestureSymbol::None, 0.40), None);
        assert!(!backend.drag_active());
        d.dispatch(&mut backend, &raw(GestureSymbol::None, 0.50), None);
        assert_eq!(log.count(|e| *e == Effect::DragEnd), 1);
    }

    #[test]
    fn test_scroll_during_long_grab_release_closes_drag() {
        let policy = DispatchPolicy {
            grab_release: Duration::from_millis(400),
            ..DispatchPolicy::default()
        };
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(policy);
        let c = confirm(GestureSymbol::Grab, 0.0);
        d.dispatch(&mut backend, &c.state, Some(&c));
        let mut c = confirm(GestureSymbol::SwipeDown, 0.2);
        c.state.velocity = Vec2::new(0.0, 0.05);
        d.dispatch(&mut backend, &c.state, Some(&c));
        assert_eq!(
            log.effects(),
            vec![
                Effect::DragStart,
                Effect::DragEnd,
                Effect::Scroll(ScrollDirection::Down, 1),
            ]
        );
        assert!(!backend.drag_active());
    }

    #[test]
    fn test_rate_limit_discrete_only() {
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(DispatchPolicy::default());
        let first = confirm(GestureSymbol::Pinch, 1.0);
        d.dispatch(&mut backend, &first.state, Some(&first));
        let second = confirm(GestureSymbol::Peace, 1.05);
        d.dispatch(&mut backend, &second.state, Some(&second));
        d.dispatch(&mut backend, &raw(GestureSymbol::Point, 1.06), None);
        assert_eq!(log.count(Effect::is_discrete), 1);
        assert_eq!(log.count(|e| matches!(e, Effect::MoveTo(_))), 1);
        assert_eq!(d.rate_limited(), 1);
    }

    #[test]
    fn test_control_flags() {
        let policy = DispatchPolicy {
            enable_browser_control: false,
            ..DispatchPolicy::default()
        };
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(policy);
        let c = confirm(GestureSymbol::SwipeLeft, 1.0);
        d.dispatch(&mut backend, &c.state, Some(&c));
        let c = confirm(GestureSymbol::Pinch, 2.0);
        d.dispatch(&mut backend, &c.state, Some(&c));
        assert_eq!(log.effects(), vec![Effect::Click]);

        let policy = DispatchPolicy {
            enable_desktop_control: false,
            ..DispatchPolicy::default()
        };
        let (mut backend, log) = RecordingBackend::new();
        let mut d = Dispatcher::new(policy);
        d.dispatch(&mut backend, &raw(GestureSymbol::Point, 0.0), None);
        let c = confirm(GestureSymbol::Spread, 1.0);
        d.dispatch(&mut backend, &c.state, Some(&c));
        assert_eq!(log.effects(), vec![Effect::ZoomIn]);
    }

    #[test]
    fn test_failures_counted_not_raised() {
        let (mut backend, _log) = RecordingBackend::new();
        backend.reachable = false;
        let mut d = Dispatcher::new(DispatchPolicy::default());
        for i in 0..4 {
            d.dispatch(&mut backend, &raw(GestureSymbol::Point, i as f64), None);
        }
        assert_eq!(d.failure_streak(), 4);
        backend.reachable = true;
        d.dispatch(&mut backend, &raw(GestureSymbol::Point, 5.0), None);
        assert_eq!(d.failure_streak(), 0);
        assert_eq!(d.failed, 4);
    }

    #[test]
    fn test_disabled_backend_skipped() {
        let (mut backend, log) = RecordingBackend::new();
        backend.set_enabled(false).unwrap();
        let mut d = Dispatcher::new(DispatchPolicy::default());
        let c = confirm(GestureSymbol::Pinch, 1.0);
        d.dispatch(&mut backend, &c.state, Some(&c));
        d.dispatch(&mut backend, &raw(GestureSymbol::Point, 1.1), None);
        assert!(log.effects().is_empty());
        assert_eq!(d.failure_streak(), 0);
    }
}
