//! The gesture loop - one poll at a time, strictly in order.
//!
//! Each poll reads the landmark source, updates the pose tracker and the
//! confirmation FSM, dispatches to the active backend, then notifies
//! observers.  Poll N completes before poll N+1 starts.  A slow backend
//! lengthens the poll instead of being buffered.
//!
//! Provides:
//! - `GestureLoop`: single-threaded owner of all gesture state
//! - `dispatch`: gesture-to-action mapping
//! - `observer`: per-poll snapshots
//! - `frame_timing`: per-poll timing statistics

pub mod dispatch;
pub mod frame_timing;
pub mod observer;
pub mod rate_limit;

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::ActionBackend;
use crate::config::GestureConfig;
use crate::error::ConfigError;
use crate::tracking::{
    ConfirmedGesture, GestureClassifier, GestureConfirmationFsm, GesturePoseTracker,
    GestureSymbol, HandState, LandmarkSample, LandmarkSource,
};

pub use dispatch::{Action, DispatchPolicy, Dispatcher};
pub use frame_timing::{FrameTiming, FrameTimingStats};
pub use observer::{BackendStatus, GestureSnapshot, JsonLinesObserver, Observer, SexpLinesObserver};

/// Polls kept for timing percentiles.
const TIMING_WINDOW: usize = 1800;

/// What one poll produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub hand: HandState,
    /// Set on the poll that completed a confirmation.
    pub confirmed: Option<GestureSymbol>,
    pub status: BackendStatus,
}

pub struct GestureLoop {
    source: Box<dyn LandmarkSource>,
    tracker: GesturePoseTracker,
    fsm: GestureConfirmationFsm,
    dispatcher: Dispatcher,
    backend: Box<dyn ActionBackend>,
    observers: Vec<Box<dyn Observer>>,
    timing: FrameTiming,
    poll_timeout: Duration,
    unreachable_after: u32,
    clock: Instant,
    /// Timestamp of the last sample and when it arrived, for stamping
    /// no-hand polls on the source's clock.
    last_sample: Option<(f64, Instant)>,
    status: BackendStatus,
}

impl GestureLoop {
    /// Build a loop from a validated config.  Invalid configs are fatal here.
    pub fn new(
        config: &GestureConfig,
        source: Box<dyn LandmarkSource>,
        backend: Box<dyn ActionBackend>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let classifier = GestureClassifier::new(config.swipe_threshold, config.pinch_threshold);
        info!(
            source = source.name(),
            backend = backend.name(),
            fps = config.effective_fps(),
            hold_ms = config.hold_time_ms,
            "gesture loop ready"
        );
        Ok(Self {
            source,
            tracker: GesturePoseTracker::new(classifier, config.smoothing_alpha),
            fsm: GestureConfirmationFsm::new(config.hold_time()),
            dispatcher: Dispatcher::new(DispatchPolicy::from_config(config)),
            backend,
            observers: Vec::new(),
            timing: FrameTiming::new(TIMING_WINDOW, config.frame_budget()),
            poll_timeout: config.poll_timeout(),
            unreachable_after: config.unreachable_after_failures,
            clock: Instant::now(),
            last_sample: None,
            status: BackendStatus::Active,
        })
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn backend(&self) -> &dyn ActionBackend {
        self.backend.as_ref()
    }

    pub fn source(&self) -> &dyn LandmarkSource {
        self.source.as_ref()
    }

    pub fn fsm(&self) -> &GestureConfirmationFsm {
        &self.fsm
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    pub fn status(&self) -> BackendStatus {
        self.status
    }

    /// Loop status as an s-expression, timing stats nested under `:timing`.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:type :gesture-status :backend \"{}\" :status :{} :confirmed :{} :issued {} :failed {} :rate-limited {} :timing {})",
            observer::escape_string(self.backend.name()),
            self.status.as_str(),
            self.fsm.confirmed().as_str(),
            self.dispatcher.issued,
            self.dispatcher.failed,
            self.dispatcher.rate_limited(),
            self.timing.stats_sexp(),
        )
    }

    /// Read the source once and process the result.
    pub fn poll_once(&mut self) -> FrameReport {
        let started = Instant::now();
        let sample = self.source.poll(self.poll_timeout);
        let source_time = started.elapsed();

        let now_s = match (&sample, self.last_sample) {
            (Some(s), _) => s.timestamp_s,
            (None, Some((ts, seen))) => ts + seen.elapsed().as_secs_f64(),
            (None, None) => self.clock.elapsed().as_secs_f64(),
        };
        if let Some(s) = &sample {
            self.last_sample = Some((s.timestamp_s, Instant::now()));
        }

        let hand = self.tracker.update(sample.as_ref(), now_s);
        self.run_frame(hand, sample.as_ref(), source_time)
    }

    /// Process an already-derived hand state (skips the source and tracker).
    pub fn process(&mut self, hand: HandState) -> FrameReport {
        self.run_frame(hand, None, Duration::ZERO)
    }

    fn run_frame(
        &mut self,
        hand: HandState,
        sample: Option<&LandmarkSample>,
        source_time: Duration,
    ) -> FrameReport {
        let started = Instant::now();
        let confirmed: Option<ConfirmedGesture> = self.fsm.update(&hand);
        let tracking_time = started.elapsed();

        let started = Instant::now();
        self.dispatcher
            .dispatch(self.backend.as_mut(), &hand, confirmed.as_ref());
        let dispatch_time = started.elapsed();

        self.refresh_status();
        self.timing.record(source_time, tracking_time, dispatch_time);

        if !self.observers.is_empty() {
            let snapshot = GestureSnapshot {
                confirmed: self.fsm.confirmed(),
                raw: hand.gesture,
                position: hand.position,
                velocity: hand.velocity,
                confidence: hand.confidence,
                handedness: hand.handedness,
                landmarks: sample.map(|s| s.points().to_vec()).unwrap_or_default(),
                timestamp: hand.timestamp_s,
                backend: self.backend.name().to_string(),
                status: self.status,
            };
            for observer in &mut self.observers {
                observer.on_frame(&snapshot);
            }
        }

        FrameReport {
            hand,
            confirmed: confirmed.map(|c| c.symbol),
            status: self.status,
        }
    }

    fn refresh_status(&mut self) {
        let status = if !self.backend.is_enabled() {
            BackendStatus::Disabled
        } else if self.dispatcher.failure_streak() >= self.unreachable_after
            || !self.backend.is_reachable()
        {
            BackendStatus::Unreachable
        } else {
            BackendStatus::Active
        };
        if status != self.status {
            match status {
                BackendStatus::Unreachable => warn!(
                    backend = self.backend.name(),
                    failures = self.dispatcher.failure_streak(),
                    "backend degraded"
                ),
                _ => info!(backend = self.backend.name(), status = status.as_str(), "backend status"),
            }
            self.status = status;
        }
    }

    /// Enable or disable dispatch.  Disabling releases any open drag
    /// before the flag flips.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.backend.is_enabled() == enabled {
            return;
        }
        if let Err(e) = self.backend.set_enabled(enabled) {
            warn!(backend = self.backend.name(), error = %e, "drag release on disable failed");
        }
        // A gesture held across the toggle must not fire afterwards.
        self.fsm.reset();
        self.dispatcher.reset();
        self.refresh_status();
    }

    /// Replace the active backend.  The old one is released and disabled
    /// before the new one sees any call; it is returned to the caller.
    pub fn switch_backend(&mut self, backend: Box<dyn ActionBackend>) -> Box<dyn ActionBackend> {
        self.release_backend();
        let old = std::mem::replace(&mut self.backend, backend);
        info!(from = old.name(), to = self.backend.name(), "backend switched");
        self.fsm.reset();
        self.dispatcher.reset();
        self.refresh_status();
        old
    }

    /// Close any open drag and disable the backend.
    pub fn shutdown(&mut self) {
        self.release_backend();
        debug!(backend = self.backend.name(), "gesture loop shut down");
    }

    fn release_backend(&mut self) {
        if let Err(e) = self.backend.drag_end() {
            warn!(backend = self.backend.name(), error = %e, "drag release failed");
        }
        if let Err(e) = self.backend.set_enabled(false) {
            warn!(backend = self.backend.name(), error = %e, "backend disable failed");
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
