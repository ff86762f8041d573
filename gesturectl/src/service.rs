//! Gesture service - owns and paces the loop, applies control commands.
//!
//! Constructed once at startup and handed around by handle; there is no
//! global gesture state.  Other threads talk to it through a cloneable
//! [`ControlHandle`].  Commands are applied at the top of an iteration, so
//! a disable (with its forced drag release) can never interleave with a
//! dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::backend::ActionBackend;
use crate::config::GestureConfig;
use crate::error::ConfigError;
use crate::gesture_loop::{FrameTimingStats, GestureLoop, Observer};
use crate::tracking::LandmarkSource;

/// Interval between periodic status log lines.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Request sent to a running service.
pub enum ControlCommand {
    SetEnabled(bool),
    SwitchBackend(Box<dyn ActionBackend>),
}

/// Cloneable remote control for a [`GestureService`].
#[derive(Clone)]
pub struct ControlHandle {
    stop: Arc<AtomicBool>,
    tx: Sender<ControlCommand>,
}

impl ControlHandle {
    /// Ask the loop to stop after the current iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Returns false if the service is gone.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.tx.send(ControlCommand::SetEnabled(enabled)).is_ok()
    }

    /// Returns false if the service is gone.
    pub fn switch_backend(&self, backend: Box<dyn ActionBackend>) -> bool {
        self.tx.send(ControlCommand::SwitchBackend(backend)).is_ok()
    }
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stop requested through a handle or the shutdown flag.
    Requested,
    /// The landmark source ended.
    SourceEnded,
    /// The configured run time elapsed.
    TimeLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::SourceEnded => "source-ended",
            Self::TimeLimit => "time-limit",
        }
    }
}

/// Summary returned by [`GestureService::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub frames: u64,
    pub timing: FrameTimingStats,
}

pub struct GestureService {
    gesture_loop: GestureLoop,
    frame_budget: Duration,
    exit_after: Option<Duration>,
    stop: Arc<AtomicBool>,
    tx: Sender<ControlCommand>,
    rx: Receiver<ControlCommand>,
}

impl GestureService {
    pub fn new(
        config: &GestureConfig,
        source: Box<dyn LandmarkSource>,
        backend: Box<dyn ActionBackend>,
    ) -> Result<Self, ConfigError> {
        let gesture_loop = GestureLoop::new(config, source, backend)?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            gesture_loop,
            frame_budget: config.frame_budget(),
            exit_after: None,
            stop: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        })
    }

    /// Stop on its own after `limit` (for CI runs).
    pub fn with_exit_after(mut self, limit: Option<Duration>) -> Self {
        self.exit_after = limit;
        self
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            stop: Arc::clone(&self.stop),
            tx: self.tx.clone(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.gesture_loop.add_observer(observer);
    }

    pub fn gesture_loop(&self) -> &GestureLoop {
        &self.gesture_loop
    }

    pub fn gesture_loop_mut(&mut self) -> &mut GestureLoop {
        &mut self.gesture_loop
    }

    /// Apply queued control commands.
    pub fn apply_commands(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                ControlCommand::SetEnabled(enabled) => {
                    info!(enabled, "control: set enabled");
                    self.gesture_loop.set_enabled(enabled);
                }
                ControlCommand::SwitchBackend(backend) => {
                    let old = self.gesture_loop.switch_backend(backend);
                    debug!(backend = old.name(), "previous backend dropped");
                }
            }
        }
    }

    /// Run until stopped, the source ends, or the time limit fires.
    ///
    /// `shutdown` is an external flag (e.g. set from a signal handler)
    /// checked alongside the handles' stop flag.  Any open drag is released
    /// before returning.
    pub fn run(&mut self, shutdown: &AtomicBool) -> RunSummary {
        let start = Instant::now();
        let mut last_status_log = Instant::now();
        info!(
            budget_ms = self.frame_budget.as_secs_f64() * 1000.0,
            source = self.gesture_loop.source().name(),
            backend = self.gesture_loop.backend().name(),
            "entering gesture loop"
        );

        let reason = loop {
            if shutdown.load(Ordering::SeqCst) || self.stop.load(Ordering::SeqCst) {
                info!("shutdown requested, exiting");
                break StopReason::Requested;
            }
            if let Some(limit) = self.exit_after {
                if start.elapsed() >= limit {
                    info!(secs = limit.as_secs_f64(), "exit timer fired");
                    break StopReason::TimeLimit;
                }
            }
            if self.gesture_loop.source().is_exhausted() {
                info!(source = self.gesture_loop.source().name(), "landmark source ended");
                break StopReason::SourceEnded;
            }

            self.apply_commands();

            let iteration = Instant::now();
            self.gesture_loop.poll_once();

            if last_status_log.elapsed() >= STATUS_INTERVAL {
                self.log_status();
                last_status_log = Instant::now();
            }

            let spent = iteration.elapsed();
            if spent < self.frame_budget {
                thread::sleep(self.frame_budget - spent);
            }
        };

        self.gesture_loop.shutdown();
        let timing = self.gesture_loop.timing().stats();
        info!(
            reason = reason.as_str(),
            frames = timing.total_frames,
            missed_pct = timing.missed_pct,
            "gesture loop stopped"
        );
        RunSummary {
            reason,
            frames: timing.total_frames,
            timing,
        }
    }

    fn log_status(&self) {
        let gl = &self.gesture_loop;
        let s = gl.timing().stats();
        info!(
            status = gl.status().as_str(),
            backend = gl.backend().name(),
            confirmed = gl.fsm().confirmed().as_str(),
            frames = s.total_frames,
            missed_pct = s.missed_pct,
            p50_ms = s.total_p50,
            p99_ms = s.total_p99,
            sexp = %gl.status_sexp(),
            "gesture loop status"
        );
    }
}

// ── Tests ──────────────────────────────────────────────────
