//! Per-poll timing for the gesture loop.
//!
//! Each iteration is split into the landmark wait, tracking (classify and
//! confirm) and backend dispatch.  A slow container exec shows up in
//! `dispatch` and directly stretches the poll period.

use std::collections::VecDeque;
use std::time::Duration;

/// Rolling timing statistics over the last `window` polls.
#[derive(Debug)]
pub struct FrameTiming {
    source_ms: VecDeque<f64>,
    tracking_ms: VecDeque<f64>,
    dispatch_ms: VecDeque<f64>,
    total_ms: VecDeque<f64>,
    window: usize,
    /// Polls recorded since start.
    pub total_frames: u64,
    /// Polls whose total exceeded the frame budget.
    pub missed_frames: u64,
    budget_ms: f64,
}

impl FrameTiming {
    pub fn new(window: usize, budget: Duration) -> Self {
        let window = window.max(1);
        Self {
            source_ms: VecDeque::with_capacity(window),
            tracking_ms: VecDeque::with_capacity(window),
            dispatch_ms: VecDeque::with_capacity(window),
            total_ms: VecDeque::with_capacity(window),
            window,
            total_frames: 0,
            missed_frames: 0,
            budget_ms: budget.as_secs_f64() * 1000.0,
        }
    }

    /// Record one poll iteration.
    pub fn record(&mut self, source: Duration, tracking: Duration, dispatch: Duration) {
        let (s, t, d) = (ms(source), ms(tracking), ms(dispatch));
        let total = s + t + d;
        let window = self.window;
        push(&mut self.source_ms, s, window);
        push(&mut self.tracking_ms, t, window);
        push(&mut self.dispatch_ms, d, window);
        push(&mut self.total_ms, total, window);

        self.total_frames += 1;
        if total > self.budget_ms {
            self.missed_frames += 1;
        }
    }

    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    pub fn stats(&self) -> FrameTimingStats {
        let total = sorted(&self.total_ms);
        let dispatch = sorted(&self.dispatch_ms);
        FrameTimingStats {
            source_p50: percentile(&sorted(&self.source_ms), 50.0),
            tracking_p50: percentile(&sorted(&self.tracking_ms), 50.0),
            dispatch_p50: percentile(&dispatch, 50.0),
            dispatch_p99: percentile(&dispatch, 99.0),
            total_p50: percentile(&total, 50.0),
            total_p95: percentile(&total, 95.0),
            total_p99: percentile(&total, 99.0),
            missed_pct: if self.total_frames > 0 {
                self.missed_frames as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
            total_frames: self.total_frames,
            missed_frames: self.missed_frames,
        }
    }

    /// Stats as an s-expression.
    pub fn stats_sexp(&self) -> String {
        let s = self.stats();
        format!(
            "(:source-p50 {:.1} :tracking-p50 {:.2} :dispatch-p50 {:.1} :dispatch-p99 {:.1} :total-p50 {:.1} :total-p99 {:.1} :budget {:.1} :missed-pct {:.1} :total-frames {} :missed-frames {})",
            s.source_p50,
            s.tracking_p50,
            s.dispatch_p50,
            s.dispatch_p99,
            s.total_p50,
            s.total_p99,
            self.budget_ms,
            s.missed_pct,
            s.total_frames,
            s.missed_frames,
        )
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn push(samples: &mut VecDeque<f64>, value: f64, window: usize) {
    if samples.len() == window {
        samples.pop_front();
    }
    samples.push_back(value);
}

fn sorted(samples: &VecDeque<f64>) -> Vec<f64> {
    let mut v: Vec<f64> = samples.iter().copied().collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p / 100.0).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Computed timing statistics, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTimingStats {
    pub source_p50: f64,
    pub tracking_p50: f64,
    pub dispatch_p50: f64,
    pub dispatch_p99: f64,
    pub total_p50: f64,
    pub total_p95: f64,
    pub total_p99: f64,
    pub missed_pct: f64,
    pub total_frames: u64,
    pub missed_frames: u64,
}
