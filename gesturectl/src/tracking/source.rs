//! Landmark sources - where hand samples come from.
//!
//! The hand-landmark model itself runs outside this crate.  A source only
//! hands over its latest detection (or "no hand") when polled.  Blocking
//! producers run on their own thread behind [`ThreadedSource`], which
//! bounds each poll by the frame budget: a late frame is treated as
//! "no hand" and the loop moves on.  Frames that arrive while the loop is
//! busy overwrite each other; only the newest is delivered.

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::landmarks::LandmarkSample;

// ── LandmarkSource trait ───────────────────────────────────

/// Anything that can be polled for the current hand sample.
pub trait LandmarkSource: Send {
    /// Return the latest sample, or `None` when no hand is visible.
    /// Must not block longer than `budget`.
    fn poll(&mut self, budget: Duration) -> Option<LandmarkSample>;

    /// Short name for logs.
    fn name(&self) -> &str;

    /// True once the source can never produce another sample.
    fn is_exhausted(&self) -> bool {
        false
    }
}

// ── ScriptedSource ─────────────────────────────────────────

/// Replays a fixed in-memory sequence, then reports no hand.
pub struct ScriptedSource {
    frames: VecDeque<Option<LandmarkSample>>,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = Option<LandmarkSample>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for ScriptedSource {
    fn poll(&mut self, _budget: Duration) -> Option<LandmarkSample> {
        self.frames.pop_front().flatten()
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn is_exhausted(&self) -> bool {
        self.frames.is_empty()
    }
}

// ── ReplaySource ───────────────────────────────────────────

/// Reads one JSON frame per poll from a recording.
///
/// Each line is a landmark frame or `null`.  Malformed lines are logged
/// and count as "no hand"; end of input keeps reporting no hand.
pub struct ReplaySource<R> {
    reader: R,
    line: String,
    started: Instant,
    line_no: u64,
    finished: bool,
}

impl<R: BufRead + Send> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            started: Instant::now(),
            line_no: 0,
            finished: false,
        }
    }

    /// Whether the recording has been fully consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<R: BufRead + Send> LandmarkSource for ReplaySource<R> {
    fn poll(&mut self, _budget: Duration) -> Option<LandmarkSample> {
        if self.finished {
            return None;
        }
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => {
                    info!(frames = self.line_no, "replay finished");
                    self.finished = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "replay read failed");
                    self.finished = true;
                    return None;
                }
            }
            self.line_no += 1;
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let now = self.started.elapsed().as_secs_f64();
            return match LandmarkSample::from_json(trimmed, now) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(line = self.line_no, error = %e, "skipping replay frame");
                    None
                }
            };
        }
    }

    fn name(&self) -> &str {
        "replay"
    }

    fn is_exhausted(&self) -> bool {
        self.finished
    }
}

// ── Threaded producers ─────────────────────────────────────

/// A blocking frame producer that runs on its own thread.
///
/// Publishes `Some(sample)` or `None` (no hand) per detected frame; returns
/// when its input ends or [`FrameSender::send`] reports the source gone.
pub trait SampleProducer: Send + 'static {
    fn run(self: Box<Self>, tx: FrameSender);
}

/// Single-frame mailbox shared by a producer thread and its source.
#[derive(Default)]
struct Slot {
    /// Newest frame the loop has not picked up yet.
    pending: Option<Option<LandmarkSample>>,
    /// Producer finished (its sender was dropped).
    closed: bool,
    /// The polling side was dropped.
    receiver_gone: bool,
    /// Frames replaced before the loop could read them.
    dropped: u64,
}

type Shared = Arc<(Mutex<Slot>, Condvar)>;

fn lock(shared: &Shared) -> MutexGuard<'_, Slot> {
    shared.0.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer end of a [`ThreadedSource`].  A newer frame replaces one the
/// loop has not read yet, so a slow poll always sees the latest frame.
pub struct FrameSender {
    shared: Shared,
}

impl FrameSender {
    /// Publish a frame.  Returns false once the source is gone.
    pub fn send(&self, frame: Option<LandmarkSample>) -> bool {
        let mut slot = lock(&self.shared);
        if slot.receiver_gone {
            return false;
        }
        if slot.pending.replace(frame).is_some() {
            slot.dropped += 1;
        }
        self.shared.1.notify_one();
        true
    }
}

impl Drop for FrameSender {
    fn drop(&mut self) {
        lock(&self.shared).closed = true;
        self.shared.1.notify_one();
    }
}

/// Adapts a blocking [`SampleProducer`] to the poll interface.
pub struct ThreadedSource {
    shared: Shared,
    name: String,
    timeouts: u64,
    disconnected: bool,
}

impl ThreadedSource {
    /// Spawn `producer` on its own thread.
    pub fn spawn<P: SampleProducer>(name: &str, producer: P) -> Self {
        let shared: Shared = Arc::new((Mutex::new(Slot::default()), Condvar::new()));
        let tx = FrameSender {
            shared: Arc::clone(&shared),
        };
        let thread_name = format!("landmarks-{name}");
        let spawned = thread::Builder::new()
            .name(thread_name)
            .spawn(move || Box::new(producer).run(tx));
        if let Err(e) = spawned {
            // The sender went down with the closure, so the slot is closed
            // and every poll degrades to "no hand".
            warn!(source = name, error = %e, "failed to start landmark thread");
        }
        Self {
            shared,
            name: name.to_string(),
            timeouts: 0,
            disconnected: false,
        }
    }

    /// Polls that ran out of budget so far.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Frames superseded by a newer one before they were polled.
    pub fn dropped(&self) -> u64 {
        lock(&self.shared).dropped
    }
}

impl LandmarkSource for ThreadedSource {
    fn poll(&mut self, budget: Duration) -> Option<LandmarkSample> {
        if self.disconnected {
            return None;
        }
        let shared = Arc::clone(&self.shared);
        let (mut slot, _) = shared
            .1
            .wait_timeout_while(lock(&shared), budget, |s| s.pending.is_none() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(frame) = slot.pending.take() {
            return frame;
        }
        if slot.closed {
            drop(slot);
            warn!(source = %self.name, "landmark producer stopped");
            self.disconnected = true;
            return None;
        }
        drop(slot);
        self.timeouts += 1;
        debug!(source = %self.name, timeouts = self.timeouts, "landmark poll timed out");
        None
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_exhausted(&self) -> bool {
        self.disconnected
    }
}

impl Drop for ThreadedSource {
    fn drop(&mut self) {
        lock(&self.shared).receiver_gone = true;
    }
}

/// Reads JSON landmark frames line by line from a blocking reader, such as
/// stdin piped from an external landmark model.
pub struct JsonLinesProducer<R> {
    reader: R,
}

impl<R: BufRead + Send + 'static> JsonLinesProducer<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send + 'static> SampleProducer for JsonLinesProducer<R> {
    fn run(self: Box<Self>, tx: FrameSender) {
        let started = Instant::now();
        for (i, line) in self.reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(error = %e, "landmark stream read failed");
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let frame = match LandmarkSample::from_json(&line, started.elapsed().as_secs_f64()) {
                Ok(f) => f,
                Err(e) => {
                    warn!(line = i + 1, error = %e, "skipping landmark frame");
                    continue;
                }
            };
            if !tx.send(frame) {
                return;
            }
        }
        info!("landmark stream ended");
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::landmarks::{Handedness, LANDMARK_COUNT};
    use std::io::Cursor;

    fn sample(t: f64) -> LandmarkSample {
        LandmarkSample::new(&[[0.5, 0.5, 0.0]; LANDMARK_COUNT], 0.9, Handedness::Right, t)
    }

    #[test]
    fn test_scripted_source() {
        let mut source = ScriptedSource::new(vec![Some(sample(0.0)), None, Some(sample(0.1))]);
        let budget = Duration::from_millis(33);
        assert!(source.poll(budget).is_some());
        assert!(source.poll(budget).is_none());
        assert!(source.poll(budget).is_some());
        assert_eq!(source.remaining(), 0);
        assert!(source.is_exhausted());
        assert!(source.poll(budget).is_none());
    }

    #[test]
    fn test_replay_source() {
        let text = "{\"landmarks\": [[0.1, 0.2, 0.0]], \"timestamp\": 0.5}\n\nnull\nnot json\n";
        let mut source = ReplaySource::new(Cursor::new(text));
        let budget = Duration::from_millis(33);

        let first = source.poll(budget).unwrap();
        assert_eq!(first.len(), 1);
        assert!((first.timestamp_s - 0.5).abs() < f64::EPSILON);
        assert!(source.poll(budget).is_none()); // null
        assert!(source.poll(budget).is_none()); // malformed
        assert!(!source.is_finished());
        assert!(source.poll(budget).is_none());
        assert!(source.is_finished());
        assert!(source.is_exhausted());
    }

    struct Fixed(Vec<Option<LandmarkSample>>);

    impl SampleProducer for Fixed {
        fn run(self: Box<Self>, tx: FrameSender) {
            for frame in self.0 {
                if !tx.send(frame) {
                    return;
                }
            }
        }
    }

    struct Silent;

    impl SampleProducer for Silent {
        fn run(self: Box<Self>, tx: FrameSender) {
            thread::sleep(Duration::from_millis(500));
            drop(tx);
        }
    }

    #[test]
    fn test_threaded_source_keeps_latest() {
        let mut source = ThreadedSource::spawn("fixed", Fixed(vec![Some(sample(1.0)), Some(sample(2.0))]));
        // Give the producer time to queue both frames.
        thread::sleep(Duration::from_millis(50));
        let got = source.poll(Duration::from_millis(100)).unwrap();
        assert!((got.timestamp_s - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_threaded_source_timeout_is_no_hand() {
        let mut source = ThreadedSource::spawn("silent", Silent);
        let start = Instant::now();
        assert!(source.poll(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(source.timeouts(), 1);
    }

    #[test]
    fn test_threaded_source_disconnect() {
        let mut source = ThreadedSource::spawn("empty", Fixed(Vec::new()));
        thread::sleep(Duration::from_millis(50));
        assert!(source.poll(Duration::from_millis(20)).is_none());
        assert!(source.is_exhausted());
        assert!(source.poll(Duration::from_millis(20)).is_none());
        assert_eq!(source.timeouts(), 0);
    }

    #[test]
    fn test_json_lines_producer() {
        let text = "null\n{\"landmarks\": [[0.3, 0.3, 0.0]], \"timestamp\": 4.0}\n";
        let mut source = ThreadedSource::spawn("stdin", JsonLinesProducer::new(Cursor::new(text)));
        thread::sleep(Duration::from_millis(50));
        let got = source.poll(Duration::from_millis(100)).unwrap();
        assert!((got.timestamp_s - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_json_lines_backlog_keeps_newest() {
        let text: String = (0..20)
            .map(|i| format!("{{\"landmarks\": [[0.3, 0.3, 0.0]], \"timestamp\": {i}}}\n"))
            .collect();
        let mut source = ThreadedSource::spawn("stdin", JsonLinesProducer::new(Cursor::new(text)));
        // Stand-in for a slow backend call between polls.
        thread::sleep(Duration::from_millis(100));
        let got = source.poll(Duration::from_millis(100)).unwrap();
        assert!((got.timestamp_s - 19.0).abs() < f64::EPSILON, "got {}", got.timestamp_s);
        assert_eq!(source.dropped(), 19);

        // Stream ended; nothing stale is left behind.
        assert!(source.poll(Duration::from_millis(20)).is_none());
        assert!(source.is_exhausted());
    }
}
