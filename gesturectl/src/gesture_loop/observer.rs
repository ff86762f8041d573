//! Per-poll snapshots for UIs and dashboards.
//!
//! Observers see every poll, raw gesture included, whether or not anything
//! was confirmed or dispatched.  They are called synchronously from the
//! loop thread and get read-only snapshots.

use std::io::Write;

use serde::Serialize;
use tracing::warn;

use crate::tracking::{GestureSymbol, Handedness, Vec2};

/// Backend health as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Active,
    Disabled,
    /// Unreachable, or failing repeatedly.
    Unreachable,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::Unreachable => "unreachable",
        }
    }
}

/// Serializable state of one poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GestureSnapshot {
    /// Currently confirmed gesture (`none` while holding or idle).
    pub confirmed: GestureSymbol,
    /// This frame's raw classification.
    pub raw: GestureSymbol,
    pub position: Vec2,
    pub velocity: Vec2,
    pub confidence: f64,
    pub handedness: Option<Handedness>,
    /// Raw landmark points, for visualization.
    pub landmarks: Vec<[f64; 3]>,
    pub timestamp: f64,
    pub backend: String,
    pub status: BackendStatus,
}

impl GestureSnapshot {
    /// Format as an s-expression event.  Landmarks are reduced to a count.
    pub fn to_sexp(&self) -> String {
        let hand = match self.handedness {
            Some(h) => format!(":{}", h.as_str()),
            None => "nil".to_string(),
        };
        format!(
            "(:type :gesture :confirmed :{} :raw :{} :x {:.4} :y {:.4} :vx {:.4} :vy {:.4} :confidence {:.2} :hand {} :landmarks {} :timestamp {:.3} :backend \"{}\" :status :{})",
            self.confirmed.as_str(),
            self.raw.as_str(),
            self.position.x,
            self.position.y,
            self.velocity.x,
            self.velocity.y,
            self.confidence,
            hand,
            self.landmarks.len(),
            self.timestamp,
            escape_string(&self.backend),
            self.status.as_str(),
        )
    }
}

pub(crate) fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Observer trait ─────────────────────────────────────────

/// Receives one snapshot per poll.
pub trait Observer: Send {
    fn on_frame(&mut self, snapshot: &GestureSnapshot);
}

impl<F> Observer for F
where
    F: FnMut(&GestureSnapshot) + Send,
{
    fn on_frame(&mut self, snapshot: &GestureSnapshot) {
        self(snapshot)
    }
}

/// Writes each snapshot as one JSON line.
///
/// A write failure (e.g. a closed pipe) is logged once and the observer
/// goes quiet; it never stops the loop.
pub struct JsonLinesObserver<W: Write + Send> {
    out: W,
    failed: bool,
}

impl<W: Write + Send> JsonLinesObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, snapshot: &GestureSnapshot) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, snapshot)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write + Send> Observer for JsonLinesObserver<W> {
    fn on_frame(&mut self, snapshot: &GestureSnapshot) {
        if self.failed {
            return;
        }
        if let Err(e) = self.write(snapshot) {
            warn!(error = %e, "snapshot output failed, disabling");
            self.failed = true;
        }
    }
}

/// Writes each snapshot as one s-expression line (`GestureSnapshot::to_sexp`).
///
/// Same failure policy as [`JsonLinesObserver`].
pub struct SexpLinesObserver<W: Write + Send> {
    out: W,
    failed: bool,
}

impl<W: Write + Send> SexpLinesObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Observer for SexpLinesObserver<W> {
    fn on_frame(&mut self, snapshot: &GestureSnapshot) {
        if self.failed {
            return;
        }
        let line = snapshot.to_sexp();
        let written = writeln!(self.out, "{line}").and_then(|()| self.out.flush());
        if let Err(e) = written {
            warn!(error = %e, "snapshot output failed, disabling");
            self.failed = true;
        }
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Value following `:key` in an s-expression plist.
#[cfg(test)]
pub(crate) fn sexp_get<'a>(value: &'a lexpr::Value, key: &str) -> Option<&'a lexpr::Value> {
    let mut current = value;
    while let lexpr::Value::Cons(pair) = current {
        let is_key = match pair.car() {
            lexpr::Value::Keyword(k) => k.as_ref() == key,
            lexpr::Value::Symbol(s) => s.strip_prefix(':') == Some(key),
            _ => false,
        };
        if is_key {
            return match pair.cdr() {
                lexpr::Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Name of a keyword or symbol value, without the leading colon.
#[cfg(test)]
pub(crate) fn sexp_name(value: &lexpr::Value) -> Option<String> {
    match value {
        lexpr::Value::Keyword(k) => Some(k.to_string()),
        lexpr::Value::Symbol(s) => Some(s.strip_prefix(':').unwrap_or(&**s).to_string()),
        lexpr::Value::String(s) => Some(s.to_string()),
        lexpr::Value::Nil | lexpr::Value::Null => Some("nil".to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn make_snapshot(raw: GestureSymbol) -> GestureSnapshot {
    GestureSnapshot {
        confirmed: GestureSymbol::None,
        raw,
        position: Vec2::new(0.25, 0.75),
        velocity: Vec2::new(0.0, -0.5),
        confidence: 0.93,
        handedness: Some(Handedness::Left),
        landmarks: vec![[0.1, 0.2, 0.0]; 21],
        timestamp: 1.5,
        backend: "local".to_string(),
        status: BackendStatus::Active,
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_snapshot_shape() {
        let snap = make_snapshot(GestureSymbol::OpenPalm);
        let v: serde_json::Value = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["raw"], "open-palm");
        assert_eq!(v["confirmed"], "none");
        assert_eq!(v["handedness"], "left");
        assert_eq!(v["status"], "active");
        assert_eq!(v["position"]["x"], 0.25);
        assert_eq!(v["velocity"]["y"], -0.5);
        assert_eq!(v["landmarks"].as_array().unwrap().len(), 21);
    }

    #[test]
    fn test_sexp_parses() {
        let snap = make_snapshot(GestureSymbol::SwipeUp);
        let value = lexpr::from_str(&snap.to_sexp()).unwrap();
        assert_eq!(sexp_name(sexp_get(&value, "raw").unwrap()).as_deref(), Some("swipe-up"));
        assert_eq!(sexp_name(sexp_get(&value, "hand").unwrap()).as_deref(), Some("left"));
        assert_eq!(sexp_name(sexp_get(&value, "status").unwrap()).as_deref(), Some("active"));
        assert_eq!(sexp_get(&value, "landmarks").and_then(|v| v.as_u64()), Some(21));
    }

    #[test]
    fn test_sexp_no_hand() {
        let mut snap = make_snapshot(GestureSymbol::None);
        snap.handedness = None;
        snap.status = BackendStatus::Unreachable;
        snap.backend = "re\"mote".to_string();
        let sexp = snap.to_sexp();
        assert!(sexp.contains(":hand nil"));
        assert!(sexp.contains(":status :unreachable"));
        assert!(lexpr::from_str(&sexp).is_ok());
    }

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut obs = |s: &GestureSnapshot| seen.push(s.raw);
            obs.on_frame(&make_snapshot(GestureSymbol::Pinch));
            obs.on_frame(&make_snapshot(GestureSymbol::Grab));
        }
        assert_eq!(seen, vec![GestureSymbol::Pinch, GestureSymbol::Grab]);
    }

    #[test]
    fn test_json_lines_observer() {
        let mut obs = JsonLinesObserver::new(Vec::new());
        obs.on_frame(&make_snapshot(GestureSymbol::Point));
        obs.on_frame(&make_snapshot(GestureSymbol::Peace));
        let out = String::from_utf8(obs.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["raw"], "peace");
    }

    #[test]
    fn test_sexp_lines_observer() {
        let mut obs = SexpLinesObserver::new(Vec::new());
        obs.on_frame(&make_snapshot(GestureSymbol::Pinch));
        obs.on_frame(&make_snapshot(GestureSymbol::Spread));
        let out = String::from_utf8(obs.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let value = lexpr::from_str(lines[1]).unwrap();
        assert_eq!(sexp_name(sexp_get(&value, "raw").unwrap()).as_deref(), Some("spread"));
        assert_eq!(sexp_name(sexp_get(&value, "type").unwrap()).as_deref(), Some("gesture"));
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_observer_failure_is_quiet() {
        let mut obs = JsonLinesObserver::new(Broken);
        obs.on_frame(&make_snapshot(GestureSymbol::Point));
        assert!(obs.failed);
        obs.on_frame(&make_snapshot(GestureSymbol::Point));
    }

    #[test]
    fn test_sexp_lines_observer_failure_is_quiet() {
        let mut obs = SexpLinesObserver::new(Broken);
        obs.on_frame(&make_snapshot(GestureSymbol::Point));
        assert!(obs.failed);
        obs.on_frame(&make_snapshot(GestureSymbol::Point));
    }
}
