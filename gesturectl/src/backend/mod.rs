//! Action backends - local desktop and containerized desktop.
//!
//! A backend turns dispatcher decisions into pointer and keyboard effects.
//! The loop holds exactly one `Box<dyn ActionBackend>` and never branches
//! on which implementation it is.  Every call returns a [`BackendResult`];
//! failures are values the loop logs, never panics.

pub mod local;
pub mod remote;
pub mod xdo;

#[cfg(test)]
pub(crate) mod recording;

use std::time::Instant;

use crate::config::GestureConfig;
use crate::error::BackendResult;
use crate::tracking::Vec2;

pub use local::LocalBackend;
pub use remote::RemoteContainerBackend;
pub use xdo::{CommandRunner, SystemRunner, XdoCommand};

// ── Capability interface ───────────────────────────────────

/// Pointer and keyboard effects, identical across backends.
///
/// Contract shared by all implementations:
/// - at most one drag session is open at a time; `drag_start` while open
///   is ignored, `drag_continue` without one opens it first;
/// - `drag_end` without an open session is a no-op;
/// - a click, right-click or scroll closes an open drag first;
/// - `set_enabled(false)` closes an open drag before the flag flips, and
///   a disabled backend rejects every effect with `BackendError::Disabled`.
pub trait ActionBackend: Send {
    /// Short name for logs and status.
    fn name(&self) -> &str;

    /// Move the pointer to a normalized hand position (mirrored on x).
    fn move_to(&mut self, pos: Vec2) -> BackendResult;

    fn click(&mut self) -> BackendResult;

    fn right_click(&mut self) -> BackendResult;

    /// Press the left button and open a drag session.
    fn drag_start(&mut self) -> BackendResult;

    /// Move while the drag button is held.
    fn drag_continue(&mut self, pos: Vec2) -> BackendResult;

    /// Release the drag button, if a session is open.
    fn drag_end(&mut self) -> BackendResult;

    fn scroll(&mut self, direction: ScrollDirection, magnitude: u32) -> BackendResult;

    fn navigate_back(&mut self) -> BackendResult;

    fn navigate_forward(&mut self) -> BackendResult;

    fn zoom_in(&mut self) -> BackendResult;

    /// Whether the execution target can currently accept commands.
    fn is_reachable(&mut self) -> bool;

    /// Whether a drag session is open.
    fn drag_active(&self) -> bool;

    /// Enable or disable the backend.  Disabling force-closes any open
    /// drag session first; the result reports that release.
    fn set_enabled(&mut self, enabled: bool) -> BackendResult;

    fn is_enabled(&self) -> bool;
}

// ── Backend selection ──────────────────────────────────────

/// Backend type selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Construct the selected backend with a real process runner.
pub fn build(kind: BackendKind, config: &GestureConfig) -> Box<dyn ActionBackend> {
    match kind {
        BackendKind::Local => Box::new(LocalBackend::new(config.local_backend_config(), SystemRunner)),
        BackendKind::Remote => Box::new(RemoteContainerBackend::new(
            config.remote_backend_config(),
            config.remote.clone(),
            SystemRunner,
        )),
    }
}

// ── Platform key chords ────────────────────────────────────

/// Host platform, selecting browser navigation chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        }
    }

    pub fn back_chord(&self) -> &'static str {
        match self {
            Self::MacOs => "super+bracketleft",
            Self::Linux | Self::Windows => "alt+Left",
        }
    }

    pub fn forward_chord(&self) -> &'static str {
        match self {
            Self::MacOs => "super+bracketright",
            Self::Linux | Self::Windows => "alt+Right",
        }
    }

    pub fn zoom_in_chord(&self) -> &'static str {
        match self {
            Self::MacOs => "super+plus",
            Self::Linux | Self::Windows => "ctrl+plus",
        }
    }
}

// ── Shared action types ────────────────────────────────────

/// Scroll direction (wheel button 4 or 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn button(&self) -> u8 {
        match self {
            Self::Up => 4,
            Self::Down => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// An issued button-down without its matching button-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub opened_at: Instant,
    /// `drag_continue` moves issued so far.
    pub moves: u32,
}

impl DragSession {
    pub fn open() -> Self {
        Self {
            opened_at: Instant::now(),
            moves: 0,
        }
    }
}

/// Map a normalized hand position to screen pixels.
///
/// The camera image is mirrored, so x is flipped.  Both axes are clamped
/// to `[margin, dimension - margin]`.
pub fn map_to_screen(pos: Vec2, width: u32, height: u32, margin: u32) -> (i32, i32) {
    let x = (1.0 - pos.x) * f64::from(width);
    let y = pos.y * f64::from(height);
    (
        clamp_axis(x, width, margin),
        clamp_axis(y, height, margin),
    )
}

/// Clamp one pixel coordinate into the safe zone of an axis.
pub fn clamp_axis(value: f64, dimension: u32, margin: u32) -> i32 {
    let lo = f64::from(margin);
    let hi = f64::from(dimension.saturating_sub(margin)).max(lo);
    let v = if value.is_finite() { value } else { lo };
    v.clamp(lo, hi).round() as i32
}

/// Scroll clicks for a vertical hand velocity, clamped to 1..=20.
pub fn scroll_magnitude(velocity_y: f64, scroll_speed: f64) -> u32 {
    let raw = velocity_y.abs() * scroll_speed * 10.0;
    if raw.is_finite() {
        raw.clamp(1.0, 20.0).round() as u32
    } else {
        20
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_mapping() {
        // Mirrored: raw (0,0) is the top-right corner.
        assert_eq!(map_to_screen(Vec2::new(0.0, 0.0), 1920, 1080, 10), (1910, 10));
        assert_eq!(map_to_screen(Vec2::new(1.0, 1.0), 1920, 1080, 10), (10, 1070));
    }

    #[test]
    fn test_center_mapping() {
        assert_eq!(map_to_screen(Vec2::new(0.5, 0.5), 1920, 1080, 10), (960, 540));
    }

    #[test]
    fn test_out_of_range_positions_clamped() {
        assert_eq!(map_to_screen(Vec2::new(-0.5, 1.5), 800, 600, 0), (800, 600));
        assert_eq!(map_to_screen(Vec2::new(f64::NAN, 0.5), 800, 600, 5), (5, 300));
    }

    #[test]
    fn test_scroll_magnitude_clamped() {
        assert_eq!(scroll_magnitude(0.0, 1.0), 1);
        assert_eq!(scroll_magnitude(-0.5, 1.0), 5);
        assert_eq!(scroll_magnitude(0.5, 2.0), 10);
        assert_eq!(scroll_magnitude(9.0, 1.0), 20);
        assert_eq!(scroll_magnitude(f64::INFINITY, 1.0), 20);
    }

    #[test]
    fn test_platform_chords() {
        assert_eq!(Platform::Linux.back_chord(), "alt+Left");
        assert_eq!(Platform::Windows.forward_chord(), "alt+Right");
        assert_eq!(Platform::MacOs.back_chord(), "super+bracketleft");
        assert_eq!(Platform::MacOs.zoom_in_chord(), "super+plus");
        assert_eq!(Platform::Linux.zoom_in_chord(), "ctrl+plus");
    }

    #[test]
    fn test_scroll_buttons() {
        assert_eq!(ScrollDirection::Up.button(), 4);
        assert_eq!(ScrollDirection::Down.button(), 5);
    }

    #[test]
    fn test_build_names() {
        let config = GestureConfig::default();
        assert_eq!(build(BackendKind::Local, &config).name(), "local");
        assert_eq!(build(BackendKind::Remote, &config).name(), "remote");
    }
}
