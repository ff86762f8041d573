//! Runtime configuration.
//!
//! `GestureConfig` is loaded once at startup (TOML file plus CLI
//! overrides), validated, and never mutated afterwards.  `BackendConfig`
//! is the immutable slice of it the action backends see.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::Platform;
use crate::error::ConfigError;

// ── Remote section ─────────────────────────────────────────

/// Settings for the containerized-desktop backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Name of the container running the virtual desktop.
    pub container: String,
    /// Container runtime binary used for `exec` and `inspect`.
    pub runtime: String,
    /// X display inside the container.
    pub display: String,
    /// Upper bound on a single exec round-trip.
    pub exec_timeout_ms: u64,
    /// Minimum time between container-running checks.
    pub check_interval_ms: u64,
    /// Viewport width inside the container (falls back to `screen_width`).
    pub width: Option<u32>,
    /// Viewport height inside the container (falls back to `screen_height`).
    pub height: Option<u32>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            container: "desktop".to_string(),
            runtime: "docker".to_string(),
            display: ":1".to_string(),
            exec_timeout_ms: 2000,
            check_interval_ms: 2000,
            width: None,
            height: None,
        }
    }
}

// ── Top-level config ───────────────────────────────────────

/// Every recognized option of the gesture pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Multiplier applied to relative cursor moves (local backend).
    pub cursor_speed: f64,
    /// Multiplier applied to velocity-derived scroll amounts.
    pub scroll_speed: f64,
    /// Button hold time for clicks.
    pub click_duration_ms: u64,
    /// Minimum stable duration before a raw gesture is confirmed.
    pub hold_time_ms: u64,
    /// Hand speed (normalized units/s) above which motion is a swipe.
    pub swipe_threshold: f64,
    /// Thumb-to-index distance below which the hand is pinching.
    pub pinch_threshold: f64,
    /// Exponential smoothing factor for hand position (0 < α ≤ 1).
    pub smoothing_alpha: f64,
    pub target_fps: f64,
    /// Halve the poll rate to save CPU/GPU.
    pub performance_mode: bool,
    /// Allow pointer actions (move, click, drag, scroll).
    pub enable_desktop_control: bool,
    /// Allow browser key chords (back, forward, zoom).
    pub enable_browser_control: bool,
    /// Cursor is kept this many pixels away from every screen edge.
    pub safe_zone_margin_px: u32,
    /// Minimum spacing between discrete actions.
    pub action_interval_ms: u64,
    /// Per-poll landmark timeout; defaults to the frame budget.
    pub poll_timeout_ms: Option<u64>,
    /// Time the raw gesture must leave `Grab` before a drag is released;
    /// defaults to `hold_time_ms`.
    pub grab_release_ms: Option<u64>,
    /// Consecutive failed backend calls before status reads "unreachable".
    pub unreachable_after_failures: u32,
    pub remote: RemoteConfig,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920,
            screen_height: 1080,
            cursor_speed: 1.0,
            scroll_speed: 1.0,
            click_duration_ms: 50,
            hold_time_ms: 150,
            swipe_threshold: 0.15,
            pinch_threshold: 0.05,
            smoothing_alpha: 0.3,
            target_fps: 30.0,
            performance_mode: false,
            enable_desktop_control: true,
            enable_browser_control: true,
            safe_zone_margin_px: 10,
            action_interval_ms: 150,
            poll_timeout_ms: None,
            grab_release_ms: None,
            unreachable_after_failures: 3,
            remote: RemoteConfig::default(),
        }
    }
}

impl GestureConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Reject geometry and thresholds the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_geometry("screen", self.screen_width, self.screen_height, self.safe_zone_margin_px)?;
        if let (Some(w), Some(h)) = (self.remote.width, self.remote.height) {
            check_geometry("remote viewport", w, h, self.safe_zone_margin_px)?;
        } else if self.remote.width.is_some() != self.remote.height.is_some() {
            return Err(ConfigError::invalid(
                "remote viewport",
                "width and height must be given together",
            ));
        }
        check_positive("cursor_speed", self.cursor_speed)?;
        check_positive("scroll_speed", self.scroll_speed)?;
        check_positive("swipe_threshold", self.swipe_threshold)?;
        check_positive("pinch_threshold", self.pinch_threshold)?;
        check_positive("target_fps", self.target_fps)?;
        if self.target_fps > 240.0 {
            return Err(ConfigError::invalid("target_fps", "must not exceed 240"));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::invalid(
                "smoothing_alpha",
                format!("{} is outside (0, 1]", self.smoothing_alpha),
            ));
        }
        if self.poll_timeout_ms == Some(0) {
            return Err(ConfigError::invalid("poll_timeout_ms", "must be positive"));
        }
        if self.unreachable_after_failures == 0 {
            return Err(ConfigError::invalid(
                "unreachable_after_failures",
                "must be at least 1",
            ));
        }
        if self.remote.container.trim().is_empty() {
            return Err(ConfigError::invalid("remote.container", "must not be empty"));
        }
        Ok(())
    }

    /// Effective poll rate after performance mode.
    pub fn effective_fps(&self) -> f64 {
        if self.performance_mode {
            self.target_fps / 2.0
        } else {
            self.target_fps
        }
    }

    /// Time budget for one poll iteration.
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.effective_fps())
    }

    /// Landmark poll timeout (explicit, or the whole frame budget).
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.frame_budget())
    }

    pub fn hold_time(&self) -> Duration {
        Duration::from_millis(self.hold_time_ms)
    }

    pub fn grab_release(&self) -> Duration {
        Duration::from_millis(self.grab_release_ms.unwrap_or(self.hold_time_ms))
    }

    pub fn action_interval(&self) -> Duration {
        Duration::from_millis(self.action_interval_ms)
    }

    /// Backend view for the local desktop.
    pub fn local_backend_config(&self) -> BackendConfig {
        BackendConfig {
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            cursor_speed: self.cursor_speed,
            scroll_speed: self.scroll_speed,
            click_duration: Duration::from_millis(self.click_duration_ms),
            enable_desktop_control: self.enable_desktop_control,
            enable_browser_control: self.enable_browser_control,
            safe_zone_margin_px: self.safe_zone_margin_px,
            platform: Platform::current(),
        }
    }

    /// Backend view for the container desktop (always X11/Linux key chords).
    pub fn remote_backend_config(&self) -> BackendConfig {
        BackendConfig {
            screen_width: self.remote.width.unwrap_or(self.screen_width),
            screen_height: self.remote.height.unwrap_or(self.screen_height),
            platform: Platform::Linux,
            ..self.local_backend_config()
        }
    }

    /// Parse a "WxH" resolution string. Returns (width, height) or None.
    pub fn parse_resolution(s: &str) -> Option<(u32, u32)> {
        let (w, h) = s.split_once('x')?;
        let w = w.trim().parse::<u32>().ok()?;
        let h = h.trim().parse::<u32>().ok()?;
        if w > 0 && h > 0 {
            Some((w, h))
        } else {
            None
        }
    }
}

fn check_geometry(field: &'static str, w: u32, h: u32, margin: u32) -> Result<(), ConfigError> {
    if w == 0 || h == 0 {
        return Err(ConfigError::invalid(field, format!("{w}x{h} has a zero dimension")));
    }
    if u64::from(margin) * 2 >= u64::from(w.min(h)) {
        return Err(ConfigError::invalid(
            field,
            format!("safe-zone margin {margin}px leaves no usable area in {w}x{h}"),
        ));
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} must be positive")))
    }
}

// ── Backend config ─────────────────────────────────────────

/// Static configuration handed to an action backend at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub cursor_speed: f64,
    pub scroll_speed: f64,
    pub click_duration: Duration,
    pub enable_desktop_control: bool,
    pub enable_browser_control: bool,
    pub safe_zone_margin_px: u32,
    /// Selects the key chords for back/forward/zoom.
    pub platform: Platform,
}

impl Default for BackendConfig {
    fn default() -> Self {
        GestureConfig::default().local_backend_config()
    }
}

// ── Tests ──────────────────────────────────────────────────
