//! Local desktop backend - drives the host's X display through xdotool.
//!
//! Cursor moves are relative: the OS pointer position is read back each
//! frame and the step toward the hand target is scaled by `cursor_speed`.
//! Low `cursor_speed` values therefore give fine control at small hand
//! amplitudes.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::xdo::{parse_mouse_location, CommandRunner, XdoCommand, BUTTON_LEFT, BUTTON_RIGHT, XDOTOOL};
use super::{clamp_axis, map_to_screen, ActionBackend, DragSession, ScrollDirection};
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::tracking::Vec2;

/// Upper bound on one local xdotool call.
const LOCAL_EXEC_TIMEOUT: Duration = Duration::from_millis(500);

pub struct LocalBackend<R: CommandRunner = super::SystemRunner> {
    config: BackendConfig,
    runner: R,
    enabled: bool,
    drag: Option<DragSession>,
    /// Cleared when xdotool cannot be started at all.
    reachable: bool,
}

impl<R: CommandRunner> LocalBackend<R> {
    pub fn new(config: BackendConfig, runner: R) -> Self {
        debug!(
            width = config.screen_width,
            height = config.screen_height,
            platform = config.platform.as_str(),
            "local backend ready"
        );
        Self {
            config,
            runner,
            enabled: true,
            drag: None,
            reachable: true,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn exec(&mut self, cmd: XdoCommand) -> Result<String, BackendError> {
        match self.runner.run(XDOTOOL, cmd.args(), LOCAL_EXEC_TIMEOUT) {
            Ok(out) => {
                self.reachable = true;
                Ok(out)
            }
            Err(e) => {
                if matches!(e, BackendError::Spawn { .. }) {
                    self.reachable = false;
                }
                Err(e)
            }
        }
    }

    fn ensure_enabled(&self) -> BackendResult {
        if self.enabled {
            Ok(())
        } else {
            Err(BackendError::Disabled)
        }
    }

    /// Relative step from the current pointer toward the hand target.
    fn step_toward(&mut self, pos: Vec2) -> BackendResult {
        let c = &self.config;
        let (tx, ty) = map_to_screen(pos, c.screen_width, c.screen_height, c.safe_zone_margin_px);
        let (cx, cy) = parse_mouse_location(&self.exec(XdoCommand::get_mouse_location())?)?;

        let c = &self.config;
        let speed = c.cursor_speed;
        let nx = clamp_axis(
            f64::from(cx) + f64::from(tx - cx) * speed,
            c.screen_width,
            c.safe_zone_margin_px,
        );
        let ny = clamp_axis(
            f64::from(cy) + f64::from(ty - cy) * speed,
            c.screen_height,
            c.safe_zone_margin_px,
        );
        let (dx, dy) = (nx - cx, ny - cy);
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        self.exec(XdoCommand::mouse_move_relative(dx, dy)).map(drop)
    }

    fn press(&mut self, button: u8) -> BackendResult {
        self.ensure_enabled()?;
        self.drag_end()?;
        self.exec(XdoCommand::mouse_down(button))?;
        if !self.config.click_duration.is_zero() {
            thread::sleep(self.config.click_duration);
        }
        self.exec(XdoCommand::mouse_up(button)).map(drop)
    }

    fn chord(&mut self, chord: &str) -> BackendResult {
        self.ensure_enabled()?;
        self.exec(XdoCommand::key(chord)).map(drop)
    }
}

impl<R: CommandRunner> ActionBackend for LocalBackend<R> {
    fn name(&self) -> &str {
        "local"
    }

    fn move_to(&mut self, pos: Vec2) -> BackendResult {
        self.ensure_enabled()?;
        self.step_toward(pos)
    }

    fn click(&mut self) -> BackendResult {
        self.press(BUTTON_LEFT)
    }

    fn right_click(&mut self) -> BackendResult {
        self.press(BUTTON_RIGHT)
    }

    fn drag_start(&mut self) -> BackendResult {
        self.ensure_enabled()?;
        if self.drag.is_some() {
            debug!("drag already open, ignoring start");
            return Ok(());
        }
        self.exec(XdoCommand::mouse_down(BUTTON_LEFT))?;
        self.drag = Some(DragSession::open());
        debug!(backend = "local", "drag opened");
        Ok(())
    }

    fn drag_continue(&mut self, pos: Vec2) -> BackendResult {
        self.ensure_enabled()?;
        if self.drag.is_none() {
            warn!(backend = "local", "drag_continue without session, opening one");
            self.drag_start()?;
        }
        self.step_toward(pos)?;
        if let Some(session) = self.drag.as_mut() {
            session.moves += 1;
        }
        Ok(())
    }

    fn drag_end(&mut self) -> BackendResult {
        let Some(session) = self.drag.take() else {
            return Ok(());
        };
        debug!(
            backend = "local",
            moves = session.moves,
            held_ms = session.opened_at.elapsed().as_millis() as u64,
            "drag closed"
        );
        // The session is closed even if the release fails; a retry would
        // only risk a second button-up.
        self.exec(XdoCommand::mouse_up(BUTTON_LEFT)).map(drop)
    }

    fn scroll(&mut self, direction: ScrollDirection, magnitude: u32) -> BackendResult {
        self.ensure_enabled()?;
        // Wheel clicks are button events too.
        self.drag_end()?;
        self.exec(XdoCommand::scroll(direction, magnitude.max(1))).map(drop)
    }

    fn navigate_back(&mut self) -> BackendResult {
        let chord = self.config.platform.back_chord();
        self.chord(chord)
    }

    fn navigate_forward(&mut self) -> BackendResult {
        let chord = self.config.platform.forward_chord();
        self.chord(chord)
    }

    fn zoom_in(&mut self) -> BackendResult {
        let chord = self.config.platform.zoom_in_chord();
        self.chord(chord)
    }

    fn is_reachable(&mut self) -> bool {
        self.reachable
    }

    fn drag_active(&self) -> bool {
        self.drag.is_some()
    }

    fn set_enabled(&mut self, enabled: bool) -> BackendResult {
        let released = if enabled { Ok(()) } else { self.drag_end() };
        self.enabled = enabled;
        debug!(backend = "local", enabled, "backend toggled");
        released
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::xdo::ScriptedRunner;
    use crate::backend::Platform;

    fn backend(cursor_speed: f64) -> (LocalBackend<ScriptedRunner>, ScriptedRunner) {
        let runner = ScriptedRunner::default();
        let config = BackendConfig {
            screen_width: 1000,
            screen_height: 800,
            cursor_speed,
            click_duration: Duration::ZERO,
            safe_zone_margin_px: 10,
            platform: Platform::Linux,
            ..BackendConfig::default()
        };
        (LocalBackend::new(config, runner.clone()), runner)
    }

    #[test]
    fn test_move_is_relative_to_pointer() {
        let (mut b, runner) = backend(1.0);
        runner.reply(Ok("X=500\nY=400\nSCREEN=0\n"));
        // Mirrored: hand x 0.4 -> screen x 600.
        b.move_to(Vec2::new(0.4, 0.5)).unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "xdotool getmouselocation --shell",
                "xdotool mousemove_relative -- 100 0",
            ]
        );
    }

    #[test]
    fn test_cursor_speed_scales_step() {
        let (mut b, runner) = backend(0.5);
        runner.reply(Ok("X=500\nY=400\n"));
        b.move_to(Vec2::new(0.4, 0.25)).unwrap();
        assert_eq!(runner.calls()[1], "xdotool mousemove_relative -- 50 -100");
    }

    #[test]
    fn test_step_clamped_to_safe_zone() {
        let (mut b, runner) = backend(3.0);
        runner.reply(Ok("X=500\nY=400\n"));
        b.move_to(Vec2::new(0.0, 1.0)).unwrap();
        // Target (990, 790); 3x overshoot is clamped at the margin.
        assert_eq!(runner.calls()[1], "xdotool mousemove_relative -- 490 390");
    }

    #[test]
    fn test_no_move_when_on_target() {
        let (mut b, runner) = backend(1.0);
        runner.reply(Ok("X=500\nY=400\n"));
        b.move_to(Vec2::new(0.5, 0.5)).unwrap();
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_bad_pointer_query_is_error() {
        let (mut b, runner) = backend(1.0);
        runner.reply(Ok("garbage"));
        assert!(matches!(b.move_to(Vec2::new(0.5, 0.5)), Err(BackendError::Parse(_))));
    }

    #[test]
    fn test_click_presses_and_releases() {
        let (mut b, runner) = backend(1.0);
        b.click().unwrap();
        b.right_click().unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "xdotool mousedown 1",
                "xdotool mouseup 1",
                "xdotool mousedown 3",
                "xdotool mouseup 3",
            ]
        );
    }

    #[test]
    fn test_drag_lifecycle() {
        let (mut b, runner) = backend(1.0);
        b.drag_start().unwrap();
        b.drag_start().unwrap();
        assert!(b.drag_active());
        b.drag_end().unwrap();
        b.drag_end().unwrap();
        assert!(!b.drag_active());
        assert_eq!(runner.calls(), vec!["xdotool mousedown 1", "xdotool mouseup 1"]);
    }

    #[test]
    fn test_drag_continue_opens_missing_session() {
        let (mut b, runner) = backend(1.0);
        runner.reply(Ok("")); // mousedown
        runner.reply(Ok("X=500\nY=400\n"));
        b.drag_continue(Vec2::new(0.4, 0.5)).unwrap();
        assert!(b.drag_active());
        assert_eq!(runner.calls()[0], "xdotool mousedown 1");
    }

    #[test]
    fn test_click_closes_open_drag() {
        let (mut b, runner) = backend(1.0);
        b.drag_start().unwrap();
        runner.clear();
        b.click().unwrap();
        assert_eq!(runner.calls()[0], "xdotool mouseup 1");
        assert!(!b.drag_active());
    }

    #[test]
    fn test_disable_releases_drag() {
        let (mut b, runner) = backend(1.0);
        b.drag_start().unwrap();
        b.set_enabled(false).unwrap();
        assert!(!b.drag_active());
        assert!(!b.is_enabled());
        assert!(matches!(b.click(), Err(BackendError::Disabled)));
        assert!(matches!(b.move_to(Vec2::new(0.5, 0.5)), Err(BackendError::Disabled)));
        assert!(b.drag_end().is_ok());
        assert_eq!(runner.calls(), vec!["xdotool mousedown 1", "xdotool mouseup 1"]);
    }

    #[test]
    fn test_failed_release_still_closes_session() {
        let (mut b, runner) = backend(1.0);
        b.drag_start().unwrap();
        runner.reply(Err("X error"));
        assert!(b.drag_end().is_err());
        assert!(!b.drag_active());
    }

    #[test]
    fn test_scroll_and_chords() {
        let (mut b, runner) = backend(1.0);
        b.scroll(ScrollDirection::Up, 3).unwrap();
        b.navigate_back().unwrap();
        b.navigate_forward().unwrap();
        b.zoom_in().unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "xdotool click --repeat 3 4",
                "xdotool key alt+Left",
                "xdotool key alt+Right",
                "xdotool key ctrl+plus",
            ]
        );
    }

    #[test]
    fn test_scroll_closes_open_drag() {
        let (mut b, runner) = backend(1.0);
        b.drag_start().unwrap();
        runner.clear();
        b.scroll(ScrollDirection::Down, 2).unwrap();
        assert!(!b.drag_active());
        assert_eq!(
            runner.calls(),
            vec!["xdotool mouseup 1", "xdotool click --repeat 2 5"]
        );
    }

    #[test]
    fn test_reachability_tracks_spawn_failure() {
        struct Missing;
        impl CommandRunner for Missing {
            fn run(&mut self, program: &str, _: &[String], _: Duration) -> Result<String, BackendError> {
                Err(BackendError::Spawn {
                    program: program.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            }
        }
        let mut b = LocalBackend::new(BackendConfig::default(), Missing);
        assert!(b.is_reachable());
        assert!(b.click().is_err());
        assert!(!b.is_reachable());
    }
}
