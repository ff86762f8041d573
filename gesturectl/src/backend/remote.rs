//! Remote container backend - forwards xdotool commands into a container
//! running a virtual desktop.
//!
//! Every effect is one `<runtime> exec -e DISPLAY=<display> <container>
//! xdotool ...` round-trip.  Positioning is absolute: the canvas is not
//! interactive, so there is no OS pointer to drift against.
//!
//! Reachability is checked with `<runtime> inspect` and cached for
//! `check_interval_ms`.  While the container is down every call fails fast
//! with `BackendError::Unreachable` instead of waiting on exec timeouts.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::xdo::{CommandRunner, XdoCommand, BUTTON_LEFT, BUTTON_RIGHT, XDOTOOL};
use super::{map_to_screen, ActionBackend, DragSession, ScrollDirection};
use crate::config::{BackendConfig, RemoteConfig};
use crate::error::{BackendError, BackendResult};
use crate::tracking::Vec2;

pub struct RemoteContainerBackend<R: CommandRunner = super::SystemRunner> {
    config: BackendConfig,
    remote: RemoteConfig,
    runner: R,
    enabled: bool,
    drag: Option<DragSession>,
    /// Time and result of the last container check.
    last_check: Option<(Instant, bool)>,
}

impl<R: CommandRunner> RemoteContainerBackend<R> {
    pub fn new(config: BackendConfig, remote: RemoteConfig, runner: R) -> Self {
        debug!(
            container = %remote.container,
            runtime = %remote.runtime,
            display = %remote.display,
            width = config.screen_width,
            height = config.screen_height,
            "remote backend ready"
        );
        Self {
            config,
            remote,
            runner,
            enabled: true,
            drag: None,
            last_check: None,
        }
    }

    pub fn container(&self) -> &str {
        &self.remote.container
    }

    fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.exec_timeout_ms)
    }

    fn check_container(&mut self) -> bool {
        let args = [
            "inspect".to_string(),
            "-f".to_string(),
            "{{.State.Running}}".to_string(),
            self.remote.container.clone(),
        ];
        let timeout = self.exec_timeout();
        match self.runner.run(&self.remote.runtime, &args, timeout) {
            Ok(out) => out.trim() == "true",
            Err(e) => {
                debug!(container = %self.remote.container, error = %e, "container check failed");
                false
            }
        }
    }

    fn exec(&mut self, cmd: XdoCommand) -> BackendResult {
        if !self.is_reachable() {
            return Err(BackendError::Unreachable(format!(
                "container {} is not running",
                self.remote.container
            )));
        }
        let mut args = vec![
            "exec".to_string(),
            "-e".to_string(),
            format!("DISPLAY={}", self.remote.display),
            self.remote.container.clone(),
            XDOTOOL.to_string(),
        ];
        args.extend(cmd.into_args());
        let timeout = self.exec_timeout();
        match self.runner.run(&self.remote.runtime, &args, timeout) {
            Ok(_) => Ok(()),
            Err(e) => {
                // Re-check before the next call; the container may be gone.
                self.last_check = None;
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

    fn absolute_move(&mut self, pos: Vec2) -> BackendResult {
        let c = &self.config;
        let (x, y) = map_to_screen(pos, c.screen_width, c.screen_height, c.safe_zone_margin_px);
        self.exec(XdoCommand::mouse_move(x, y))
    }

    fn press(&mut self, button: u8) -> BackendResult {
        self.ensure_enabled()?;
        self.drag_end()?;
        self.exec(XdoCommand::click(button))
    }

    fn chord(&mut self, chord: &str) -> BackendResult {
        self.ensure_enabled()?;
        self.exec(XdoCommand::key(chord))
    }
}

impl<R: CommandRunner> ActionBackend for RemoteContainerBackend<R> {
    fn name(&self) -> &str {
        "remote"
    }

    fn move_to(&mut self, pos: Vec2) -> BackendResult {
        self.ensure_enabled()?;
        self.absolute_move(pos)
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
        debug!(backend = "remote", container = %self.remote.container, "drag opened");
        Ok(())
    }

    fn drag_continue(&mut self, pos: Vec2) -> BackendResult {
        self.ensure_enabled()?;
        if self.drag.is_none() {
            warn!(backend = "remote", "drag_continue without session, opening one");
            self.drag_start()?;
        }
        self.absolute_move(pos)?;
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
            backend = "remote",
            moves = session.moves,
            held_ms = session.opened_at.elapsed().as_millis() as u64,
            "drag closed"
        );
        self.exec(XdoCommand::mouse_up(BUTTON_LEFT))
    }

    fn scroll(&mut self, direction: ScrollDirection, magnitude: u32) -> BackendResult {
        self.ensure_enabled()?;
        // Wheel clicks are button events too.
        self.drag_end()?;
        self.exec(XdoCommand::scroll(direction, magnitude.max(1)))
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
        let interval = Duration::from_millis(self.remote.check_interval_ms);
        if let Some((at, ok)) = self.last_check {
            if at.elapsed() < interval {
                return ok;
            }
        }
        let was = self.last_check.map(|(_, ok)| ok);
        let ok = self.check_container();
        self.last_check = Some((Instant::now(), ok));
        match (was, ok) {
            (Some(false), true) => info!(container = %self.remote.container, "container reachable again"),
            (Some(true) | None, false) => {
                warn!(container = %self.remote.container, "container unreachable")
            }
            _ => {}
        }
        ok
    }

    fn drag_active(&self) -> bool {
        self.drag.is_some()
    }

    fn set_enabled(&mut self, enabled: bool) -> BackendResult {
        let released = if enabled { Ok(()) } else { self.drag_end() };
        self.enabled = enabled;
        debug!(backend = "remote", enabled, "backend toggled");
        released
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ── Tests ──────────────────────────────────────────────────
