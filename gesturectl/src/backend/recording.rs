//! Test backend that records every issued effect.

use std::sync::{Arc, Mutex};

use super::{ActionBackend, ScrollDirection};
use crate::error::{BackendError, BackendResult};
use crate::tracking::Vec2;

/// One effect issued by the recording backend.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    MoveTo(Vec2),
    Click,
    RightClick,
    DragStart,
    DragContinue(Vec2),
    DragEnd,
    Scroll(ScrollDirection, u32),
    Back,
    Forward,
    ZoomIn,
}

impl Effect {
    pub(crate) fn is_discrete(&self) -> bool {
        matches!(
            self,
            Self::Click | Self::RightClick | Self::Scroll(..) | Self::Back | Self::Forward | Self::ZoomIn
        )
    }
}

/// Shared view of what a `RecordingBackend` did, usable after the
/// backend has been boxed and moved into a loop.
#[derive(Clone, Default)]
pub(crate) struct EffectLog(Arc<Mutex<Vec<Effect>>>);

impl EffectLog {
    pub(crate) fn effects(&self) -> Vec<Effect> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Effect) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, effect: Effect) {
        self.0.lock().unwrap().push(effect);
    }
}

pub(crate) struct RecordingBackend {
    log: EffectLog,
    name: &'static str,
    enabled: bool,
    drag_open: bool,
    /// When false every effect fails with `Unreachable`.
    pub(crate) reachable: bool,
}

impl RecordingBackend {
    pub(crate) fn new() -> (Self, EffectLog) {
        Self::named("recording")
    }

    pub(crate) fn named(name: &'static str) -> (Self, EffectLog) {
        let log = EffectLog::default();
        (
            Self {
                log: log.clone(),
                name,
                enabled: true,
                drag_open: false,
                reachable: true,
            },
            log,
        )
    }

    fn issue(&mut self, effect: Effect) -> BackendResult {
        if !self.enabled {
            return Err(BackendError::Disabled);
        }
        if !self.reachable {
            return Err(BackendError::Unreachable(self.name.to_string()));
        }
        self.log.push(effect);
        Ok(())
    }
}

impl ActionBackend for RecordingBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn move_to(&mut self, pos: Vec2) -> BackendResult {
        self.issue(Effect::MoveTo(pos))
    }

    fn click(&mut self) -> BackendResult {
        self.drag_end()?;
        self.issue(Effect::Click)
    }

    fn right_click(&mut self) -> BackendResult {
        self.drag_end()?;
        self.issue(Effect::RightClick)
    }

    fn drag_start(&mut self) -> BackendResult {
        if self.drag_open && self.enabled {
            return Ok(());
        }
        self.issue(Effect::DragStart)?;
        self.drag_open = true;
        Ok(())
    }

    fn drag_continue(&mut self, pos: Vec2) -> BackendResult {
        if !self.drag_open {
            self.drag_start()?;
        }
        self.issue(Effect::DragContinue(pos))
    }

    fn drag_end(&mut self) -> BackendResult {
        if !self.drag_open {
            return Ok(());
        }
        self.drag_open = false;
        if self.reachable {
            self.log.push(Effect::DragEnd);
            Ok(())
        } else {
            Err(BackendError::Unreachable(self.name.to_string()))
        }
    }

    fn scroll(&mut self, direction: ScrollDirection, magnitude: u32) -> BackendResult {
        self.drag_end()?;
        self.issue(Effect::Scroll(direction, magnitude))
    }

    fn navigate_back(&mut self) -> BackendResult {
        self.issue(Effect::Back)
    }

    fn navigate_forward(&mut self) -> BackendResult {
        self.issue(Effect::Forward)
    }

    fn zoom_in(&mut self) -> BackendResult {
        self.issue(Effect::ZoomIn)
    }

    fn is_reachable(&mut self) -> bool {
        self.reachable
    }

    fn drag_active(&self) -> bool {
        self.drag_open
    }

    fn set_enabled(&mut self, enabled: bool) -> BackendResult {
        let released = if enabled { Ok(()) } else { self.drag_end() };
        self.enabled = enabled;
        released
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
