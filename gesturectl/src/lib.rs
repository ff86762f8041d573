//! gesturectl - hand-gesture pointer and keyboard control.
//!
//! Hand landmarks come in from a [`tracking::LandmarkSource`], are
//! classified and debounced into confirmed gestures, and are dispatched to
//! one [`backend::ActionBackend`]: the local desktop or a virtual desktop
//! inside a container.
//!
//! Provides:
//! - `tracking`: landmark samples, classification, smoothing, confirmation
//! - `backend`: action backends and the xdotool exec layer
//! - `gesture_loop`: the per-poll pipeline, dispatch, observers, timing
//! - `service`: the paced service loop and its control handle
//! - `config`: TOML configuration
//! - `error`: typed errors

pub mod backend;
pub mod config;
pub mod error;
pub mod gesture_loop;
pub mod service;
pub mod tracking;

pub use backend::{ActionBackend, BackendKind, LocalBackend, RemoteContainerBackend};
pub use config::{BackendConfig, GestureConfig, RemoteConfig};
pub use error::{BackendError, BackendResult, ConfigError, SourceError};
pub use gesture_loop::{BackendStatus, GestureLoop, GestureSnapshot, Observer};
pub use service::{ControlHandle, GestureService, RunSummary, StopReason};
