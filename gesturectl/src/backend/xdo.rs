//! xdotool command construction and process execution.
//!
//! Both backends speak xdotool: the local one runs it directly, the remote
//! one wraps it in a container `exec`.  Process execution sits behind
//! [`CommandRunner`] so tests can script responses without a display.

use std::fmt;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::ScrollDirection;
use crate::error::BackendError;

/// Program name of the input-injection tool.
pub const XDOTOOL: &str = "xdotool";

/// Left mouse button.
pub const BUTTON_LEFT: u8 = 1;
/// Right mouse button.
pub const BUTTON_RIGHT: u8 = 3;

// ── XdoCommand ─────────────────────────────────────────────

/// One xdotool invocation (subcommand plus arguments).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdoCommand {
    args: Vec<String>,
}

impl XdoCommand {
    fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Absolute pointer move.
    pub fn mouse_move(x: i32, y: i32) -> Self {
        Self::new(["mousemove".to_string(), x.to_string(), y.to_string()])
    }

    /// Relative pointer move.  `--` keeps negative deltas from being read
    /// as options.
    pub fn mouse_move_relative(dx: i32, dy: i32) -> Self {
        Self::new([
            "mousemove_relative".to_string(),
            "--".to_string(),
            dx.to_string(),
            dy.to_string(),
        ])
    }

    pub fn click(button: u8) -> Self {
        Self::new(["click".to_string(), button.to_string()])
    }

    /// Scroll wheel clicks: button 4 is up, 5 is down.
    pub fn scroll(direction: ScrollDirection, repeat: u32) -> Self {
        Self::new([
            "click".to_string(),
            "--repeat".to_string(),
            repeat.to_string(),
            direction.button().to_string(),
        ])
    }

    pub fn mouse_down(button: u8) -> Self {
        Self::new(["mousedown".to_string(), button.to_string()])
    }

    pub fn mouse_up(button: u8) -> Self {
        Self::new(["mouseup".to_string(), button.to_string()])
    }

    /// Key chord such as `alt+Left`.
    pub fn key(chord: &str) -> Self {
        Self::new(["key", chord])
    }

    /// Query the pointer position (`--shell` output).
    pub fn get_mouse_location() -> Self {
        Self::new(["getmouselocation", "--shell"])
    }

    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}

impl fmt::Display for XdoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{XDOTOOL} {}", self.args.join(" "))
    }
}

/// Parse `getmouselocation --shell` output (`X=..`, `Y=..` lines).
pub fn parse_mouse_location(output: &str) -> Result<(i32, i32), BackendError> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        match line.trim().split_once('=') {
            Some(("X", v)) => x = v.parse::<i32>().ok(),
            Some(("Y", v)) => y = v.parse::<i32>().ok(),
            _ => {}
        }
    }
    match (x, y) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(BackendError::Parse(format!(
            "no pointer location in {:?}",
            output.trim()
        ))),
    }
}

// ── Command runner ─────────────────────────────────────────

/// Executes a helper program and returns its stdout.
pub trait CommandRunner: Send {
    /// Run `program` with `args`, killing it if it exceeds `timeout`.
    /// A non-zero exit is an error.
    fn run(&mut self, program: &str, args: &[String], timeout: Duration) -> Result<String, BackendError>;
}

/// Runs real processes via `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

/// How often a running child is checked for exit.
const WAIT_POLL: Duration = Duration::from_millis(2);

/// Kill a child and wait for it so no zombie is left behind.
fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, program: &str, args: &[String], timeout: Duration) -> Result<String, BackendError> {
        trace!(program, ?args, "exec");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    kill_and_reap(&mut child);
                    debug!(program, ?timeout, "exec timed out, child killed");
                    return Err(BackendError::Timeout(timeout));
                }
                Ok(None) => thread::sleep(WAIT_POLL),
                Err(source) => {
                    kill_and_reap(&mut child);
                    return Err(BackendError::Spawn {
                        program: program.to_string(),
                        source,
                    });
                }
            }
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut out) = child.stdout.take() {
            let _ = out.read_to_string(&mut stdout);
        }
        if let Some(mut err) = child.stderr.take() {
            let _ = err.read_to_string(&mut stderr);
        }

        if status.success() {
            Ok(stdout)
        } else {
            Err(BackendError::CommandFailed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

// ── Test runner ────────────────────────────────────────────

/// Records every invocation and replies from a script.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct ScriptedRunner {
    calls: std::sync::Arc<std::sync::Mutex<Vec<(String, Vec<String>)>>>,
    replies: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<Result<String, String>>>>,
}

#[cfg(test)]
impl ScriptedRunner {
    /// Queue a reply.  `Err` becomes `CommandFailed`.  With no queued
    /// reply a call succeeds with empty output.
    pub(crate) fn reply(&self, reply: Result<&str, &str>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(reply.map(str::to_string).map_err(str::to_string));
    }

    /// All calls so far, as `program arg arg ...` strings.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(p, a)| std::iter::once(p.clone()).chain(a.iter().cloned()).collect::<Vec<_>>().join(" "))
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[cfg(test)]
impl CommandRunner for ScriptedRunner {
    fn run(&mut self, program: &str, args: &[String], _timeout: Duration) -> Result<String, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        match self.replies.lock().unwrap().pop_front() {
            None => Ok(String::new()),
            Some(Ok(out)) => Ok(out),
            Some(Err(stderr)) => Err(BackendError::CommandFailed {
                status: "exit status: 1".to_string(),
                stderr,
            }),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
