//! Actuator link: newline-terminated ASCII commands to the servo rig.
//!
//! | Command        | Wire form   |
//! |----------------|-------------|
//! | position       | `"{x},{y}\n"` |
//! | shake          | `"SHAKE\n"` |
//! | reset          | `"RESET\n"` |
//! | animate        | `"ANIMATE\n"` |
//!
//! The link is a single shared channel. `SharedLink` serializes writes so the
//! tracking loop and actuation tasks never interleave bytes of two commands,
//! and `SharedLink::in_sequence` keeps multi-command sequences whole.

mod recording;
mod serial;

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::config::ActuatorSettings;
use crate::mapping::PositionCommand;

pub use recording::{CommandLog, LoggingLink, RecordingLink};
pub use serial::SerialLink;

/// Longest a single serial write attempt may block before it times out.
pub const SERIAL_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Position(PositionCommand),
    Shake,
    Reset,
    Animate,
}

impl Command {
    /// Wire encoding, including the trailing newline.
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Position(pos) => write!(f, "{},{}", pos.x, pos.y),
            Command::Shake => f.write_str("SHAKE"),
            Command::Reset => f.write_str("RESET"),
            Command::Animate => f.write_str("ANIMATE"),
        }
    }
}

impl From<PositionCommand> for Command {
    fn from(pos: PositionCommand) -> Self {
        Command::Position(pos)
    }
}

/// Sink for actuator commands.
pub trait ActuatorLink: Send {
    fn describe(&self) -> String;

    fn send(&mut self, command: &Command) -> Result<()>;
}

/// Bounded retry with a fixed backoff between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds or the attempts are used up.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    log::warn!("{} failed (attempt {}/{}): {}", what, attempt, attempts, err);
                    if !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err.context(format!("{} failed after {} attempts", what, attempts)))
                }
            }
        }
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn max_backoff(&self) -> Duration {
        self.backoff * self.attempts.saturating_sub(1)
    }
}

/// Cloneable handle to the one actuator link, shared between the tracking loop
/// and actuation tasks.
#[derive(Clone)]
pub struct SharedLink {
    inner: Arc<Mutex<Box<dyn ActuatorLink>>>,
    sequence: Arc<Mutex<()>>,
}

impl SharedLink {
    pub fn new<L: ActuatorLink + 'static>(link: L) -> Self {
        Self::from_boxed(Box::new(link))
    }

    pub fn from_boxed(link: Box<dyn ActuatorLink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(link)),
            sequence: Arc::new(Mutex::new(())),
        }
    }

    pub fn send(&self, command: &Command) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("actuator link lock poisoned"))?;
        guard.send(command)
    }

    /// Run `f` holding the sequence lock. Another sequence waits until `f`
    /// returns; single commands from the tracking loop are not blocked.
    pub fn in_sequence<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let _sequence = self
            .sequence
            .lock()
            .map_err(|_| anyhow!("actuator sequence lock poisoned"))?;
        f(self)
    }

    pub fn describe(&self) -> String {
        match self.inner.lock() {
            Ok(guard) => guard.describe(),
            Err(_) => "poisoned link".to_string(),
        }
    }
}

/// Open the configured link. `stub://` ports log commands instead of writing them.
pub fn open_link(settings: &ActuatorSettings) -> Result<SharedLink> {
    if settings.port.starts_with("stub://") {
        return Ok(SharedLink::new(LoggingLink::new(&settings.port)));
    }
    let link = SerialLink::open(settings)?;
    Ok(SharedLink::new(link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn commands_encode_as_protocol_lines() {
        assert_eq!(
            Command::Position(PositionCommand { x: 64, y: 32 }).encode(),
            "64,32\n"
        );
        assert_eq!(Command::Shake.encode(), "SHAKE\n");
        assert_eq!(Command::Reset.encode(), "RESET\n");
        assert_eq!(Command::Animate.encode(), "ANIMATE\n");
    }

    #[test]
    fn retry_succeeds_before_attempts_run_out() -> Result<()> {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let value = policy.run("flaky op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(anyhow!("not yet"))
            } else {
                Ok(7)
            }
        })?;
        assert_eq!(value, 7);
        assert_eq!(calls.get(), 3);
        Ok(())
    }

    #[test]
    fn retry_gives_up_with_last_error() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let result: Result<()> = policy.run("doomed op", || {
            calls.set(calls.get() + 1);
            Err(anyhow!("nope"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
        assert_eq!(policy.max_backoff(), Duration::ZERO);
    }

    #[test]
    fn stub_port_opens_logging_link() -> Result<()> {
        let settings = ActuatorSettings::default();
        let link = open_link(&settings)?;
        link.send(&Command::Reset)?;
        assert!(link.describe().contains("stub://"));
        Ok(())
    }
}
