use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::{ActuatorLink, Command};

/// Dry-run link for `stub://` ports: logs each command instead of sending it.
pub struct LoggingLink {
    label: String,
}

impl LoggingLink {
    pub fn new(label: &str) -> Self {
        log::info!("LoggingLink: {} (commands are logged, not sent)", label);
        Self {
            label: label.to_string(),
        }
    }
}

impl ActuatorLink for LoggingLink {
    fn describe(&self) -> String {
        format!("{} (dry run)", self.label)
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        log::info!("{} <- {}", self.label, command);
        Ok(())
    }
}

/// Shared, inspectable record of the commands a `RecordingLink` accepted.
#[derive(Clone, Default)]
pub struct CommandLog {
    sent: Arc<Mutex<Vec<Command>>>,
}

impl CommandLog {
    pub fn snapshot(&self) -> Vec<Command> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    fn push(&self, command: Command) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow!("command log lock poisoned"))?
            .push(command);
        Ok(())
    }
}

/// In-memory link that records commands; can be told to fail every write.
#[derive(Default)]
pub struct RecordingLink {
    log: CommandLog,
    fail_writes: bool,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            log: CommandLog::default(),
            fail_writes: true,
        }
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl ActuatorLink for RecordingLink {
    fn describe(&self) -> String {
        "recording link".to_string()
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("link write failed: {}", command));
        }
        self.log.push(*command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SharedLink;

    #[test]
    fn recording_link_shares_its_log() -> Result<()> {
        let link = RecordingLink::new();
        let log = link.log();
        let shared = SharedLink::new(link);
        shared.send(&Command::Shake)?;
        shared.clone().send(&Command::Reset)?;
        assert_eq!(log.snapshot(), vec![Command::Shake, Command::Reset]);
        Ok(())
    }

    #[test]
    fn failing_link_reports_errors() {
        let shared = SharedLink::new(RecordingLink::failing());
        assert!(shared.send(&Command::Animate).is_err());
    }
}
